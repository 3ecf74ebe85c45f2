use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";
pub const BIND_ENV: &str = "RELAY_BIND";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    #[default]
    Markdown,
    MarkdownV2,
    Html,
    None,
}

impl ParseMode {
    /// Value for the `parse_mode` field of `sendMessage`, or `None` for plain text.
    pub fn as_api_value(&self) -> Option<&'static str> {
        match self {
            ParseMode::Markdown => Some("Markdown"),
            ParseMode::MarkdownV2 => Some("MarkdownV2"),
            ParseMode::Html => Some("HTML"),
            ParseMode::None => None,
        }
    }
}

impl std::fmt::Display for ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseMode::Markdown => write!(f, "markdown"),
            ParseMode::MarkdownV2 => write!(f, "markdownv2"),
            ParseMode::Html => write!(f, "html"),
            ParseMode::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Route the webhook is mounted on.
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub parse_mode: ParseMode,
    /// Outbound request timeout; 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    /// When false, GET/HEAD health checks succeed even if credentials are unset.
    #[serde(default)]
    pub health_requires_credentials: bool,
}

/// Bot token and destination chat, both present and non-blank.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub bot_token: String,
    pub chat_id: String,
}

// Keep the token out of any `{:?}` that ends up in a log line.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_path() -> String {
    "/api/webhook".to_string()
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            path: default_path(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base_url: default_api_base_url(),
            parse_mode: ParseMode::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TelegramConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Resolved credentials, or `None` if either secret is missing or blank.
    pub fn credentials(&self) -> Option<Credentials> {
        let bot_token = non_blank(self.bot_token.as_deref())?;
        let chat_id = non_blank(self.chat_id.as_deref())?;
        Some(Credentials {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load `path` if it exists, otherwise start from the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if !config.server.path.starts_with('/') {
            anyhow::bail!(
                "server.path must start with '/', got {:?}",
                config.server.path
            );
        }
        Ok(config)
    }

    /// Overlay values from the environment on top of the file configuration.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Same as [`Config::apply_env`] with an injectable lookup, so tests don't
    /// have to mutate the process environment.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(BOT_TOKEN_ENV) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = lookup(CHAT_ID_ENV) {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(bind) = lookup(BIND_ENV).filter(|b| !b.trim().is_empty()) {
            self.server.bind_address = bind;
        }
    }
}
