use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Credentials, ParseMode, TelegramConfig};

/// Failure of a single `sendMessage` call.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Telegram answered with a non-success status or `"ok": false`.
    #[error("Telegram rejected the message ({status}): {description}")]
    Rejected { status: u16, description: String },

    /// The request never produced a usable response.
    #[error("request to Telegram failed: {0}")]
    Transport(String),
}

/// Destination for relayed signal text.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, credentials: &Credentials, text: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

/// Envelope every Bot API response is wrapped in.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramClient {
    client: reqwest::Client,
    api_base_url: String,
    parse_mode: ParseMode,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            parse_mode: config.parse_mode,
        })
    }

    fn send_message_url(&self, bot_token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.api_base_url, bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_message(&self, credentials: &Credentials, text: &str) -> Result<(), NotifyError> {
        let request = SendMessageRequest {
            chat_id: &credentials.chat_id,
            text,
            parse_mode: self.parse_mode.as_api_value(),
        };

        debug!(
            "Sending {} chars to Telegram chat {} (parse_mode: {})",
            text.chars().count(),
            credentials.chat_id,
            self.parse_mode
        );

        // reqwest errors carry the URL, and the URL carries the bot token.
        let response = self
            .client
            .post(self.send_message_url(&credentials.bot_token))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: error_detail(status, &body),
            });
        }

        // A 2xx with an unreadable body still counts as delivered.
        if let Ok(api) = serde_json::from_str::<ApiResponse>(&body) {
            if !api.ok {
                return Err(NotifyError::Rejected {
                    status: status.as_u16(),
                    description: api
                        .description
                        .unwrap_or_else(|| "ok: false without description".to_string()),
                });
            }
        }

        Ok(())
    }
}

/// Best available explanation of a failed call: the JSON `description`,
/// else the raw body, else the status reason phrase.
fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(ApiErrorBody {
        description: Some(description),
    }) = serde_json::from_str::<ApiErrorBody>(body)
    {
        if !description.trim().is_empty() {
            return description;
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string())
}
