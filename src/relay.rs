use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use tracing::{error, info, warn};

use crate::config::{Config, Credentials};
use crate::error::RelayError;
use crate::signal::Payload;
use crate::telegram::{NotifyError, Notifier};

const HEALTH_MESSAGE: &str = "Webhook is active. Ready to receive POST requests from TradingView.";
const FORWARDED_MESSAGE: &str = "Signal forwarded to Telegram successfully.";

/// Methods accepted on the webhook route, for the `Allow` header.
pub const ALLOWED_METHODS: &str = "GET, HEAD, POST";

/// One inbound webhook call, independent of the HTTP framework.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub method: Method,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RelayRequest {
    pub fn new(method: Method, content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            content_type,
            body: body.into(),
        }
    }
}

/// What the caller gets back.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub body: String,
    /// Set on 405 responses.
    pub allow: Option<&'static str>,
}

impl RelayResponse {
    fn ok(body: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.to_string(),
            allow: None,
        }
    }

    fn from_error(err: &RelayError) -> Self {
        Self {
            status: err.status_code(),
            body: err.client_message(),
            allow: matches!(err, RelayError::MethodNotAllowed(_)).then_some(ALLOWED_METHODS),
        }
    }
}

/// Forwards webhook signals to a [`Notifier`].
///
/// Holds no per-request state; a single instance is shared by all requests.
pub struct Relay {
    notifier: Arc<dyn Notifier>,
    credentials: Option<Credentials>,
    health_requires_credentials: bool,
}

impl Relay {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        credentials: Option<Credentials>,
        health_requires_credentials: bool,
    ) -> Self {
        Self {
            notifier,
            credentials,
            health_requires_credentials,
        }
    }

    pub fn from_config(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            notifier,
            config.telegram.credentials(),
            config.relay.health_requires_credentials,
        )
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Handle one webhook call. Never fails: every error becomes a response.
    pub async fn handle(&self, request: RelayRequest) -> RelayResponse {
        match self.process(request).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    RelayError::Configuration => {
                        error!("Server config error: {}", err)
                    }
                    RelayError::Upstream { .. } => error!("{}", err),
                    RelayError::Internal(detail) => {
                        error!("Webhook processing error: {}", detail)
                    }
                    RelayError::EmptySignal
                    | RelayError::InvalidEncoding
                    | RelayError::MethodNotAllowed(_) => warn!("Rejected request: {}", err),
                }
                RelayResponse::from_error(&err)
            }
        }
    }

    async fn process(&self, request: RelayRequest) -> Result<RelayResponse, RelayError> {
        let is_health_check = request.method == Method::GET || request.method == Method::HEAD;

        if is_health_check && !self.health_requires_credentials {
            return Ok(RelayResponse::ok(HEALTH_MESSAGE));
        }

        let credentials = self.credentials.as_ref().ok_or(RelayError::Configuration)?;

        if is_health_check {
            return Ok(RelayResponse::ok(HEALTH_MESSAGE));
        }
        if request.method != Method::POST {
            return Err(RelayError::MethodNotAllowed(request.method));
        }

        let payload = Payload::from_body(request.content_type.as_deref(), &request.body)?;
        let text = payload.message_text();
        if text.trim().is_empty() {
            return Err(RelayError::EmptySignal);
        }

        self.notifier
            .send_message(credentials, &text)
            .await
            .map_err(|e| match e {
                NotifyError::Rejected {
                    status,
                    description,
                } => RelayError::Upstream {
                    status,
                    description,
                },
                NotifyError::Transport(detail) => RelayError::Internal(detail),
            })?;

        info!("Signal forwarded to chat {}", credentials.chat_id);
        Ok(RelayResponse::ok(FORWARDED_MESSAGE))
    }
}
