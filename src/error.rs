//! Error taxonomy for the relay and its mapping onto HTTP responses.

use axum::http::{Method, StatusCode};

/// Every way a webhook invocation can fail.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Bot token or chat id missing.
    #[error("missing TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID")]
    Configuration,

    /// Derived message text was empty after trimming.
    #[error("empty signal message")]
    EmptySignal,

    /// Request body was not valid UTF-8.
    #[error("signal body is not valid UTF-8")]
    InvalidEncoding,

    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    /// Telegram answered but refused the message.
    #[error("Telegram API error ({status}): {description}")]
    Upstream { status: u16, description: String },

    /// Anything unexpected while processing, transport failures included.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Configuration | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RelayError::EmptySignal | RelayError::InvalidEncoding => StatusCode::BAD_REQUEST,
            RelayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Text returned to the caller. Internal detail stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            RelayError::Configuration => "Server configuration error.".to_string(),
            RelayError::EmptySignal => "Bad Request: Empty signal message received.".to_string(),
            RelayError::InvalidEncoding => {
                "Bad Request: Signal message must be valid UTF-8.".to_string()
            }
            RelayError::MethodNotAllowed(_) => {
                "Method Not Allowed. Use POST for signals or GET for health check.".to_string()
            }
            RelayError::Upstream { description, .. } => format!(
                "Failed to send message. Telegram API Error: {}",
                description
            ),
            RelayError::Internal(_) => {
                "Internal Server Error while processing webhook.".to_string()
            }
        }
    }
}
