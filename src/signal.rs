use serde_json::Value;

use crate::error::RelayError;

/// Inbound signal body as the webhook caller sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Non-null JSON object or array.
    Structured(Value),
    Text(String),
    Empty,
}

impl Payload {
    /// Build a payload from a raw request body, parsing it as JSON only when
    /// the content type says it is JSON.
    pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Result<Self, RelayError> {
        if body.is_empty() {
            return Ok(Payload::Empty);
        }

        let text = std::str::from_utf8(body).map_err(|_| RelayError::InvalidEncoding)?;

        if content_type.is_some_and(is_json_content_type) {
            // JSON-looking alert text that doesn't parse is still worth relaying.
            if let Ok(value) = serde_json::from_str::<Value>(text) {
                return Ok(Self::from_json(value));
            }
        }

        Ok(Payload::Text(text.to_string()))
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Payload::Empty,
            Value::String(s) => Payload::Text(s),
            Value::Bool(_) | Value::Number(_) => Payload::Text(value.to_string()),
            Value::Object(_) | Value::Array(_) => Payload::Structured(value),
        }
    }

    /// Text that will be sent to Telegram. Structured payloads are rendered
    /// as two-space indented JSON.
    pub fn message_text(&self) -> String {
        match self {
            Payload::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Payload::Text(text) => text.clone(),
            Payload::Empty => String::new(),
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}
