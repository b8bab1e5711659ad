//! Gateway error type
//!
//! Every failure coming out of [`RagClient`](super::client::RagClient) is one of
//! these variants. Transport-specific errors never cross this boundary.

use reqwest::StatusCode;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("{}", describe_http(.status, .message))]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request cancelled")]
    Cancelled,
}

fn describe_http(status: &u16, message: &str) -> String {
    if message.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, message)
    }
}

impl GatewayError {
    /// Build an `Http` error from a non-success status and its raw body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        GatewayError::Http {
            status: status.as_u16(),
            message: normalize_body(body),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Backend unreachable or reporting itself down.
    pub fn is_unavailable(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::Http { status, .. } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            GatewayError::Timeout => true,
            GatewayError::Http { status, .. } => matches!(status, 408 | 504),
            _ => false,
        }
    }

    /// Worth another attempt on an idempotent call. A transport timeout
    /// has already spent the whole time budget, so it is final.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::Http { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            GatewayError::Timeout
            | GatewayError::Decode(_)
            | GatewayError::InvalidInput(_)
            | GatewayError::Cancelled => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            GatewayError::Http {
                status: status.as_u16(),
                message: String::new(),
            }
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// Collapse an error body into one line: `message`, then `detail`, then
/// `error`. Non-JSON bodies are used verbatim.
pub fn normalize_body(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }

    let json: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return body.to_string(),
    };

    let parts: Vec<String> = ["message", "detail", "error"]
        .iter()
        .filter_map(|key| json.get(*key))
        .filter_map(field_text)
        .collect();

    if parts.is_empty() {
        match json {
            Value::String(s) => s,
            Value::Object(ref map) if map.is_empty() => String::new(),
            other => other.to_string(),
        }
    } else {
        parts.join(" - ")
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}
