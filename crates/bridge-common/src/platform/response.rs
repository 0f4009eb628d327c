//! API response envelope and errors

use serde::Deserialize;
use serde_json::Value;

/// Decoded response of the platform's `{ code, message, data }` envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status
    pub status: u16,
    /// Application code (`0` on success); `None` when the body was not an envelope
    pub code: Option<i64>,
    pub message: String,
    pub data: Value,
}

#[derive(Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

/// Longest raw body kept in `message` when the body is not an envelope
const RAW_BODY_LIMIT: usize = 512;

impl ApiResponse {
    /// Decode a response body; never fails
    #[must_use]
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) => Self {
                status,
                code: Some(envelope.code),
                message: envelope.message,
                data: envelope.data,
            },
            Err(_) => Self {
                status,
                code: None,
                message: body.chars().take(RAW_BODY_LIMIT).collect(),
                data: Value::Null,
            },
        }
    }

    /// Build a successful response (used by fakes)
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            status: 200,
            code: Some(0),
            message: String::new(),
            data,
        }
    }

    /// Build an application-level failure (used by fakes)
    #[must_use]
    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        Self {
            status: 200,
            code: Some(code),
            message: message.into(),
            data: Value::Null,
        }
    }

    /// 2xx status and code `0`
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.code == Some(0)
    }

    /// String field of `data`
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Platform API errors
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl PlatformError {
    /// Turn a non-success response into an error
    #[must_use]
    pub fn from_response(response: &ApiResponse) -> Self {
        match response.code {
            Some(code) => Self::Api {
                code,
                message: response.message.clone(),
            },
            None => Self::UnexpectedResponse(format!(
                "status {}: {}",
                response.status, response.message
            )),
        }
    }
}
