//! Response classification
//!
//! Maps the outcome of one API call onto the queue's recovery policy.

use bridge_common::{ApiResponse, DeliveryConfig, PlatformError};
use serde_json::Value;

/// Recovery class of one send attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseClass {
    /// Delivered; carries the response data
    Success { data: Value },
    /// Payload rejected as malformed; retrying cannot help
    Malformed { code: i64, message: String },
    /// Another code that must not be retried
    NonRetryable { code: i64, message: String },
    /// Rendered content exceeds the platform budget
    ContentTooLong { code: i64, message: String },
    /// Anything else, including transport failures
    Transient { reason: String },
}

impl ResponseClass {
    /// Target message id returned by a create
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Success { data } => data.get("msg_id").and_then(Value::as_str),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Malformed { .. } => "malformed",
            Self::NonRetryable { .. } => "non_retryable",
            Self::ContentTooLong { .. } => "content_too_long",
            Self::Transient { .. } => "transient",
        }
    }
}

/// Classify the result of a send attempt
pub fn classify(
    config: &DeliveryConfig,
    result: &Result<ApiResponse, PlatformError>,
) -> ResponseClass {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            return ResponseClass::Transient {
                reason: e.to_string(),
            }
        }
    };

    if response.is_success() {
        return ResponseClass::Success {
            data: response.data.clone(),
        };
    }

    let Some(code) = response.code else {
        return ResponseClass::Transient {
            reason: PlatformError::from_response(response).to_string(),
        };
    };
    let message = response.message.clone();

    if code == config.malformed_payload_code {
        ResponseClass::Malformed { code, message }
    } else if code == config.content_too_long_code {
        ResponseClass::ContentTooLong { code, message }
    } else if config.is_non_retryable(code) {
        ResponseClass::NonRetryable { code, message }
    } else {
        ResponseClass::Transient {
            reason: format!("API error {code}: {message}"),
        }
    }
}
