//! Message API seam
//!
//! The queue only needs "send this body, give me the response"; tests replace
//! the HTTP client with a scripted fake.

use async_trait::async_trait;
use bridge_common::{ApiResponse, PlatformClient, PlatformError};
use serde_json::Value;

/// Which message endpoint to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendAction {
    Create,
    Update,
}

impl SendAction {
    /// API path of the endpoint
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Create => "/message/create",
            Self::Update => "/message/update",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl std::fmt::Display for SendAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One call to the message API
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
    pub action: SendAction,
    pub body: Value,
}

/// Sends message requests to the platform
#[async_trait]
pub trait MessageApi: Send + Sync {
    async fn send(&self, request: &SendRequest) -> Result<ApiResponse, PlatformError>;
}

#[async_trait]
impl MessageApi for PlatformClient {
    async fn send(&self, request: &SendRequest) -> Result<ApiResponse, PlatformError> {
        self.post(request.action.path(), &request.body).await
    }
}
