//! Target platform REST API access
//!
//! Shared by gateway discovery and the outbound delivery queue.

mod client;
mod response;

pub use client::PlatformClient;
pub use response::{ApiResponse, PlatformError};
