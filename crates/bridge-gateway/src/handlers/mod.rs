//! Message handlers
//!
//! The gateway hands every application frame to a [`MessageHandler`]. Handlers
//! own their error handling; nothing they do can fail the gateway loop.

mod relay;

pub use relay::RelayHandler;

use crate::events::ApplicationFrame;
use async_trait::async_trait;

/// Consumer of application frames
///
/// Frames arrive one at a time, in sequence order, without duplicates.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, frame: ApplicationFrame);
}
