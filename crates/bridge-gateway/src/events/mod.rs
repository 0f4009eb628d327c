//! Application events
//!
//! Signal-0 frames handed to the message handler, with a typed view of chat
//! and system messages.

mod frame;
mod message;

pub use frame::ApplicationFrame;
pub use message::{MessageAuthor, MessageEvent, MessageExtra, MessageType};
