//! Connection management
//!
//! Connection state, the resumable session, its durable store and the heartbeat scheduler.

mod heartbeat;
mod session;
mod state;
mod store;

pub use heartbeat::{sleep_until_deadline, HeartbeatAction, HeartbeatScheduler};
pub use session::Session;
pub use state::ConnectionState;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, SessionStoreError};
