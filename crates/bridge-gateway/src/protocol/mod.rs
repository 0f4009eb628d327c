//! Gateway protocol definitions
//!
//! Defines the wire protocol: signal codes, the frame envelope, payloads and the codec.

mod codec;
mod envelope;
mod payloads;
mod signals;

pub use codec::{decode, decode_bytes, encode, CodecError};
pub use envelope::Envelope;
pub use payloads::{HelloPayload, ResumeAckPayload, HANDSHAKE_TOKEN_EXPIRED};
pub use signals::Signal;
