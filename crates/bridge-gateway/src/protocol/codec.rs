//! Frame codec
//!
//! Inbound frames arrive either as text or as compressed binary (zlib, or gzip
//! from some proxies). Outbound frames are always plain JSON text.

use super::Envelope;
use flate2::read::{GzDecoder, ZlibDecoder};
use std::io::Read;
use tokio_tungstenite::tungstenite::Message;

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to decompress frame: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a transport message.
///
/// Returns `Ok(None)` for transport-level control messages (ping, pong, close).
pub fn decode(message: &Message) -> Result<Option<Envelope>, CodecError> {
    match message {
        Message::Text(text) => Ok(Some(Envelope::from_json(text)?)),
        Message::Binary(bytes) => decode_bytes(bytes).map(Some),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => Ok(None),
    }
}

/// Decompress (when needed) and parse a binary frame
pub fn decode_bytes(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let mut json = Vec::with_capacity(bytes.len() * 4);

    match bytes {
        [0x78, ..] => {
            ZlibDecoder::new(bytes)
                .read_to_end(&mut json)
                .map_err(CodecError::Decompress)?;
        }
        [0x1f, 0x8b, ..] => {
            GzDecoder::new(bytes)
                .read_to_end(&mut json)
                .map_err(CodecError::Decompress)?;
        }
        _ => json.extend_from_slice(bytes),
    }

    Ok(serde_json::from_slice(&json)?)
}

/// Encode an outbound frame
pub fn encode(envelope: &Envelope) -> Result<Message, CodecError> {
    Ok(Message::Text(envelope.to_json()?))
}
