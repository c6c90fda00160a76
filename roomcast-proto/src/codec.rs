//! Serialization and deserialization for the Roomcast wire protocol.
//!
//! Events travel as JSON text inside WebSocket text frames; the frame
//! boundary is the message boundary, so no extra framing is needed.

use crate::event::{ClientEvent, ServerEvent};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a [`ClientEvent`] into a JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the event cannot be serialized.
pub fn encode_client(event: &ClientEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ClientEvent`] from a JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the text is not a known event.
pub fn decode_client(text: &str) -> Result<ClientEvent, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a [`ServerEvent`] into a JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the event cannot be serialized.
pub fn encode_server(event: &ServerEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ServerEvent`] from a JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the text is not a known event.
pub fn decode_server(text: &str) -> Result<ServerEvent, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Serialization(e.to_string()))
}
