//! Chat message wire types.
//!
//! A [`Message`] is either user-authored (persisted in its room's history)
//! or a system notice for a join/leave event (broadcast once, never
//! persisted).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::UserProfile;

/// Maximum allowed message text size in bytes (64 KiB).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Unique identifier for a message within a room.
///
/// Clients may supply their own opaque id with `send_message`; when they
/// don't, the relay assigns a UUID v7 so ids stay time-ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a new relay-assigned message identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat message as carried on the wire and in room history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the room; client-supplied or relay-assigned.
    pub id: MessageId,
    /// The room this message belongs to.
    pub room_id: String,
    /// Profile of the author. For system notices this is the user the
    /// notice is about.
    pub author: UserProfile,
    /// Message text.
    pub text: String,
    /// RFC 3339 timestamp. Client-supplied timestamps are trusted as-is;
    /// the relay stamps receipt time when absent.
    pub timestamp: DateTime<Utc>,
    /// `true` for transient join/leave notices, which are never appended
    /// to room history.
    #[serde(default)]
    pub system: bool,
}

impl Message {
    /// Creates a user-authored message.
    #[must_use]
    pub fn user(
        id: Option<MessageId>,
        room_id: String,
        author: UserProfile,
        text: String,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.unwrap_or_default(),
            room_id,
            author,
            text,
            timestamp: timestamp.unwrap_or_else(Utc::now),
            system: false,
        }
    }

    /// Creates a transient system notice about `subject` (e.g. a join or
    /// leave announcement).
    #[must_use]
    pub fn system(room_id: String, subject: UserProfile, text: String) -> Self {
        Self {
            id: MessageId::generate(),
            room_id,
            author: subject,
            text,
            timestamp: Utc::now(),
            system: true,
        }
    }
}

/// Error returned when message text fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Message text is empty.
    #[error("message text is empty")]
    Empty,
    /// Message text exceeds the maximum allowed size.
    #[error("message too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Actual size of the text in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

/// Validates message text against a size limit.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] if the text is empty, or
/// [`ValidationError::TooLarge`] if it exceeds `max_size` bytes.
pub const fn validate_text(text: &str, max_size: usize) -> Result<(), ValidationError> {
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }
    let size = text.len();
    if size > max_size {
        return Err(ValidationError::TooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}
