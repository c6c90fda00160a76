//! Typing indicator types for real-time keystroke status.

use serde::{Deserialize, Serialize};

use crate::user::UserProfile;

/// A typing indicator relayed to the other members of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingUpdate {
    /// The user who is typing (or stopped typing).
    pub user: UserProfile,
    /// The room where typing is occurring.
    pub room_id: String,
    /// Whether the user is currently typing (`true`) or stopped (`false`).
    pub is_typing: bool,
}
