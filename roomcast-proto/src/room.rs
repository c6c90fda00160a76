//! Room directory wire types.

use serde::{Deserialize, Serialize};

use crate::user::UserProfile;

/// Summary of a room as carried in `rooms_update` broadcasts and in
/// join/leave notices.
///
/// The directory carries metadata and the current member profiles only;
/// message history is delivered separately via `message_history` to a
/// session's first join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Unique room identifier, chosen by whichever client created the room.
    pub id: String,
    /// Human-readable room name.
    pub name: String,
    /// Current members in join order.
    pub users: Vec<UserProfile>,
}
