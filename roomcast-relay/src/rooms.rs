//! A single chat room: membership, history, and typing state.
//!
//! Rooms are created lazily by the first `join_room` naming an unknown id
//! and deleted by the store as soon as the member list empties. Everything
//! here is plain data; locking and fan-out live in the store and relay.

use std::collections::HashSet;

use roomcast_proto::message::Message;
use roomcast_proto::user::SessionId;

/// In-memory state of one room.
#[derive(Debug)]
pub struct Room {
    /// Unique room identifier, chosen by the creating client.
    pub id: String,
    /// Human-readable room name, fixed at creation.
    pub name: String,
    /// Members in join order. Never contains the same session twice.
    members: Vec<SessionId>,
    /// Append-only user-message history in arrival order. Unbounded;
    /// discarded with the room.
    history: Vec<Message>,
    /// Sessions currently typing. Entries are removed only by an explicit
    /// `typing: false` or by membership removal; always a subset of
    /// `members`.
    typing: HashSet<SessionId>,
}

impl Room {
    /// Creates an empty room.
    #[must_use]
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            members: Vec::new(),
            history: Vec::new(),
            typing: HashSet::new(),
        }
    }

    /// Generates a display name for a room created without one.
    #[must_use]
    pub fn fallback_name(room_id: &str) -> String {
        format!("Room {room_id}")
    }

    /// Adds a member, returning `false` if the session was already one.
    pub fn add_member(&mut self, session_id: SessionId) -> bool {
        if self.is_member(session_id) {
            return false;
        }
        self.members.push(session_id);
        true
    }

    /// Removes a member and their typing entry, returning `false` if the
    /// session was not a member.
    pub fn remove_member(&mut self, session_id: SessionId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != session_id);
        self.typing.remove(&session_id);
        self.members.len() != before
    }

    /// Whether the session is currently a member.
    #[must_use]
    pub fn is_member(&self, session_id: SessionId) -> bool {
        self.members.contains(&session_id)
    }

    /// Whether the room has no members (and must be deleted).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Current members in join order.
    #[must_use]
    pub fn members(&self) -> &[SessionId] {
        &self.members
    }

    /// Appends a user message to the history.
    pub fn append(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Full message history in arrival order.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Updates a member's typing entry. Returns `false` (without mutating)
    /// when the session is not a member.
    pub fn set_typing(&mut self, session_id: SessionId, is_typing: bool) -> bool {
        if !self.is_member(session_id) {
            return false;
        }
        if is_typing {
            self.typing.insert(session_id);
        } else {
            self.typing.remove(&session_id);
        }
        true
    }

    /// Sessions currently typing.
    #[must_use]
    pub const fn typing(&self) -> &HashSet<SessionId> {
        &self.typing
    }
}
