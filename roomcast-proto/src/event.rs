//! Top-level wire events for the Roomcast event channel.
//!
//! Every WebSocket text frame carries exactly one JSON-encoded event,
//! adjacently tagged as `{"event": "...", "data": ...}`. [`ClientEvent`]
//! is the inbound direction (client → relay), [`ServerEvent`] the outbound
//! (relay → client).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageId};
use crate::room::RoomSummary;
use crate::typing::TypingUpdate;
use crate::user::{SessionId, UserProfile};

/// Events sent by a client to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Sets the session's profile. Idempotent; re-joining overwrites.
    JoinUser {
        /// Display name, trusted as-is.
        username: String,
        /// Avatar URL; a deterministic placeholder is derived from the
        /// username when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar: Option<String>,
    },

    /// Joins a room, creating it if the id is unknown.
    JoinRoom {
        /// Target room id; an unknown id triggers creation.
        room_id: String,
        /// Name for the room when this join creates it; a label is
        /// generated from the id when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_name: Option<String>,
        /// Redundant copy of the sender's display name. The relay trusts
        /// its own session table instead; kept for wire compatibility.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// Sends a chat message to a room.
    SendMessage {
        /// Client-chosen message id; the relay assigns one when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<MessageId>,
        /// Target room.
        room_id: String,
        /// Message text.
        message: String,
        /// Client-side send time, trusted as-is; the relay stamps receipt
        /// time when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Starts or stops the sender's typing indicator in a room.
    Typing {
        /// The room being typed in.
        room_id: String,
        /// `true` while typing; the client is responsible for sending
        /// `false`, there is no relay-side expiry.
        is_typing: bool,
    },

    /// Leaves a room. The payload is the bare room id.
    LeaveRoom(String),
}

/// Events sent by the relay to one or more clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Transport greeting: the first frame on every accepted connection,
    /// announcing the relay-assigned session id.
    Connected {
        /// The id assigned to this connection.
        session_id: SessionId,
    },

    /// Full list of profiled sessions, broadcast whenever it changes.
    UsersUpdate(Vec<UserProfile>),

    /// Full room directory, broadcast whenever it changes.
    RoomsUpdate(Vec<RoomSummary>),

    /// Buffered history of a room, unicast to a session's first join.
    MessageHistory {
        /// The room whose history this is.
        room_id: String,
        /// All user messages accepted so far, in arrival order.
        messages: Vec<Message>,
    },

    /// A user joined a room; sent to every member, the joiner included.
    UserJoinedRoom {
        /// The room after the join.
        room: RoomSummary,
        /// The user who joined.
        user: UserProfile,
        /// Transient system notice describing the join.
        message: Message,
    },

    /// A user left a room; sent to the remaining members.
    UserLeftRoom {
        /// The room after the departure.
        room: RoomSummary,
        /// The user who left.
        user: UserProfile,
        /// Transient system notice describing the departure.
        message: Message,
    },

    /// A chat message, fanned out to every current member of its room.
    ReceiveMessage(Message),

    /// Typing indicator, relayed to every member except the sender.
    UserTyping(TypingUpdate),

    /// An error concerning one of the sender's own events; never broadcast.
    MessageError {
        /// Human-readable error description.
        error: String,
        /// The room the failed event referred to.
        room_id: String,
    },
}
