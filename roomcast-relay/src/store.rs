//! The relay's in-memory state store: session table plus room table.
//!
//! [`RelayStore`] is an explicit value owned by the relay and guarded by a
//! single lock; every operation here is synchronous and performs its whole
//! read-modify-snapshot sequence in one call, so callers holding the lock
//! get atomicity across membership changes, history appends, and the fan-out
//! target computation. Outbound delivery goes through per-session unbounded
//! channels, so enqueueing under the lock never blocks on a slow client.

use std::collections::HashMap;

use roomcast_proto::event::ServerEvent;
use roomcast_proto::message::Message;
use roomcast_proto::room::RoomSummary;
use roomcast_proto::user::{SessionId, UserProfile};
use tokio::sync::mpsc;

use crate::rooms::Room;

/// Sender half of a session's outbound event channel.
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

/// One connected session: its (possibly unset) profile and the sender for
/// its outbound channel.
#[derive(Debug)]
struct SessionEntry {
    username: Option<String>,
    avatar: Option<String>,
    outbound: Outbound,
}

impl SessionEntry {
    fn profile(&self, id: SessionId) -> Option<UserProfile> {
        let username = self.username.clone()?;
        Some(UserProfile::new(id, username, self.avatar.clone()))
    }
}

/// The set of sessions a broadcast targets.
#[derive(Debug, Clone, Copy)]
pub enum Audience<'a> {
    /// Every profiled session.
    AllUsers,
    /// Every current member of a room.
    Room(&'a str),
    /// Every current member of a room except one (typing relays).
    RoomExcept(&'a str, SessionId),
}

/// Result of a successful `join_room`.
#[derive(Debug)]
pub struct JoinRoomOutcome {
    /// `false` when the session was already a member (idempotent re-join).
    pub newly_joined: bool,
    /// History snapshot to unicast to the joiner; empty unless this join
    /// actually added the member.
    pub history: Vec<Message>,
    /// The room after the join.
    pub room: RoomSummary,
    /// The joiner's profile.
    pub user: UserProfile,
}

/// Result of a successful `leave_room` (also produced per room on
/// disconnect).
#[derive(Debug)]
pub struct LeaveRoomOutcome {
    /// The room after the removal; `users` is empty when it was deleted.
    pub room: RoomSummary,
    /// The departing user's profile.
    pub user: UserProfile,
    /// Members remaining after the removal, in join order.
    pub remaining: Vec<SessionId>,
    /// Whether the room emptied and was deleted (history discarded).
    pub deleted: bool,
}

/// Result of a disconnect: the departed profile (if one was set) and one
/// leave outcome per room the session was in.
#[derive(Debug)]
pub struct DisconnectOutcome {
    /// Profile of the departed session, `None` if it never joined.
    pub user: Option<UserProfile>,
    /// Rooms left as part of the disconnect, with per-room snapshots.
    pub left_rooms: Vec<LeaveRoomOutcome>,
}

/// In-memory session and room tables.
#[derive(Debug, Default)]
pub struct RelayStore {
    sessions: HashMap<SessionId, SessionEntry>,
    rooms: HashMap<String, Room>,
}

impl RelayStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new anonymous session and returns its fresh id.
    pub fn connect(&mut self, outbound: Outbound) -> SessionId {
        let id = SessionId::new();
        self.sessions.insert(
            id,
            SessionEntry {
                username: None,
                avatar: None,
                outbound,
            },
        );
        id
    }

    /// Sets (or overwrites) a session's profile, returning the resulting
    /// profile. `None` if the session is unknown.
    pub fn set_profile(
        &mut self,
        session_id: SessionId,
        username: String,
        avatar: Option<String>,
    ) -> Option<UserProfile> {
        let entry = self.sessions.get_mut(&session_id)?;
        entry.username = Some(username);
        entry.avatar = avatar;
        entry.profile(session_id)
    }

    /// Returns a session's profile, `None` for unknown or anonymous
    /// sessions.
    #[must_use]
    pub fn profile(&self, session_id: SessionId) -> Option<UserProfile> {
        self.sessions.get(&session_id)?.profile(session_id)
    }

    /// All profiled sessions, sorted by username (ties broken by id) so
    /// every broadcast carries the list in a stable order.
    #[must_use]
    pub fn users(&self) -> Vec<UserProfile> {
        let mut users: Vec<UserProfile> = self
            .sessions
            .iter()
            .filter_map(|(id, entry)| entry.profile(*id))
            .collect();
        users.sort_by(|a, b| {
            a.username
                .cmp(&b.username)
                .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
        });
        users
    }

    /// The room directory, sorted by room id.
    #[must_use]
    pub fn room_directory(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self.rooms.values().map(|r| self.summarize(r)).collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    /// Summary of one room, `None` if it does not exist.
    #[must_use]
    pub fn room_summary(&self, room_id: &str) -> Option<RoomSummary> {
        self.rooms.get(room_id).map(|r| self.summarize(r))
    }

    fn summarize(&self, room: &Room) -> RoomSummary {
        RoomSummary {
            id: room.id.clone(),
            name: room.name.clone(),
            users: self.profiles_of(room.members()),
        }
    }

    fn profiles_of(&self, ids: &[SessionId]) -> Vec<UserProfile> {
        ids.iter().filter_map(|id| self.profile(*id)).collect()
    }

    /// Adds a session to a room, creating the room when the id is unknown.
    ///
    /// Returns `None` when the session has no profile; a re-join by an
    /// existing member succeeds with `newly_joined: false` and an empty
    /// history snapshot.
    pub fn join_room(
        &mut self,
        session_id: SessionId,
        room_id: &str,
        room_name: Option<String>,
    ) -> Option<JoinRoomOutcome> {
        let user = self.profile(session_id)?;

        let room = self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            let name = room_name.unwrap_or_else(|| Room::fallback_name(room_id));
            Room::new(room_id.to_string(), name)
        });
        let newly_joined = room.add_member(session_id);
        let history = if newly_joined {
            room.history().to_vec()
        } else {
            Vec::new()
        };

        let room = self.room_summary(room_id)?;
        Some(JoinRoomOutcome {
            newly_joined,
            history,
            room,
            user,
        })
    }

    /// Appends a user message to a room's history and returns `true`.
    /// Returns `false` without side effects when the room does not exist.
    pub fn append_message(&mut self, room_id: &str, message: Message) -> bool {
        self.rooms.get_mut(room_id).is_some_and(|room| {
            room.append(message);
            true
        })
    }

    /// Updates a member's typing entry, returning the member's profile for
    /// the relayed indicator. `None` when the room is unknown, the session
    /// is not a member, or the session has no profile.
    pub fn set_typing(
        &mut self,
        session_id: SessionId,
        room_id: &str,
        is_typing: bool,
    ) -> Option<UserProfile> {
        let user = self.profile(session_id)?;
        let room = self.rooms.get_mut(room_id)?;
        room.set_typing(session_id, is_typing).then_some(user)
    }

    /// Removes a session from a room, deleting the room (history included)
    /// when its membership empties. `None` when the room is unknown or the
    /// session is not a member.
    pub fn leave_room(&mut self, session_id: SessionId, room_id: &str) -> Option<LeaveRoomOutcome> {
        let user = self.profile(session_id)?;
        let room = self.rooms.get_mut(room_id)?;
        if !room.remove_member(session_id) {
            return None;
        }
        let name = room.name.clone();
        let deleted = room.is_empty();
        let remaining = room.members().to_vec();
        if deleted {
            self.rooms.remove(room_id);
        }

        let room = RoomSummary {
            id: room_id.to_string(),
            name,
            users: self.profiles_of(&remaining),
        };
        Some(LeaveRoomOutcome {
            room,
            user,
            remaining,
            deleted,
        })
    }

    /// Removes a session entirely: leaves every room it was a member of
    /// (deleting rooms that empty), then drops the session entry.
    pub fn disconnect(&mut self, session_id: SessionId) -> DisconnectOutcome {
        let user = self.profile(session_id);

        let joined: Vec<String> = self
            .rooms
            .values()
            .filter(|room| room.is_member(session_id))
            .map(|room| room.id.clone())
            .collect();
        let left_rooms = joined
            .iter()
            .filter_map(|room_id| self.leave_room(session_id, room_id))
            .collect();

        self.sessions.remove(&session_id);
        DisconnectOutcome { user, left_rooms }
    }

    /// Computes the exact set of sessions that must observe an event.
    ///
    /// This is the fan-out target computation for every broadcast: a
    /// snapshot of the current member list or session table at the moment
    /// of the triggering event.
    #[must_use]
    pub fn recipients(&self, audience: Audience<'_>) -> Vec<SessionId> {
        match audience {
            Audience::AllUsers => {
                let mut ids: Vec<SessionId> = self
                    .sessions
                    .iter()
                    .filter(|(_, entry)| entry.username.is_some())
                    .map(|(id, _)| *id)
                    .collect();
                ids.sort_by(|a, b| a.as_uuid().cmp(b.as_uuid()));
                ids
            }
            Audience::Room(room_id) => self
                .rooms
                .get(room_id)
                .map(|room| room.members().to_vec())
                .unwrap_or_default(),
            Audience::RoomExcept(room_id, excluded) => {
                let mut members = self.recipients(Audience::Room(room_id));
                members.retain(|id| *id != excluded);
                members
            }
        }
    }

    /// Enqueues an event for one session. Unknown sessions and closed
    /// channels are ignored; delivery is best-effort.
    pub fn send_to(&self, session_id: SessionId, event: ServerEvent) {
        if let Some(entry) = self.sessions.get(&session_id) {
            let _ = entry.outbound.send(event);
        }
    }

    /// Enqueues a clone of an event for each listed session.
    pub fn send_to_many(&self, ids: &[SessionId], event: &ServerEvent) {
        for id in ids {
            self.send_to(*id, event.clone());
        }
    }

    /// Enqueues a clone of an event for every recipient of an audience.
    pub fn broadcast(&self, audience: Audience<'_>, event: &ServerEvent) {
        let ids = self.recipients(audience);
        self.send_to_many(&ids, event);
    }

    /// Number of connected sessions (profiled or not).
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
