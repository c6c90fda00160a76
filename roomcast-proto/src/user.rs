//! Session identity and user profile types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connected session, based on UUID v7 for
/// time-ordering. Assigned by the relay when the transport connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new time-ordered session identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `SessionId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session's public identity as seen by other clients.
///
/// Carried in `users_update` broadcasts, room membership lists, and as the
/// author of every message. The username is client-supplied and trusted
/// as-is; it is not unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The session this profile belongs to.
    pub id: SessionId,
    /// Display name, client-supplied.
    pub username: String,
    /// Avatar image URL.
    pub avatar: String,
}

impl UserProfile {
    /// Creates a profile, substituting a deterministic placeholder avatar
    /// when none is supplied.
    #[must_use]
    pub fn new(id: SessionId, username: String, avatar: Option<String>) -> Self {
        let avatar = avatar.unwrap_or_else(|| placeholder_avatar(&username));
        Self {
            id,
            username,
            avatar,
        }
    }
}

/// Derives a placeholder avatar URL from a username.
///
/// The same username always yields the same URL. The username is reduced to
/// an FNV-1a hash so arbitrary display names never need URL escaping.
#[must_use]
pub fn placeholder_avatar(username: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in username.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("https://api.dicebear.com/9.x/identicon/svg?seed={hash:016x}")
}
