//! Registry of per-connection handler sessions.
//!
//! `SessionRegistry` maps each open stream connection to the tokens returned
//! by session-capable handlers from `session_opened`. Every read and write
//! goes through one coarse lock; operations are O(1) map lookups, so
//! contention is bounded by connection churn rather than event rate.
use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::handler::SessionToken;

/// Identifier assigned to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "ConnectionId({})", self.0) }
}

/// Position of a handler in the server's registration list.
///
/// Duplicated registrations of the same handler get distinct ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(usize);

impl HandlerId {
    #[must_use]
    pub fn new(index: usize) -> Self { Self(index) }

    #[must_use]
    pub fn index(&self) -> usize { self.0 }
}

type Sessions = HashMap<HandlerId, SessionToken>;

/// Connection to handler session map guarded by a single lock.
#[derive(Default)]
pub struct SessionRegistry(Mutex<HashMap<ConnectionId, Sessions>>);

impl SessionRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Sessions>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a newly accepted connection with no sessions.
    pub fn add_socket(&self, id: ConnectionId) { self.lock().entry(id).or_default(); }

    /// Store the session token `handler` returned for connection `id`.
    ///
    /// The connection entry is created if `add_socket` was not called.
    pub fn add_session(&self, id: ConnectionId, handler: HandlerId, token: SessionToken) {
        self.lock().entry(id).or_default().insert(handler, token);
    }

    /// Drop every session of connection `id`.
    ///
    /// The connection key itself is kept, so later lookups observe an empty
    /// map rather than a missing entry. Use [`prune`](Self::prune) to reclaim
    /// emptied entries.
    pub fn remove_socket(&self, id: ConnectionId) {
        if let Some(sessions) = self.lock().get_mut(&id) {
            sessions.clear();
        }
    }

    /// Session token stored by `handler` for connection `id`, if any.
    #[must_use]
    pub fn get_session(&self, id: ConnectionId, handler: HandlerId) -> Option<SessionToken> {
        self.lock().get(&id)?.get(&handler).cloned()
    }

    /// Snapshot of all sessions held for connection `id`.
    ///
    /// Unknown and removed connections both yield an empty map.
    #[must_use]
    pub fn sessions(&self, id: ConnectionId) -> HashMap<HandlerId, SessionToken> {
        self.lock().get(&id).cloned().unwrap_or_default()
    }

    /// Returns `true` if connection `id` has an entry, even an emptied one.
    #[must_use]
    pub fn contains_socket(&self, id: ConnectionId) -> bool { self.lock().contains_key(&id) }

    /// IDs of connections that still hold at least one session.
    #[must_use]
    pub fn active_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self
            .lock()
            .iter()
            .filter(|(_, sessions)| !sessions.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Remove entries left empty by [`remove_socket`](Self::remove_socket).
    pub fn prune(&self) { self.lock().retain(|_, sessions| !sessions.is_empty()); }

    /// Forget every connection; used when the server shuts down.
    pub fn clear(&self) { self.lock().clear(); }

    /// Number of connection entries, including emptied ones.
    #[must_use]
    pub fn len(&self) -> usize { self.lock().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.lock().is_empty() }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("connections", &self.len())
            .finish()
    }
}
