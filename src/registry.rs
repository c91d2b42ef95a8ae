//! Session registry and connection routing
//!
//! This module tracks every currently-open attempt and allows a
//! reconnecting client to resume it. The live transport is connectionless
//! between messages (any event may arrive after a reconnect under a new
//! connection identifier), so the registry keeps session identity and
//! connection identity decoupled through an explicit bidirectional
//! mapping with a `rebind` operation. It also tracks which connections
//! belong to which room so completions can be broadcast without touching
//! the durable stores.

use std::collections::{HashMap, HashSet};

use web_time::SystemTime;

use crate::ids::{ConnectionId, ProfileId, QuizId, RoomId, SessionId, UserId};

/// In-memory entry for one open attempt
#[derive(Debug, Clone)]
pub struct ActiveSession {
    /// The session this entry tracks
    pub session_id: SessionId,
    /// The quiz being attempted
    pub quiz_id: QuizId,
    /// The room the attempt belongs to, for room sessions
    pub room_id: Option<RoomId>,
    /// The user account taking the attempt
    pub user_id: UserId,
    /// The student profile credited with the outcome
    pub profile_id: ProfileId,
    /// When the attempt started
    pub started_at: SystemTime,
    /// The connection currently driving the session
    pub connection: ConnectionId,
}

/// Tracks open attempts and routes connections to them
///
/// The registry is process-scoped state owned by the lifecycle
/// controller, never ambient: each controller (and each test) gets a
/// fresh instance.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: HashMap<SessionId, ActiveSession>,
    by_connection: HashMap<ConnectionId, SessionId>,
    room_members: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl SessionRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry for a freshly started or restored session
    ///
    /// The entry's connection is bound to the session, and for room
    /// sessions the connection joins the room's broadcast set. If the
    /// session is already tracked under another connection (a restore
    /// with no preceding disconnect), the old connection's mappings are
    /// cleared first so they cannot go stale.
    pub fn insert(&mut self, entry: ActiveSession) {
        if let Some(previous) = self.active.get(&entry.session_id) {
            let old = previous.connection;
            if old != entry.connection {
                if self.by_connection.get(&old) == Some(&entry.session_id) {
                    self.by_connection.remove(&old);
                }
                if let Some(members) =
                    previous.room_id.and_then(|room| self.room_members.get_mut(&room))
                {
                    members.remove(&old);
                }
            }
        }
        self.by_connection.insert(entry.connection, entry.session_id);
        if let Some(room) = entry.room_id {
            self.room_members.entry(room).or_default().insert(entry.connection);
        }
        self.active.insert(entry.session_id, entry);
    }

    /// Looks up the entry of an open session
    pub fn get(&self, session: SessionId) -> Option<&ActiveSession> {
        self.active.get(&session)
    }

    /// Returns the session currently bound to a connection
    pub fn session_for_connection(&self, connection: ConnectionId) -> Option<SessionId> {
        self.by_connection.get(&connection).copied()
    }

    /// Rebinds a session to a new connection
    ///
    /// Late events from a reconnected client carry a fresh connection
    /// identifier; rebinding keeps them routed to the correct session.
    /// The new connection inherits the session's room membership.
    pub fn rebind(&mut self, connection: ConnectionId, session: SessionId) {
        let Some(entry) = self.active.get_mut(&session) else {
            return;
        };

        let old = entry.connection;
        entry.connection = connection;
        let room = entry.room_id;

        if self.by_connection.get(&old) == Some(&session) {
            self.by_connection.remove(&old);
        }
        self.by_connection.insert(connection, session);

        if let Some(room) = room {
            let members = self.room_members.entry(room).or_default();
            members.remove(&old);
            members.insert(connection);
        }
    }

    /// Removes the entry of a session after successful submission
    ///
    /// The connection's room membership is preserved so a submitter keeps
    /// receiving room broadcasts until they disconnect; the durable
    /// session row is untouched by this call.
    pub fn evict(&mut self, session: SessionId) -> Option<ActiveSession> {
        let entry = self.active.remove(&session)?;
        if self.by_connection.get(&entry.connection) == Some(&session) {
            self.by_connection.remove(&entry.connection);
        }
        Some(entry)
    }

    /// The connections currently receiving a room's broadcasts
    pub fn room_connections(&self, room: RoomId) -> Vec<ConnectionId> {
        self.room_members
            .get(&room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Clears a dropped connection's mappings
    ///
    /// The session itself is preserved: it stays open in the registry and
    /// in durable storage, resumable through a restore with a new
    /// connection. Returns the session the connection was driving, if
    /// any.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<SessionId> {
        for members in self.room_members.values_mut() {
            members.remove(&connection);
        }
        self.room_members.retain(|_, members| !members.is_empty());
        self.by_connection.remove(&connection)
    }

    /// Number of open attempts
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no attempts are open
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
