//! Session and room registries
//!
//! The engine owns exactly one of each. Sessions are keyed by id, rooms
//! by name; rooms refer to their members by id so nothing dangles once a
//! session is removed.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::clock;
use crate::color::Color;
use crate::room::Room;
use crate::room_log::RoomLog;
use crate::session::Session;
use crate::types::{SessionId, DEFAULT_ROOM};

/// All connected sessions: SessionId -> Session
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its own id
    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id, session);
    }

    /// Remove a session, handing it back if it was present
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    /// Look up a session
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Look up a session for mutation
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Check if a session is connected
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of connected sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if nobody is connected
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Send a message to one session, logging (not propagating) failures
    pub fn send_to(&self, id: SessionId, timestamp: &str, color: Color, message: &str) {
        match self.sessions.get(&id) {
            Some(session) => {
                if let Err(e) = session.send(timestamp, color, message) {
                    debug!("Dropped message: {}", e);
                }
            }
            None => debug!("Dropped message for unknown session {}", id),
        }
    }

    /// Send a plain message to every connected session
    pub fn send_to_all(&self, timestamp: &str, message: &str) {
        for session in self.sessions.values() {
            if let Err(e) = session.send(timestamp, Color::None, message) {
                debug!("Dropped server-wide message: {}", e);
            }
        }
    }

    /// Drop every session, closing their outbound channels
    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

/// All live rooms: name -> Room
///
/// The default room is created up front and is never removed, so new
/// connections and `/leave` always have somewhere to go.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: BTreeMap<String, Room>,
    /// Directory for per-room logs; `None` disables logging
    log_dir: Option<PathBuf>,
}

impl RoomRegistry {
    /// Create a registry holding only the default room
    pub fn new(log_dir: Option<PathBuf>) -> Self {
        let mut registry = Self {
            rooms: BTreeMap::new(),
            log_dir,
        };
        registry.get_or_create(DEFAULT_ROOM, "");
        registry
    }

    /// Whether rooms write logs
    pub fn logging_enabled(&self) -> bool {
        self.log_dir.is_some()
    }

    /// Find a room, creating it with `password` if absent
    ///
    /// The default room never takes a password.
    pub fn get_or_create(&mut self, name: &str, password: &str) -> &mut Room {
        let log_dir = self.log_dir.as_deref();
        self.rooms.entry(name.to_string()).or_insert_with(|| {
            let password = if name == DEFAULT_ROOM { "" } else { password };
            let room = Room::new(name, password);
            info!("Room {} created", name);
            match log_dir.map(|dir| RoomLog::open(dir, name)) {
                Some(Ok(log)) => room.with_log(log),
                Some(Err(e)) => {
                    warn!("Could not open log for room {}: {}", name, e);
                    room
                }
                None => room,
            }
        })
    }

    /// Look up a room
    pub fn get(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// Check if a room exists
    pub fn contains(&self, name: &str) -> bool {
        self.rooms.contains_key(name)
    }

    /// Remove a room if it is empty and not the default room
    ///
    /// Returns true if the room was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        if name == DEFAULT_ROOM {
            return false;
        }
        match self.rooms.get(name) {
            Some(room) if room.is_empty() => {
                self.rooms.remove(name);
                info!("Room {} deleted (empty)", name);
                true
            }
            _ => false,
        }
    }

    /// Iterate over rooms in name order
    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Number of live rooms, the default room included
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Add a session to a room and announce it to the existing members
    ///
    /// Returns false, changing nothing, if the room does not exist, the
    /// session is unknown, or the password does not match.
    pub fn add_member(
        &mut self,
        name: &str,
        sessions: &SessionRegistry,
        id: SessionId,
        password: &str,
    ) -> bool {
        let Some(session) = sessions.get(id) else {
            return false;
        };
        let Some(room) = self.rooms.get_mut(name) else {
            return false;
        };
        if !room.accepts(password) {
            debug!("Session {} gave a bad password for room {}", id, name);
            return false;
        }

        room.insert(id);
        let notice = format!("{} has joined the room!\r\n", session.tag());
        deliver(room, sessions, Some(id), Color::Yellow, &notice);
        true
    }

    /// Remove a session from a room, announce the departure, and delete
    /// the room if that left it empty
    ///
    /// Returns true if the room was deleted.
    pub fn remove_member(&mut self, name: &str, sessions: &SessionRegistry, id: SessionId) -> bool {
        let Some(room) = self.rooms.get_mut(name) else {
            return false;
        };
        if !room.remove(id) {
            return false;
        }

        if let Some(session) = sessions.get(id) {
            let notice = format!("{} has left the room!\r\n", session.tag());
            deliver(room, sessions, Some(id), Color::Yellow, &notice);
        }
        self.remove(name)
    }

    /// Send `message` to every member of a room except `exclude`
    pub fn broadcast(
        &mut self,
        name: &str,
        sessions: &SessionRegistry,
        exclude: Option<SessionId>,
        color: Color,
        message: &str,
    ) {
        match self.rooms.get_mut(name) {
            Some(room) => deliver(room, sessions, exclude, color, message),
            None => debug!("Broadcast to missing room {}", name),
        }
    }
}

/// Log a message to the room (if logging) and fan it out to members
fn deliver(
    room: &mut Room,
    sessions: &SessionRegistry,
    exclude: Option<SessionId>,
    color: Color,
    message: &str,
) {
    let timestamp = clock::timestamp();
    if let Some(log) = room.log.as_mut() {
        if let Err(e) = log.append(&timestamp, message) {
            warn!("Failed to write log for room {}: {}", room.name, e);
        }
    }

    for member in room.members() {
        if Some(member) == exclude {
            continue;
        }
        let Some(session) = sessions.get(member) else {
            warn!("Room {} lists unknown session {}", room.name, member);
            continue;
        };
        if let Err(e) = session.send(&timestamp, color, message) {
            warn!("Failed to deliver to {} in room {}: {}", member, room.name, e);
        }
    }
}
