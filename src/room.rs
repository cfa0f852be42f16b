//! Room struct definition
//!
//! Represents a named broadcast domain with a member set, an optional
//! password and an optional log.

use std::collections::BTreeSet;

use crate::room_log::RoomLog;
use crate::types::SessionId;

/// Chat room
///
/// Members are referenced by id only; the sessions themselves live in
/// the session registry.
#[derive(Debug)]
pub struct Room {
    /// Room name (unique key)
    pub name: String,
    /// Password required to join; empty means unprotected
    password: String,
    /// Current members
    members: BTreeSet<SessionId>,
    /// Append-only log, if logging is enabled
    pub log: Option<RoomLog>,
}

impl Room {
    /// Create an empty room with the given name and password
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            members: BTreeSet::new(),
            log: None,
        }
    }

    /// Attach a log sink
    pub fn with_log(mut self, log: RoomLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Check whether `password` opens this room
    pub fn accepts(&self, password: &str) -> bool {
        self.password.is_empty() || self.password == password
    }

    /// Add a member; returns false if it was already present
    pub fn insert(&mut self, id: SessionId) -> bool {
        self.members.insert(id)
    }

    /// Remove a member; returns false if it was not present
    pub fn remove(&mut self, id: SessionId) -> bool {
        self.members.remove(&id)
    }

    /// Check if a session is in this room
    pub fn contains(&self, id: SessionId) -> bool {
        self.members.contains(&id)
    }

    /// Members in ascending id order
    pub fn members(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.members.iter().copied()
    }

    /// Number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if nobody is left
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_creation() {
        let room = Room::new("lounge", "");

        assert_eq!(room.name, "lounge");
        assert!(room.is_empty());
        assert!(room.log.is_none());
    }

    #[test]
    fn test_open_room_accepts_anything() {
        let room = Room::new("lounge", "");
        assert!(room.accepts(""));
        assert!(room.accepts("whatever"));
    }

    #[test]
    fn test_protected_room_password() {
        let room = Room::new("lounge", "hunter2");
        assert!(room.accepts("hunter2"));
        assert!(!room.accepts("hunter"));
        assert!(!room.accepts("wrongpass"));
        assert!(!room.accepts(""));
    }

    #[test]
    fn test_membership() {
        let mut room = Room::new("lounge", "");
        assert!(room.insert(SessionId(2)));
        assert!(room.insert(SessionId(1)));
        assert!(!room.insert(SessionId(1)));
        assert_eq!(room.member_count(), 2);
        assert_eq!(
            room.members().collect::<Vec<_>>(),
            vec![SessionId(1), SessionId(2)]
        );

        assert!(room.remove(SessionId(1)));
        assert!(!room.remove(SessionId(1)));
        assert!(room.contains(SessionId(2)));
        assert!(!room.contains(SessionId(1)));

        room.remove(SessionId(2));
        assert!(room.is_empty());
    }
}
