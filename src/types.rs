//! Basic type definitions for the chat server
//!
//! Provides the newtype wrapper for session identity and the name of the
//! distinguished default room.

use std::num::ParseIntError;
use std::str::FromStr;

/// Name of the default room every new connection lands in
pub const DEFAULT_ROOM: &str = "global";

/// Unique session identifier (newtype pattern)
///
/// Wraps a small integer handed out by the server in connection order.
/// Users see it as `[id]` in room traffic and address it as `#id` with
/// `/tell`, so it never exposes the underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Get the raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Hands out session identifiers in increasing order
#[derive(Debug)]
pub struct SessionIdAllocator {
    next: u64,
}

impl SessionIdAllocator {
    /// Start allocating from 1
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Take the next unused identifier
    pub fn allocate(&mut self) -> SessionId {
        let id = SessionId(self.next);
        self.next += 1;
        id
    }
}

impl Default for SessionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
