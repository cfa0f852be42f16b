//! Session struct definition
//!
//! Represents a connected client with their state and outbound channel.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::color::Color;
use crate::error::SendError;
use crate::types::SessionId;

/// Display name given to every new session
pub const DEFAULT_NAME: &str = "anon";

/// Connected client information
///
/// Holds all state related to a connected client: identity, display
/// name, peer address, current room and formatting preference. Output
/// goes through `sender`, drained by the connection's writer task.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Display name
    pub name: String,
    /// Peer address, resolved once at accept
    pub addr: String,
    /// Room the session is currently in (empty only before the first join)
    pub room: String,
    /// Whether outgoing text is wrapped in ANSI colors
    pub color: bool,
    /// Server → client byte channel (bounded)
    sender: mpsc::Sender<String>,
}

impl Session {
    /// Create a new session with the given ID, peer address and sender channel
    pub fn new(id: SessionId, addr: String, sender: mpsc::Sender<String>) -> Self {
        Self {
            id,
            name: DEFAULT_NAME.to_string(),
            addr,
            room: String::new(),
            color: true,
            sender,
        }
    }

    /// `[id]name`, the tag used in every announcement about this session
    pub fn tag(&self) -> String {
        format!("[{}]{}", self.id, self.name)
    }

    /// Write a message to this session
    ///
    /// `timestamp` may be empty. Never blocks: if the writer task has
    /// gone away or its queue is full, the message is dropped and an
    /// error is returned.
    pub fn send(&self, timestamp: &str, color: Color, message: &str) -> Result<(), SendError> {
        let body = if self.color {
            color.paint(message)
        } else {
            message.to_string()
        };
        self.sender
            .try_send(format!("{}{}", timestamp, body))
            .map_err(|e| match e {
                TrySendError::Full(_) => SendError::QueueFull(self.id),
                TrySendError::Closed(_) => SendError::SessionClosed(self.id),
            })
    }

    /// Flip the color preference, returning the new state
    pub fn toggle_color(&mut self) -> bool {
        self.color = !self.color;
        self.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let session = Session::new(SessionId(3), "127.0.0.1".to_string(), tx);

        assert_eq!(session.name, "anon");
        assert!(session.room.is_empty());
        assert!(session.color);
        assert_eq!(session.tag(), "[3]anon");
    }

    #[test]
    fn test_send_respects_color_preference() {
        let (tx, mut rx) = mpsc::channel(32);
        let mut session = Session::new(SessionId(1), "127.0.0.1".to_string(), tx);

        session.send("[00:00:00]", Color::Red, "bad\r\n").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "[00:00:00]\u{1b}[31mbad\u{1b}[0m\r\n");

        assert!(!session.toggle_color());
        session.send("", Color::Red, "bad\r\n").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "bad\r\n");
    }

    #[test]
    fn test_send_after_writer_gone() {
        let (tx, rx) = mpsc::channel(32);
        let session = Session::new(SessionId(1), "127.0.0.1".to_string(), tx);
        drop(rx);

        assert!(matches!(
            session.send("", Color::None, "hello\r\n"),
            Err(SendError::SessionClosed(_))
        ));
    }

    #[test]
    fn test_send_drops_when_queue_full() {
        let (tx, mut rx) = mpsc::channel(2);
        let session = Session::new(SessionId(4), "127.0.0.1".to_string(), tx);

        session.send("", Color::None, "one\r\n").unwrap();
        session.send("", Color::None, "two\r\n").unwrap();
        assert!(matches!(
            session.send("", Color::None, "three\r\n"),
            Err(SendError::QueueFull(SessionId(4)))
        ));

        // Draining makes room again
        assert_eq!(rx.try_recv().unwrap(), "one\r\n");
        session.send("", Color::None, "four\r\n").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "two\r\n");
        assert_eq!(rx.try_recv().unwrap(), "four\r\n");
        assert!(rx.try_recv().is_err());
    }
}
