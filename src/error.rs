//! Error types for the chat server
//!
//! Defines setup/transport errors, session write errors, and the
//! user-facing rejections produced by the command interpreter.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::SessionId;

/// Application-level errors
///
/// Binding failures are fatal at startup; everything else is contained
/// to the connection it happened on.
#[derive(Debug, Error)]
pub enum AppError {
    /// Could not bind the listening socket (fatal)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Session write errors
///
/// Occurs when the writer task for a session has gone away or has
/// fallen too far behind. Either way the message is dropped.
#[derive(Debug, Error)]
pub enum SendError {
    /// The session's outbound channel has been closed
    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    /// The session's outbound queue is full (peer is not reading)
    #[error("session {0} outbound queue is full")]
    QueueFull(SessionId),
}

/// Rejections sent back to the originating session
///
/// The `Display` text is exactly the line the user sees (without the
/// terminator). None of these change any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Verb contained something other than letters
    #[error("Invalid command.")]
    InvalidCommand,

    /// Verb is not in the command table
    #[error("Unknown command.")]
    UnknownCommand,

    /// Room name contained something other than letters
    #[error("Invalid room name.")]
    InvalidRoomName,

    /// `/who <room>` named a room that does not exist
    #[error("Room \"{0}\" doesn't exist!")]
    NoSuchRoom(String),

    /// Display name contained something other than letters
    #[error("Invalid name.")]
    InvalidName,

    /// `/name` without an argument
    #[error("Please specify a new name.")]
    MissingName,

    /// `/join` without an argument
    #[error("Please specify a room to join.")]
    MissingRoom,

    /// `/join` on the room the session is already in
    #[error("You are already in that room.")]
    AlreadyInRoom,

    /// `/leave` from the default room
    #[error("You are already in the global room.")]
    AlreadyInDefaultRoom,

    /// Room password did not match
    #[error("Incorrect password!")]
    IncorrectPassword,

    /// `/tell` target was not a number
    #[error("Please enter a valid recipient number.")]
    InvalidRecipient,

    /// `/tell` target is not connected
    #[error("User #{0} does not exist.")]
    NoSuchUser(u64),

    /// `/tell` without any text
    #[error("Please enter a message to send.")]
    EmptyMessage,

    /// The acting session vanished before the command ran
    #[error("Your session is no longer connected.")]
    SessionGone,
}
