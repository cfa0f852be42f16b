//! Multi-room TCP chat relay library
//!
//! A line-oriented chat server: clients connect over TCP, land in the
//! `global` room, chat with whoever shares their room and drive the
//! server with slash-commands (`/name`, `/join`, `/tell`, ...).
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the listener, the session
//!   registry and the room registry
//! - Each connection has a `handler` task that reads whatever the socket
//!   has ready, frames it as one line, and forwards it to the server
//! - No locks needed - all state access goes through one event channel,
//!   and the binary runs everything on a single-threaded runtime
//!
//! # Example
//! ```ignore
//! use chatter::{ChatServer, ServerConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let server = ChatServer::bind(ServerConfig::with_addr("127.0.0.1:4000"))
//!         .await
//!         .unwrap();
//!     server.run(async { tokio::signal::ctrl_c().await.unwrap() }).await;
//! }
//! ```

pub mod clock;
pub mod color;
pub mod command;
pub mod config;
pub mod error;
pub mod framer;
pub mod handler;
pub mod logutil;
pub mod registry;
pub mod room;
pub mod room_log;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use color::Color;
pub use command::Command;
pub use config::ServerConfig;
pub use error::{AppError, CommandError, SendError};
pub use framer::LineFramer;
pub use registry::{RoomRegistry, SessionRegistry};
pub use room::Room;
pub use server::{ChatServer, ConnectionEvent};
pub use session::Session;
pub use types::{SessionId, DEFAULT_ROOM};
