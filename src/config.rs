//! Server configuration

use std::path::PathBuf;

/// Default listening address
pub const DEFAULT_ADDR: &str = "0.0.0.0:4000";

/// Bytes requested per non-blocking read
pub const READ_CHUNK_SIZE: usize = 100;

/// Channel buffer size for connection events
pub const EVENT_BUFFER_SIZE: usize = 256;

/// Messages queued per session before further output is dropped
pub const OUTBOUND_BUFFER_SIZE: usize = 256;

/// Runtime settings for a `ChatServer`
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_addr: String,
    /// Directory for per-room logs; `None` disables logging
    pub room_log_dir: Option<PathBuf>,
    /// Size of the fixed read buffer used by connection readers
    pub read_chunk_size: usize,
    /// Capacity of the connection → server event channel
    pub event_buffer: usize,
    /// Capacity of each session's server → connection channel
    pub outbound_buffer: usize,
}

impl ServerConfig {
    /// Default settings bound to the given address
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            bind_addr: addr.into(),
            ..Self::default()
        }
    }

    /// Enable room logs under `dir`
    pub fn with_room_logs(mut self, dir: impl Into<PathBuf>) -> Self {
        self.room_log_dir = Some(dir.into());
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            room_log_dir: None,
            read_chunk_size: READ_CHUNK_SIZE,
            event_buffer: EVENT_BUFFER_SIZE,
            outbound_buffer: OUTBOUND_BUFFER_SIZE,
        }
    }
}
