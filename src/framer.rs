//! Best-effort line framing
//!
//! A line is whatever bytes arrived during one readiness turn. The
//! reader pushes every chunk it can get without blocking, then takes the
//! line. A message that trickles in over several turns comes out as
//! several lines.

/// Canonical line terminator on the wire
pub const TERMINATOR: &str = "\r\n";

/// Per-session pending buffer
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk from a non-blocking read
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Finish the turn and hand back the framed line
    ///
    /// Returns `None` if nothing arrived. Everything from the first NUL
    /// byte on is dropped, invalid UTF-8 is replaced, and the result
    /// always ends in `\r\n` (a bare trailing `\n` is upgraded).
    pub fn take_line(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.pending);
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let mut line = String::from_utf8_lossy(&bytes[..end]).into_owned();

        if !line.ends_with(TERMINATOR) {
            if line.ends_with('\n') {
                line.pop();
            }
            line.push_str(TERMINATOR);
        }
        Some(line)
    }
}
