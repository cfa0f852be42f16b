//! Append-only room log
//!
//! One file per room under the configured directory, one line per
//! broadcast, each prefixed with its timestamp.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::clock;

/// Log sink attached to a room
#[derive(Debug)]
pub struct RoomLog {
    file: File,
}

impl RoomLog {
    /// Open (or create) `<dir>/<room>.log` for appending and write a header
    ///
    /// Room names are letters only, so they are safe as file names.
    pub fn open(dir: &Path, room: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.log", room));
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        write!(file, "Starting new log on {}\r\n", clock::long_date())?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Append one broadcast line
    pub fn append(&mut self, timestamp: &str, line: &str) -> io::Result<()> {
        self.file.write_all(timestamp.as_bytes())?;
        self.file.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            self.file.write_all(b"\r\n")?;
        }
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_header_and_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RoomLog::open(dir.path(), "lounge").unwrap();
        log.append("[12:00:00]", "[1]anon : hi\r\n").unwrap();
        log.append("[12:00:01]", "no terminator").unwrap();

        let contents = fs::read_to_string(dir.path().join("lounge.log")).unwrap();
        let lines: Vec<&str> = contents.split_inclusive('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Starting new log on "));
        // Every line, header included, ends in CRLF
        assert!(lines.iter().all(|line| line.ends_with("\r\n")));
        assert_eq!(lines[1], "[12:00:00][1]anon : hi\r\n");
        assert_eq!(lines[2], "[12:00:01]no terminator\r\n");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = RoomLog::open(dir.path(), "lounge").unwrap();
            log.append("[12:00:00]", "first\r\n").unwrap();
        }
        RoomLog::open(dir.path(), "lounge").unwrap();

        let contents = fs::read_to_string(dir.path().join("lounge.log")).unwrap();
        assert!(contents.contains("first"));
        assert_eq!(contents.matches("Starting new log on").count(), 2);
    }
}
