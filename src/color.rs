//! ANSI color palette
//!
//! Each kind of outgoing message has a color. Sessions with color
//! enabled get the escape code in front of the text and a reset just
//! before the line terminator.

/// Escape sequence that restores the terminal's default formatting
pub const RESET: &str = "\u{1b}[0m";

/// Message colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Plain text, no escape codes
    None,
    /// Errors and rejections
    Red,
    /// Room notices, renames, dice rolls
    Yellow,
    /// Private messages
    Magenta,
    /// Room chat
    Cyan,
}

impl Color {
    /// ANSI escape code for this color
    pub fn code(self) -> &'static str {
        match self {
            Color::None => "",
            Color::Red => "\u{1b}[31m",
            Color::Yellow => "\u{1b}[33m",
            Color::Magenta => "\u{1b}[35m",
            Color::Cyan => "\u{1b}[36m",
        }
    }

    /// Wrap `text` in this color, keeping any trailing `\r\n` outside the
    /// colored span so the line still ends with the terminator.
    pub fn paint(self, text: &str) -> String {
        if self == Color::None {
            return text.to_string();
        }
        let (body, terminator) = match text.strip_suffix("\r\n") {
            Some(body) => (body, "\r\n"),
            None => (text, ""),
        };
        format!("{}{}{}{}", self.code(), body, RESET, terminator)
    }
}
