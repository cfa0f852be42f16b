//! Slash-command parsing
//!
//! Splits a command line into a verb and an argument tail, validates the
//! verb and maps it onto the closed set of commands. Executing a command
//! is the engine's job (see `server::commands`).

use crate::error::CommandError;

/// Character that marks a line as a command
pub const COMMAND_PREFIX: char = '/';

/// Every command the server understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Change display name
    Name,
    /// List members of a room
    Who,
    /// List rooms
    Rooms,
    /// Join or create a room
    Join,
    /// Return to the default room
    Leave,
    /// Private message
    Tell,
    /// Roll 0..100 for the room
    Random,
    /// Toggle ANSI colors
    Color,
    /// Show usage
    Help,
}

/// Verb -> command lookup table
const COMMANDS: &[(&str, Command)] = &[
    ("name", Command::Name),
    ("who", Command::Who),
    ("rooms", Command::Rooms),
    ("join", Command::Join),
    ("leave", Command::Leave),
    ("tell", Command::Tell),
    ("random", Command::Random),
    ("color", Command::Color),
    ("help", Command::Help),
];

/// Lines returned by `/help`
pub const HELP_TEXT: &[&str] = &[
    "/name <name>            : Change your display name.",
    "/who                    : List users in current room.",
    "/who <room>             : List users in specified room.",
    "/rooms                  : List rooms.",
    "/join <room>            : Join/create the specified room.",
    "/join <room> <password> : Join/create a password protected room.",
    "/leave                  : Leave the current room.",
    "/tell <#> <message>     : Send a direct message to the specified user #.",
    "/random                 : Roll a random number from 0 to 99.",
    "/color                  : Toggle colored output.",
    "/help                   : Display available commands.",
];

impl Command {
    /// Look up a canonical (lower-case) verb
    pub fn from_verb(verb: &str) -> Option<Self> {
        COMMANDS
            .iter()
            .find(|(name, _)| *name == verb)
            .map(|(_, command)| *command)
    }

    /// Canonical verb for this command
    pub fn verb(self) -> &'static str {
        COMMANDS
            .iter()
            .find(|(_, command)| *command == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }
}

/// Parse a command line (prefix already stripped) into a command and its
/// argument tail
///
/// The trailing line terminator is dropped before tokenizing.
pub fn parse(line: &str) -> Result<(Command, &str), CommandError> {
    let mut rest = line.trim_end_matches(['\r', '\n']);
    let verb = next_token(&mut rest);
    let verb = sanitize(verb, true).ok_or(CommandError::InvalidCommand)?;
    let command = Command::from_verb(&verb).ok_or(CommandError::UnknownCommand)?;
    Ok((command, rest))
}

/// Take the next space-delimited token off the front of `rest`
///
/// Leading spaces are skipped. With no space left, the whole remainder is
/// the token and `rest` becomes empty.
pub fn next_token<'a>(rest: &mut &'a str) -> &'a str {
    let trimmed = rest.trim_start_matches(' ');
    match trimmed.split_once(' ') {
        Some((token, tail)) => {
            *rest = tail;
            token
        }
        None => {
            *rest = "";
            trimmed
        }
    }
}

/// Strip control characters and require ASCII letters
///
/// Returns `None` if anything other than a letter remains. An empty input
/// is valid and yields an empty string.
pub fn sanitize(token: &str, lowercase: bool) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    for ch in token.chars().filter(|&c| !is_control(c)) {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        out.push(if lowercase { ch.to_ascii_lowercase() } else { ch });
    }
    Some(out)
}

/// Drop control characters without any other validation
pub fn strip_control(token: &str) -> String {
    token.chars().filter(|&c| !is_control(c)).collect()
}

fn is_control(c: char) -> bool {
    (c as u32) < 32
}
