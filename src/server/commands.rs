//! Slash-command execution
//!
//! Each command reads or mutates session and room state and answers the
//! caller. Rejections come back as `CommandError` and are sent to the
//! caller only, in red.

use rand::Rng;
use tracing::{debug, info, trace};

use super::ChatServer;
use crate::clock;
use crate::color::Color;
use crate::command::{self, next_token, sanitize, strip_control, Command, HELP_TEXT};
use crate::error::CommandError;
use crate::logutil::escape_log;
use crate::types::{SessionId, DEFAULT_ROOM};

impl ChatServer {
    /// Parse and run a command line (prefix already stripped)
    pub(super) fn execute_command(&mut self, session_id: SessionId, line: &str) {
        let result = command::parse(line)
            .and_then(|(command, args)| self.dispatch(session_id, command, args));

        if let Err(e) = result {
            debug!("Session {} command rejected: {}", session_id, e);
            self.reply(session_id, Color::Red, &format!("{}\r\n", e));
        }
    }

    fn dispatch(
        &mut self,
        session_id: SessionId,
        command: Command,
        args: &str,
    ) -> Result<(), CommandError> {
        trace!("Session {} runs /{}", session_id, command.verb());
        match command {
            Command::Name => self.cmd_name(session_id, args),
            Command::Who => self.cmd_who(session_id, args),
            Command::Rooms => self.cmd_rooms(session_id),
            Command::Join => self.cmd_join(session_id, args),
            Command::Leave => self.cmd_leave(session_id),
            Command::Tell => self.cmd_tell(session_id, args),
            Command::Random => self.cmd_random(session_id),
            Command::Color => self.cmd_color(session_id),
            Command::Help => self.cmd_help(session_id),
        }
    }

    fn cmd_name(&mut self, session_id: SessionId, mut args: &str) -> Result<(), CommandError> {
        let new_name = sanitize(next_token(&mut args), false).ok_or(CommandError::InvalidName)?;
        if new_name.is_empty() {
            return Err(CommandError::MissingName);
        }

        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or(CommandError::SessionGone)?;
        let notice = format!("{} is now known as {}.\r\n", session.tag(), new_name);
        info!("Session {} renamed {} -> {}", session_id, session.name, new_name);
        session.name = new_name;
        let reply = format!("Your new name is {}.\r\n", session.name);
        let room = session.room.clone();

        self.reply(session_id, Color::None, &reply);
        self.rooms
            .broadcast(&room, &self.sessions, Some(session_id), Color::Yellow, &notice);
        Ok(())
    }

    fn cmd_who(&mut self, session_id: SessionId, mut args: &str) -> Result<(), CommandError> {
        let requested =
            sanitize(next_token(&mut args), true).ok_or(CommandError::InvalidRoomName)?;
        let session = self
            .sessions
            .get(session_id)
            .ok_or(CommandError::SessionGone)?;
        let room_name = if requested.is_empty() {
            session.room.clone()
        } else {
            requested
        };
        let room = self
            .rooms
            .get(&room_name)
            .ok_or_else(|| CommandError::NoSuchRoom(room_name.clone()))?;

        let mut out = format!("Members of room \"{}\":\r\n", room.name);
        for member in room.members() {
            let Some(member_session) = self.sessions.get(member) else {
                continue;
            };
            out.push_str(&member_session.tag());
            if member == session_id {
                out.push_str(" (you)");
            }
            out.push_str("\r\n");
        }
        self.reply(session_id, Color::None, &out);
        Ok(())
    }

    fn cmd_rooms(&mut self, session_id: SessionId) -> Result<(), CommandError> {
        let mut out = String::from("Rooms (members):\r\n");
        for room in self.rooms.iter() {
            out.push_str(&format!("{} ({})\r\n", room.name, room.member_count()));
        }
        self.reply(session_id, Color::None, &out);
        Ok(())
    }

    fn cmd_join(&mut self, session_id: SessionId, mut args: &str) -> Result<(), CommandError> {
        let room_name =
            sanitize(next_token(&mut args), true).ok_or(CommandError::InvalidRoomName)?;
        if room_name.is_empty() {
            return Err(CommandError::MissingRoom);
        }
        let session = self
            .sessions
            .get(session_id)
            .ok_or(CommandError::SessionGone)?;
        if session.room == room_name {
            return Err(CommandError::AlreadyInRoom);
        }

        let password = if room_name == DEFAULT_ROOM {
            String::new()
        } else {
            strip_control(next_token(&mut args))
        };
        self.add_client_to_room(session_id, &room_name, &password)
    }

    fn cmd_leave(&mut self, session_id: SessionId) -> Result<(), CommandError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(CommandError::SessionGone)?;
        if session.room == DEFAULT_ROOM {
            return Err(CommandError::AlreadyInDefaultRoom);
        }
        self.add_client_to_room(session_id, DEFAULT_ROOM, "")
    }

    fn cmd_tell(&mut self, session_id: SessionId, mut args: &str) -> Result<(), CommandError> {
        let target: SessionId = strip_control(next_token(&mut args))
            .parse()
            .map_err(|_| CommandError::InvalidRecipient)?;
        let recipient = self
            .sessions
            .get(target)
            .ok_or(CommandError::NoSuchUser(target.get()))?;
        if strip_control(args).trim().is_empty() {
            return Err(CommandError::EmptyMessage);
        }
        let sender = self
            .sessions
            .get(session_id)
            .ok_or(CommandError::SessionGone)?;

        let text = args.trim_start_matches(' ');
        let echo = format!(">>{} : {}\r\n", recipient.tag(), text);
        let delivery = format!("{}>> {}\r\n", sender.tag(), text);
        debug!(
            "Session {} tells {}: {}",
            session_id,
            target,
            escape_log(text)
        );

        let timestamp = clock::timestamp();
        self.sessions
            .send_to(session_id, &timestamp, Color::Magenta, &echo);
        self.sessions
            .send_to(target, &timestamp, Color::Magenta, &delivery);
        Ok(())
    }

    fn cmd_random(&mut self, session_id: SessionId) -> Result<(), CommandError> {
        let roll: u32 = self.rng.gen_range(0..100);
        let session = self
            .sessions
            .get(session_id)
            .ok_or(CommandError::SessionGone)?;
        let message = format!(
            "[{}]Random! {} rolled {}.\r\n",
            session.id, session.name, roll
        );
        let room = session.room.clone();

        self.rooms
            .broadcast(&room, &self.sessions, None, Color::Yellow, &message);
        Ok(())
    }

    fn cmd_color(&mut self, session_id: SessionId) -> Result<(), CommandError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or(CommandError::SessionGone)?;
        let state = if session.toggle_color() {
            "enabled"
        } else {
            "disabled"
        };
        self.reply(
            session_id,
            Color::None,
            &format!("Color is now {}.\r\n", state),
        );
        Ok(())
    }

    fn cmd_help(&mut self, session_id: SessionId) -> Result<(), CommandError> {
        let mut out = String::new();
        for line in HELP_TEXT {
            out.push_str(line);
            out.push_str("\r\n");
        }
        self.reply(session_id, Color::None, &out);
        Ok(())
    }
}
