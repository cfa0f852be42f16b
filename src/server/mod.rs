//! ChatServer engine
//!
//! The central actor that owns the listener and all state: sessions and
//! rooms. Connection tasks report what they read through one mpsc
//! channel; every state change happens here, one event at a time, so
//! broadcasts go out in arrival order without any locking.

mod commands;

use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::clock;
use crate::color::Color;
use crate::command::COMMAND_PREFIX;
use crate::config::ServerConfig;
use crate::error::{AppError, CommandError};
use crate::handler::handle_connection;
use crate::logutil::escape_log;
use crate::registry::{RoomRegistry, SessionRegistry};
use crate::session::Session;
use crate::types::{SessionId, SessionIdAllocator, DEFAULT_ROOM};

/// Lines starting with a byte below this are noise
const PRINTABLE_THRESHOLD: u8 = 32;

/// Events sent from connection tasks to the ChatServer
#[derive(Debug)]
pub enum ConnectionEvent {
    /// One readiness turn's worth of input, framed as a line
    Line { session_id: SessionId, line: String },
    /// The peer closed the connection or reading failed
    Closed { session_id: SessionId },
}

impl ConnectionEvent {
    /// Session the event belongs to
    pub fn session_id(&self) -> SessionId {
        match self {
            ConnectionEvent::Line { session_id, .. } | ConnectionEvent::Closed { session_id } => {
                *session_id
            }
        }
    }
}

/// The chat server engine
///
/// Lifecycle: [`ChatServer::bind`], then [`ChatServer::run`] (or repeated
/// [`ChatServer::poll_once`]), then [`ChatServer::shutdown`].
pub struct ChatServer {
    /// Listening socket
    listener: TcpListener,
    /// All connected sessions
    sessions: SessionRegistry,
    /// All live rooms
    rooms: RoomRegistry,
    /// Session id source
    ids: SessionIdAllocator,
    /// Handed to each connection task
    events_tx: mpsc::Sender<ConnectionEvent>,
    /// Event receiver
    events_rx: mpsc::Receiver<ConnectionEvent>,
    /// Event held back for the next iteration because its session was
    /// already serviced in this one
    deferred: Option<ConnectionEvent>,
    /// Dice for /random, seeded once
    rng: StdRng,
    config: ServerConfig,
}

impl ChatServer {
    /// Bind the listener and set up empty registries
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| AppError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));

        Ok(Self {
            listener,
            sessions: SessionRegistry::new(),
            rooms: RoomRegistry::new(config.room_log_dir.clone()),
            ids: SessionIdAllocator::new(),
            events_tx,
            events_rx,
            deferred: None,
            rng: StdRng::from_entropy(),
            config,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Connected sessions
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Live rooms
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Run until `shutdown` resolves, then close every session
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("ChatServer started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                () = self.poll_once() => {}
            }
        }

        self.shutdown();
    }

    /// One iteration of the event loop
    ///
    /// Waits until a connection is pending or some session produced
    /// input, then handles everything that is ready. Each session is
    /// serviced at most once per iteration.
    pub async fn poll_once(&mut self) {
        let first = match self.deferred.take() {
            Some(event) => event,
            None => tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.accept(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                    return;
                }
                Some(event) = self.events_rx.recv() => event,
            },
        };

        let mut serviced = HashSet::from([first.session_id()]);
        self.handle_event(first);

        while let Ok(event) = self.events_rx.try_recv() {
            if !serviced.insert(event.session_id()) {
                self.deferred = Some(event);
                break;
            }
            self.handle_event(event);
        }
    }

    /// Tell everyone the server is going away and drop every session
    ///
    /// Dropping a session closes its outbound channel, which ends the
    /// connection's writer and with it the socket.
    pub fn shutdown(&mut self) {
        info!("ChatServer shutting down ({} sessions)", self.sessions.len());
        self.sessions
            .send_to_all(&clock::timestamp(), "Server is shutting down.\r\n");
        self.sessions.clear();
        self.deferred = None;
    }

    /// Register an accepted socket and start its connection task
    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_buffer.max(1));
        let session_id = self.register_session(addr.ip().to_string(), outbound_tx);

        tokio::spawn(handle_connection(
            session_id,
            stream,
            outbound_rx,
            self.events_tx.clone(),
            self.config.read_chunk_size,
        ));
    }

    /// Create a session, announce it, and put it in the default room
    ///
    /// `sender` is the session's outbound channel; whatever drains it
    /// stands in for the socket. Once it is full, further output to the
    /// session is dropped.
    pub fn register_session(&mut self, addr: String, sender: mpsc::Sender<String>) -> SessionId {
        let session_id = self.ids.allocate();
        let session = Session::new(session_id, addr, sender);

        self.sessions.send_to_all(
            &clock::timestamp(),
            &format!("{} has connected!\r\n", session.tag()),
        );
        info!("New connection from {} as session {}", session.addr, session_id);
        self.sessions.insert(session);

        self.reply(
            session_id,
            Color::None,
            &format!("Welcome! You are #{}.\r\n", session_id),
        );
        let logging = if self.rooms.logging_enabled() {
            "enabled"
        } else {
            "disabled"
        };
        self.reply(
            session_id,
            Color::None,
            &format!("Logging is {}.\r\n", logging),
        );

        if let Err(e) = self.add_client_to_room(session_id, DEFAULT_ROOM, "") {
            error!("Could not place session {} in {}: {}", session_id, DEFAULT_ROOM, e);
        }

        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.room_count()
        );
        session_id
    }

    /// Process a single event
    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Line { session_id, line } => self.handle_line(session_id, line),
            ConnectionEvent::Closed { session_id } => self.disconnect(session_id),
        }
    }

    /// Classify one framed line: noise, command, or chat
    fn handle_line(&mut self, session_id: SessionId, line: String) {
        let Some(session) = self.sessions.get(session_id) else {
            debug!("Input for unknown session {} ignored", session_id);
            return;
        };
        trace!("Session {} sent {}", session_id, escape_log(&line));

        match line.chars().next() {
            None => {}
            Some(c) if (c as u32) < u32::from(PRINTABLE_THRESHOLD) => {}
            Some(COMMAND_PREFIX) => {
                self.execute_command(session_id, &line[COMMAND_PREFIX.len_utf8()..]);
            }
            Some(_) => {
                let message = format!("{} : {}", session.tag(), line);
                let room = session.room.clone();
                self.rooms
                    .broadcast(&room, &self.sessions, Some(session_id), Color::Cyan, &message);
            }
        }
    }

    /// Tear down a session: leave its room, forget it, tell everyone
    ///
    /// Safe to call for a session that is already gone.
    pub fn disconnect(&mut self, session_id: SessionId) {
        let Some(session) = self.sessions.get(session_id) else {
            debug!("Session {} already disconnected", session_id);
            return;
        };
        let room = session.room.clone();
        let tag = session.tag();
        info!("Disconnected {} from session {}", session.addr, session_id);

        self.rooms.remove_member(&room, &self.sessions, session_id);
        self.sessions.remove(session_id);
        self.sessions
            .send_to_all(&clock::timestamp(), &format!("{} has disconnected!\r\n", tag));

        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.room_count()
        );
    }

    /// Move a session into `room_name`
    ///
    /// Joins the new room before leaving the old one, so the session is
    /// never in zero rooms. A bad password leaves it where it was.
    fn add_client_to_room(
        &mut self,
        session_id: SessionId,
        room_name: &str,
        password: &str,
    ) -> Result<(), CommandError> {
        let old_room = self
            .sessions
            .get(session_id)
            .ok_or(CommandError::SessionGone)?
            .room
            .clone();
        if old_room == room_name {
            return Ok(());
        }
        let password = if room_name == DEFAULT_ROOM { "" } else { password };

        self.rooms.get_or_create(room_name, password);
        if !self
            .rooms
            .add_member(room_name, &self.sessions, session_id, password)
        {
            return Err(CommandError::IncorrectPassword);
        }

        if !old_room.is_empty() {
            self.reply(
                session_id,
                Color::None,
                &format!("Leaving room: {}\r\n", old_room),
            );
            self.rooms
                .remove_member(&old_room, &self.sessions, session_id);
        }
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.room = room_name.to_string();
        }
        self.reply(
            session_id,
            Color::None,
            &format!("Joined room: {}\r\n", room_name),
        );
        info!("Session {} joined room {}", session_id, room_name);
        Ok(())
    }

    /// Send an untimestamped line to one session
    fn reply(&self, session_id: SessionId, color: Color, message: &str) {
        self.sessions.send_to(session_id, "", color, message);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A server bound to an ephemeral loopback port
    pub(crate) async fn test_server() -> ChatServer {
        test_server_with(ServerConfig::with_addr("127.0.0.1:0")).await
    }

    pub(crate) async fn test_server_with(config: ServerConfig) -> ChatServer {
        ChatServer::bind(config).await.unwrap()
    }

    /// Register an in-memory session with colors off
    pub(crate) fn connect(server: &mut ChatServer) -> (SessionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(server.config.outbound_buffer);
        let id = server.register_session("127.0.0.1".to_string(), tx);
        server.sessions.get_mut(id).unwrap().color = false;
        (id, rx)
    }

    pub(crate) fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    pub(crate) fn send_line(server: &mut ChatServer, id: SessionId, line: &str) {
        server.handle_event(ConnectionEvent::Line {
            session_id: id,
            line: line.to_string(),
        });
    }

    pub(crate) fn room_of(server: &ChatServer, id: SessionId) -> String {
        server.sessions.get(id).unwrap().room.clone()
    }

    #[tokio::test]
    async fn test_connect_lands_in_global() {
        let mut server = test_server().await;
        let (c1, mut rx1) = connect(&mut server);

        assert_eq!(room_of(&server, c1), DEFAULT_ROOM);
        assert!(server.rooms.get(DEFAULT_ROOM).unwrap().contains(c1));

        let out = drain(&mut rx1);
        assert_eq!(out[0], format!("Welcome! You are #{}.\r\n", c1));
        assert_eq!(out[1], "Logging is disabled.\r\n");
        assert_eq!(out[2], "Joined room: global\r\n");
    }

    #[tokio::test]
    async fn test_connect_announced_to_others() {
        let mut server = test_server().await;
        let (_c1, mut rx1) = connect(&mut server);
        drain(&mut rx1);
        let (c2, _rx2) = connect(&mut server);

        let out = drain(&mut rx1);
        assert!(out
            .iter()
            .any(|m| m.ends_with(&format!("[{}]anon has connected!\r\n", c2))));
        assert!(out
            .iter()
            .any(|m| m.ends_with(&format!("[{}]anon has joined the room!\r\n", c2))));
    }

    #[tokio::test]
    async fn test_chat_excludes_sender() {
        let mut server = test_server().await;
        let (c1, mut rx1) = connect(&mut server);
        let (_c2, mut rx2) = connect(&mut server);
        drain(&mut rx1);
        drain(&mut rx2);

        send_line(&mut server, c1, "hello there\r\n");

        assert!(drain(&mut rx1).is_empty());
        let out = drain(&mut rx2);
        assert_eq!(out.len(), 1);
        assert!(out[0].ends_with(&format!("[{}]anon : hello there\r\n", c1)));
        assert!(out[0].starts_with('['));
    }

    #[tokio::test]
    async fn test_chat_stays_in_room() {
        let mut server = test_server().await;
        let (c1, mut rx1) = connect(&mut server);
        let (_c2, mut rx2) = connect(&mut server);
        send_line(&mut server, c1, "/join lounge\r\n");
        drain(&mut rx1);
        drain(&mut rx2);

        send_line(&mut server, c1, "anyone here?\r\n");

        assert!(drain(&mut rx2).is_empty());
    }

    #[tokio::test]
    async fn test_control_lines_discarded() {
        let mut server = test_server().await;
        let (c1, mut rx1) = connect(&mut server);
        let (_c2, mut rx2) = connect(&mut server);
        drain(&mut rx1);
        drain(&mut rx2);

        send_line(&mut server, c1, "\r\n");
        send_line(&mut server, c1, "\x1b[Ajunk\r\n");

        assert!(drain(&mut rx1).is_empty());
        assert!(drain(&mut rx2).is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_cleans_up() {
        let mut server = test_server().await;
        let (c1, mut rx1) = connect(&mut server);
        let (c2, _rx2) = connect(&mut server);
        send_line(&mut server, c1, "/join lounge\r\n");
        send_line(&mut server, c2, "/join lounge\r\n");
        drain(&mut rx1);

        server.handle_event(ConnectionEvent::Closed { session_id: c2 });

        assert!(!server.sessions.contains(c2));
        assert!(!server.rooms.get("lounge").unwrap().contains(c2));
        let out = drain(&mut rx1);
        assert!(out
            .iter()
            .any(|m| m.ends_with(&format!("[{}]anon has left the room!\r\n", c2))));
        assert!(out
            .iter()
            .any(|m| m.ends_with(&format!("[{}]anon has disconnected!\r\n", c2))));

        server.disconnect(c1);
        assert!(!server.rooms.contains("lounge"));
        assert!(server.rooms.contains(DEFAULT_ROOM));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut server = test_server().await;
        let (c1, _rx1) = connect(&mut server);

        server.disconnect(c1);
        server.disconnect(c1);
        send_line(&mut server, c1, "/who\r\n");

        assert!(server.sessions.is_empty());
        assert!(server.rooms.get(DEFAULT_ROOM).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_global_survives_emptying() {
        let mut server = test_server().await;
        let (c1, _rx1) = connect(&mut server);
        server.disconnect(c1);

        assert!(server.rooms.contains(DEFAULT_ROOM));
        let (c2, _rx2) = connect(&mut server);
        assert_eq!(room_of(&server, c2), DEFAULT_ROOM);
    }

    #[tokio::test]
    async fn test_shutdown_notifies_and_drops() {
        let mut server = test_server().await;
        let (_c1, mut rx1) = connect(&mut server);
        drain(&mut rx1);

        server.shutdown();

        assert!(server.sessions.is_empty());
        let out = drain(&mut rx1);
        assert!(out[0].ends_with("Server is shutting down.\r\n"));
        // Sender dropped with the session
        assert!(rx1.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stalled_reader_is_capped() {
        let config = ServerConfig {
            outbound_buffer: 16,
            ..ServerConfig::with_addr("127.0.0.1:0")
        };
        let mut server = test_server_with(config).await;
        let (c1, mut rx1) = connect(&mut server);
        let (_stalled, mut stalled_rx) = connect(&mut server);
        let (_c3, mut rx3) = connect(&mut server);
        drain(&mut rx1);
        drain(&mut stalled_rx);
        drain(&mut rx3);

        let mut delivered = 0;
        for i in 0..1000 {
            send_line(&mut server, c1, &format!("line {}\r\n", i));
            delivered += drain(&mut rx3).len();
        }

        assert_eq!(delivered, 1000);
        assert_eq!(drain(&mut stalled_rx).len(), 16);

        // The stalled session still gets new output once it catches up
        send_line(&mut server, c1, "caught up\r\n");
        let out = drain(&mut stalled_rx);
        assert_eq!(out.len(), 1);
        assert!(out[0].ends_with(&format!("[{}]anon : caught up\r\n", c1)));
    }

    #[tokio::test]
    async fn test_poll_once_services_session_once_per_iteration() {
        let mut server = test_server().await;
        let (c1, mut rx1) = connect(&mut server);
        let (_c2, mut rx2) = connect(&mut server);
        drain(&mut rx1);
        drain(&mut rx2);

        let tx = server.events_tx.clone();
        for text in ["one\r\n", "two\r\n"] {
            tx.send(ConnectionEvent::Line {
                session_id: c1,
                line: text.to_string(),
            })
            .await
            .unwrap();
        }

        server.poll_once().await;
        assert_eq!(drain(&mut rx2).len(), 1);
        assert!(server.deferred.is_some());

        server.poll_once().await;
        let out = drain(&mut rx2);
        assert_eq!(out.len(), 1);
        assert!(out[0].ends_with(&format!("[{}]anon : two\r\n", c1)));
        assert!(server.deferred.is_none());
    }
}
