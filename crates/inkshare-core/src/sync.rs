//! WebSocket relay client.
//!
//! Frames exchanged with the relay server, and a native [`MessageChannel`]
//! that publishes canvas messages into a relay room.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Join a room
    Join { room: String },
    /// Leave current room
    Leave,
    /// Fan a canvas message out to the other room members
    Publish { payload: Value },
}

/// Frames received from the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Confirm room join
    Joined { room: String, peer_count: usize },
    /// Peer joined the room
    PeerJoined { peer_id: String },
    /// Peer left the room
    PeerLeft { peer_id: String },
    /// Canvas message published by another peer
    Message { from: String, payload: Value },
    /// Error message
    Error { message: String },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Connected and confirmed as a room member.
    Joined,
    Error,
}

/// Events from the relay connection
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected to server
    Connected,
    /// Disconnected from server
    Disconnected,
    /// Joined a room
    JoinedRoom { room: String, peer_count: usize },
    /// A peer joined the room
    PeerJoined { peer_id: String },
    /// A peer left the room
    PeerLeft { peer_id: String },
    /// A canvas message from a peer
    Received { from: String, payload: Value },
    /// Error occurred
    Error { message: String },
}

impl From<ServerFrame> for SyncEvent {
    fn from(frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::Joined { room, peer_count } => SyncEvent::JoinedRoom { room, peer_count },
            ServerFrame::PeerJoined { peer_id } => SyncEvent::PeerJoined { peer_id },
            ServerFrame::PeerLeft { peer_id } => SyncEvent::PeerLeft { peer_id },
            ServerFrame::Message { from, payload } => SyncEvent::Received { from, payload },
            ServerFrame::Error { message } => SyncEvent::Error { message },
        }
    }
}

impl ClientFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// Native WebSocket Channel
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use crate::channel::MessageChannel;
    use crate::error::ChannelError;
    use std::collections::VecDeque;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::thread;
    use std::time::{Duration, Instant};
    use tungstenite::{connect, Message};
    use url::Url;

    /// Wait before retrying a lost relay connection.
    pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

    /// Commands sent to the WebSocket thread.
    pub(super) enum WsCommand {
        Send(String),
        Close,
    }

    /// Both ends of one socket thread, as seen from the channel.
    pub(super) type Link = (Sender<WsCommand>, Receiver<SyncEvent>);

    /// Opens a fresh link to the relay. Called once per (re)connect.
    pub(super) type Connector = Box<dyn FnMut() -> Result<Link, ChannelError> + Send>;

    /// Relay-backed channel for native platforms.
    ///
    /// Uses a background thread for the socket. Messages sent before the
    /// relay confirms the room join are queued and flushed once it does.
    /// A lost or failed connection is retried after the reconnect delay,
    /// rejoining the same room.
    pub struct WebSocketChannel {
        room: String,
        state: ConnectionState,
        peer_count: usize,
        /// Outbound canvas messages waiting for the join confirmation.
        pending: VecDeque<Value>,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<SyncEvent>>,
        connector: Connector,
        reconnect_delay: Option<Duration>,
        retry_at: Option<Instant>,
        attempts: u32,
        /// Set on every confirmed join, cleared by `take_joined`.
        joined: bool,
        closed: bool,
    }

    impl WebSocketChannel {
        /// Connect to the relay at `url` and join `room`.
        pub fn connect(url: &str, room: &str) -> Result<Self, ChannelError> {
            let parsed_url = Url::parse(url).map_err(|e| ChannelError::InvalidUrl(e.to_string()))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(ChannelError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed_url.scheme()
                )));
            }

            let url = url.to_string();
            Self::from_connector(room, Box::new(move || spawn_socket(&url)))
        }

        /// Open the first link through `connector` and request the room join.
        pub(super) fn from_connector(room: &str, mut connector: Connector) -> Result<Self, ChannelError> {
            let (cmd_tx, event_rx) = connector()?;
            send_join(&cmd_tx, room)?;
            Ok(Self {
                room: room.to_string(),
                state: ConnectionState::Connecting,
                peer_count: 0,
                pending: VecDeque::new(),
                cmd_tx: Some(cmd_tx),
                event_rx: Some(event_rx),
                connector,
                reconnect_delay: Some(RECONNECT_DELAY),
                retry_at: None,
                attempts: 0,
                joined: false,
                closed: false,
            })
        }

        /// Set the wait before retrying a lost connection. `None` disables
        /// automatic reconnects.
        pub fn with_reconnect_delay(mut self, delay: Option<Duration>) -> Self {
            self.reconnect_delay = delay;
            self
        }

        pub fn room(&self) -> &str {
            &self.room
        }

        /// Get current connection state.
        pub fn state(&self) -> ConnectionState {
            self.state
        }

        /// Room size reported by the relay, including us.
        pub fn peer_count(&self) -> usize {
            self.peer_count
        }

        /// Messages queued until the join is confirmed.
        pub fn pending(&self) -> usize {
            self.pending.len()
        }

        /// Reconnects attempted since the last confirmed join.
        pub fn attempts(&self) -> u32 {
            self.attempts
        }

        /// True while a reconnect is scheduled.
        pub fn is_retrying(&self) -> bool {
            self.retry_at.is_some()
        }

        /// Drop the current socket, open a new one and rejoin the room.
        /// Queued messages are kept and flushed after the rejoin.
        pub fn reconnect(&mut self) -> Result<(), ChannelError> {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self.retry_at = None;
            self.closed = false;
            self.peer_count = 0;
            self.state = ConnectionState::Disconnected;
            self.attempts += 1;
            log::info!("Reconnecting to room {} (attempt {})", self.room, self.attempts);

            let (cmd_tx, event_rx) = (self.connector)()?;
            send_join(&cmd_tx, &self.room)?;
            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self.state = ConnectionState::Connecting;
            Ok(())
        }

        fn publish(&self, payload: Value) -> Result<(), ChannelError> {
            let tx = self.cmd_tx.as_ref().ok_or(ChannelError::Closed)?;
            let frame = ClientFrame::Publish { payload }.to_json()?;
            tx.send(WsCommand::Send(frame)).map_err(|_| ChannelError::Closed)
        }

        fn flush_pending(&mut self) {
            while let Some(payload) = self.pending.pop_front() {
                if let Err(e) = self.publish(payload) {
                    log::error!("Failed to flush queued message: {}", e);
                    break;
                }
            }
        }

        fn schedule_retry(&mut self) {
            if self.closed || self.retry_at.is_some() {
                return;
            }
            let Some(delay) = self.reconnect_delay else {
                return;
            };
            log::info!("Relay connection for {} lost, retrying in {:?}", self.room, delay);
            self.retry_at = Some(Instant::now() + delay);
        }

        fn retry_if_due(&mut self) {
            let Some(at) = self.retry_at else {
                return;
            };
            if Instant::now() < at {
                return;
            }
            if let Err(e) = self.reconnect() {
                log::error!("Reconnect to {} failed: {}", self.room, e);
            }
        }
    }

    impl MessageChannel for WebSocketChannel {
        fn send(&mut self, message: Value) -> Result<(), ChannelError> {
            match self.state {
                ConnectionState::Joined => self.publish(message),
                ConnectionState::Connecting | ConnectionState::Connected => {
                    self.pending.push_back(message);
                    Ok(())
                }
                ConnectionState::Disconnected | ConnectionState::Error if self.retry_at.is_some() => {
                    self.pending.push_back(message);
                    Ok(())
                }
                ConnectionState::Disconnected | ConnectionState::Error => Err(ChannelError::Closed),
            }
        }

        fn poll(&mut self) -> Vec<Value> {
            self.retry_if_due();

            let mut events = Vec::new();
            let mut link_lost = false;
            if let Some(rx) = self.event_rx.as_ref() {
                loop {
                    match rx.try_recv() {
                        Ok(event) => events.push(event),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            link_lost = true;
                            break;
                        }
                    }
                }
            }

            let mut inbound = Vec::new();
            for event in events {
                match event {
                    SyncEvent::Connected => {
                        if self.state == ConnectionState::Connecting {
                            self.state = ConnectionState::Connected;
                        }
                    }
                    SyncEvent::JoinedRoom { room, peer_count } => {
                        log::info!("Joined room {} ({} peers)", room, peer_count);
                        self.state = ConnectionState::Joined;
                        self.peer_count = peer_count;
                        self.attempts = 0;
                        self.joined = true;
                        self.flush_pending();
                    }
                    SyncEvent::PeerJoined { peer_id } => {
                        log::debug!("Peer {} joined {}", peer_id, self.room);
                        self.peer_count += 1;
                    }
                    SyncEvent::PeerLeft { peer_id } => {
                        log::debug!("Peer {} left {}", peer_id, self.room);
                        self.peer_count = self.peer_count.saturating_sub(1);
                    }
                    SyncEvent::Received { payload, .. } => inbound.push(payload),
                    SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    SyncEvent::Error { message } => {
                        log::error!("Relay error: {}", message);
                        self.state = ConnectionState::Error;
                    }
                }
            }

            if link_lost && self.state != ConnectionState::Error {
                self.state = ConnectionState::Disconnected;
            }
            if matches!(self.state, ConnectionState::Disconnected | ConnectionState::Error) {
                self.schedule_retry();
            }
            inbound
        }

        fn is_available(&self) -> bool {
            self.cmd_tx.is_some()
        }

        fn take_joined(&mut self) -> bool {
            std::mem::take(&mut self.joined)
        }

        fn close(&mut self) {
            self.closed = true;
            self.retry_at = None;
            if let Some(tx) = self.cmd_tx.take() {
                if let Ok(leave) = ClientFrame::Leave.to_json() {
                    let _ = tx.send(WsCommand::Send(leave));
                }
                let _ = tx.send(WsCommand::Close);
            }
            if !self.pending.is_empty() {
                log::warn!("Dropping {} unsent messages for {}", self.pending.len(), self.room);
                self.pending.clear();
            }
            self.event_rx = None;
            self.state = ConnectionState::Disconnected;
        }
    }

    impl Drop for WebSocketChannel {
        fn drop(&mut self) {
            self.close();
        }
    }

    impl std::fmt::Debug for WebSocketChannel {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("WebSocketChannel")
                .field("room", &self.room)
                .field("state", &self.state)
                .field("peer_count", &self.peer_count)
                .field("pending", &self.pending.len())
                .field("attempts", &self.attempts)
                .field("retrying", &self.retry_at.is_some())
                .finish()
        }
    }

    fn send_join(cmd_tx: &Sender<WsCommand>, room: &str) -> Result<(), ChannelError> {
        let join = ClientFrame::Join { room: room.to_string() }.to_json()?;
        cmd_tx
            .send(WsCommand::Send(join))
            .map_err(|e| ChannelError::Send(e.to_string()))
    }

    /// Start a socket thread for `url`.
    fn spawn_socket(url: &str) -> Result<Link, ChannelError> {
        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<SyncEvent>();

        let url = url.to_string();
        thread::Builder::new()
            .name("inkshare-ws".to_string())
            .spawn(move || run_socket(&url, cmd_rx, event_tx))
            .map_err(|e| ChannelError::Send(format!("failed to spawn socket thread: {}", e)))?;
        Ok((cmd_tx, event_rx))
    }

    /// Socket thread: connect, then shuttle commands out and frames in.
    fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, event_tx: Sender<SyncEvent>) {
        log::info!("WebSocket thread: connecting to {}", url);

        let (mut socket, response) = match connect(url) {
            Ok(connected) => connected,
            Err(e) => {
                log::error!("WebSocket connection failed: {}", e);
                let _ = event_tx.send(SyncEvent::Error {
                    message: format!("Connection failed: {}", e),
                });
                return;
            }
        };
        log::info!("WebSocket connected, status: {}", response.status());
        let _ = event_tx.send(SyncEvent::Connected);

        // Short read timeout so the loop can interleave sends and reads.
        match socket.get_mut() {
            tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
            }
            #[allow(unreachable_patterns)]
            _ => log::debug!("TLS or other stream - using default timeout handling"),
        }

        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    log::debug!("WebSocket sending: {}", &msg[..msg.len().min(100)]);
                    if let Err(e) = socket.send(Message::Text(msg)) {
                        log::error!("WebSocket send error: {}", e);
                        break;
                    }
                }
                Ok(WsCommand::Close) => {
                    log::info!("WebSocket close requested");
                    let _ = socket.close(None);
                    break;
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("WebSocket command channel disconnected");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            match socket.read() {
                Ok(Message::Text(txt)) => match serde_json::from_str::<ServerFrame>(&txt) {
                    Ok(frame) => {
                        let _ = event_tx.send(frame.into());
                    }
                    Err(e) => log::warn!("Failed to parse relay frame: {}", e),
                },
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => {
                    log::info!("WebSocket received close frame");
                    break;
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(e))
                    if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    break;
                }
            }
        }

        log::info!("WebSocket thread exiting");
        let _ = event_tx.send(SyncEvent::Disconnected);
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::{WebSocketChannel, RECONNECT_DELAY};
