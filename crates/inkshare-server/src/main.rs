//! InkShare WebSocket Relay Server
//!
//! A simple relay server that fans canvas messages out to the other clients
//! in the same room. Payloads are forwarded untouched.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "room": "room-id" }
//! { "type": "publish", "payload": { "kind": "strokeAdd", ... } }
//! { "type": "leave" }
//! ```

mod rooms;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use inkshare_core::{ClientFrame, ServerFrame};
use rooms::{RoomEvent, Rooms};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_ADDR: &str = "0.0.0.0:3030";
const ADDR_ENV: &str = "INKSHARE_ADDR";

/// Shared application state
struct AppState {
    rooms: Rooms,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    rooms: usize,
    peers: usize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkshare_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState { rooms: Rooms::new() });

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = bind_addr(std::env::var(ADDR_ENV).ok().as_deref());
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };
    info!("InkShare relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}

/// Resolve the listen address, falling back to the default on bad input.
fn bind_addr(configured: Option<&str>) -> SocketAddr {
    let fallback = SocketAddr::from(([0, 0, 0, 0], 3030));
    let Some(raw) = configured.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_ADDR.parse().unwrap_or(fallback);
    };
    match raw.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Ignoring invalid {}={:?}: {}", ADDR_ENV, raw, e);
            fallback
        }
    }
}

/// Index page
async fn index() -> &'static str {
    "InkShare Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        rooms: state.rooms.room_count(),
        peers: state.rooms.total_peers(),
    })
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and send one frame. Returns false once the socket is gone.
async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, frame: &ServerFrame) -> bool {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize frame: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

/// Leave `room` and tell the remaining peers.
fn leave(state: &AppState, room: &str, peer_id: &str) {
    if state.rooms.leave(room, peer_id) {
        state.rooms.broadcast(
            room,
            peer_id,
            ServerFrame::PeerLeft {
                peer_id: peer_id.to_string(),
            },
        );
        info!("Peer {} left room {}", peer_id, room);
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_room: Option<String> = None;
    let mut room_rx: Option<broadcast::Receiver<RoomEvent>> = None;

    loop {
        tokio::select! {
            // Handle incoming frames from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Join { room }) => {
                                if let Some(old_room) = current_room.take() {
                                    leave(&state, &old_room, &peer_id);
                                }

                                let (rx, peer_count) = state.rooms.join(&room, &peer_id);
                                room_rx = Some(rx);
                                current_room = Some(room.clone());

                                let joined = ServerFrame::Joined { room: room.clone(), peer_count };
                                if !send_frame(&mut sender, &joined).await {
                                    break;
                                }

                                // Notify others
                                state.rooms.broadcast(&room, &peer_id, ServerFrame::PeerJoined {
                                    peer_id: peer_id.clone(),
                                });
                                info!("Peer {} joined room {} ({} peers)", peer_id, room, peer_count);
                            }
                            Ok(ClientFrame::Leave) => {
                                if let Some(room) = current_room.take() {
                                    leave(&state, &room, &peer_id);
                                }
                                room_rx = None;
                            }
                            Ok(ClientFrame::Publish { payload }) => {
                                match current_room {
                                    Some(ref room) => {
                                        state.rooms.broadcast(room, &peer_id, ServerFrame::Message {
                                            from: peer_id.clone(),
                                            payload,
                                        });
                                    }
                                    None => {
                                        let err = ServerFrame::Error {
                                            message: "Publish before join".to_string(),
                                        };
                                        if !send_frame(&mut sender, &err).await {
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("Invalid frame from {}: {}", peer_id, e);
                                let err = ServerFrame::Error {
                                    message: format!("Invalid message: {}", e),
                                };
                                if !send_frame(&mut sender, &err).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary, ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Handle frames fanned out to the room
            event = async {
                match &mut room_rx {
                    Some(rx) => Some(rx.recv().await),
                    None => {
                        // No room joined, just wait forever
                        std::future::pending::<Option<Result<RoomEvent, RecvError>>>().await
                    }
                }
            } => {
                match event {
                    Some(Ok((from, frame))) => {
                        // Don't echo back to sender
                        if from != peer_id && !send_frame(&mut sender, &frame).await {
                            break;
                        }
                    }
                    Some(Err(RecvError::Lagged(skipped))) => {
                        warn!("Peer {} lagged, {} frames dropped", peer_id, skipped);
                    }
                    Some(Err(RecvError::Closed)) => {
                        debug!("Room channel closed for {}", peer_id);
                        room_rx = None;
                    }
                    None => {}
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(room) = current_room {
        leave(&state, &room, &peer_id);
    }
    info!("Connection closed: {}", peer_id);
}
