//! WebSocket handler for the room relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → decode + dispatch by syscall
//! - Frames from room peers → forward to client
//!
//! The relay never inspects drawing payloads. `drawing` and `clear` frames
//! are stamped with the sender's client id and room, then queued for every
//! other client in the room. The sender gets no echo and no reply; it has
//! already rendered its own operation. Only failures are answered.
//!
//! A client may speak JSON text or protobuf binary; replies and forwarded
//! frames use the encoding of the client's most recent inbound message.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Optional `?room=` query joins immediately; `room:join` joins later
//! 3. Client frames → dispatch → replies to sender, broadcast to peers
//! 4. Close, or queue closed by room eviction → part room → cleanup

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frames::{
    FRAME_CLIENT_ID, FRAME_MESSAGE, Frame, SYSCALL_CLEAR, SYSCALL_CONNECTED, SYSCALL_DRAWING, SYSCALL_JOIN,
    SYSCALL_PART, Status,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::room::{self, RoomError};
use crate::state::AppState;

/// Syscall of the error frame sent when an inbound message cannot be decoded.
pub const SYSCALL_GATEWAY_ERROR: &str = "gateway:error";

/// Data key for the machine-readable error code.
pub const FRAME_CODE: &str = "code";

// =============================================================================
// CONNECTION
// =============================================================================

/// Wire encoding of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Json,
    Binary,
}

/// One inbound websocket payload.
#[derive(Debug, Clone, Copy)]
pub enum Inbound<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

/// Per-connection state owned by the socket task.
#[derive(Debug)]
pub struct Connection {
    pub client_id: Uuid,
    pub room: Option<String>,
    pub encoding: Encoding,
    /// Sender of this client's queue while it is outside any room. Joining
    /// hands it to the room; parting hands it back. A room that evicts the
    /// client drops it, which closes the queue.
    pub tx: Option<mpsc::Sender<Frame>>,
}

impl Connection {
    #[must_use]
    pub fn new(client_id: Uuid, tx: mpsc::Sender<Frame>) -> Self {
        Self { client_id, room: None, encoding: Encoding::default(), tx: Some(tx) }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let room = match params.get("room").map(|raw| room::validate_name(raw)) {
        None => None,
        Some(Ok(name)) => Some(name.to_owned()),
        Some(Err(e)) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let max = state.config.max_message_bytes;
    ws.max_message_size(max).on_upgrade(move |socket| run_ws(socket, state, room))
}

async fn run_ws(mut socket: WebSocket, state: AppState, room: Option<String>) {
    let client_id = Uuid::new_v4();

    // Per-connection queue for frames from room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_queue);
    let mut conn = Connection::new(client_id, client_tx);

    // Join before the greeting so a greeted client is already in its room.
    if let Some(name) = room {
        if let Err(e) = enter_room(&state, &mut conn, name).await {
            warn!(%client_id, error = %e, "ws: initial join failed");
        }
    }

    let welcome = Frame::request(SYSCALL_CONNECTED, json!({})).with_data(FRAME_CLIENT_ID, client_id.to_string());
    let greeted = send_frame(&mut socket, conn.encoding, &welcome).await.is_ok();
    if greeted {
        info!(%client_id, room = ?conn.room, "ws: client connected");
    }

    'conn: while greeted {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let replies = match &msg {
                    Message::Text(text) => process_inbound(&state, &mut conn, Inbound::Text(text.as_str())).await,
                    Message::Binary(bytes) => process_inbound(&state, &mut conn, Inbound::Binary(bytes)).await,
                    Message::Close(_) => break,
                    _ => Vec::new(),
                };
                for frame in replies {
                    if send_frame(&mut socket, conn.encoding, &frame).await.is_err() {
                        break 'conn;
                    }
                }
            }
            frame = client_rx.recv() => {
                let Some(frame) = frame else {
                    warn!(%client_id, room = ?conn.room, "ws: evicted from room; closing");
                    conn.room = None;
                    break;
                };
                if send_frame(&mut socket, conn.encoding, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(name) = conn.room.take() {
        room::part_room(&state, &name, client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode and handle one inbound payload. Returns the frames owed to the
/// sender; broadcast to peers happens here as a side effect.
pub async fn process_inbound(state: &AppState, conn: &mut Connection, inbound: Inbound<'_>) -> Vec<Frame> {
    let client_id = conn.client_id;
    let decoded = match inbound {
        Inbound::Text(text) => {
            conn.encoding = Encoding::Json;
            serde_json::from_str::<Frame>(text).map_err(|e| format!("invalid json: {e}"))
        }
        Inbound::Binary(bytes) => {
            conn.encoding = Encoding::Binary;
            frames::decode_frame(bytes).map_err(|e| e.to_string())
        }
    };
    let mut req = match decoded {
        Ok(frame) => frame,
        Err(message) => {
            warn!(%client_id, error = %message, "ws: invalid inbound frame");
            return vec![gateway_error(message)];
        }
    };

    // Clients never choose their own sender id.
    req.from = Some(client_id.to_string());

    match req.syscall.as_str() {
        SYSCALL_DRAWING | SYSCALL_CLEAR => relay(state, conn, req).await,
        SYSCALL_JOIN => {
            let raw = req.room_id.clone().or_else(|| req.data_str("room").map(str::to_owned));
            let Some(raw) = raw else {
                return vec![room_error(&req, &RoomError::MissingName)];
            };
            match room::validate_name(&raw) {
                Ok(name) => match enter_room(state, conn, name.to_owned()).await {
                    Ok(clients) => vec![req.done_with(json!({ "room": name, "clients": clients }))],
                    Err(e) => vec![room_error(&req, &e)],
                },
                Err(e) => vec![room_error(&req, &e)],
            }
        }
        SYSCALL_PART => match conn.room.take() {
            Some(name) => match room::part_room(state, &name, client_id).await {
                Some(tx) => {
                    conn.tx = Some(tx);
                    vec![req.done()]
                }
                None => vec![room_error(&req, &RoomError::Evicted)],
            },
            None => vec![room_error(&req, &RoomError::NotJoined)],
        },
        other => {
            debug!(%client_id, syscall = %other, "ws: unknown syscall");
            vec![req.error(format!("unknown syscall: {other}")).with_data(FRAME_CODE, "E_UNKNOWN_SYSCALL")]
        }
    }
}

async fn relay(state: &AppState, conn: &Connection, req: Frame) -> Vec<Frame> {
    let Some(name) = conn.room.as_deref() else {
        return vec![room_error(&req, &RoomError::NotJoined)];
    };
    let frame = req.with_room(name);
    let fanout = room::broadcast(state, name, &frame, Some(conn.client_id)).await;
    debug!(
        client_id = %conn.client_id,
        room = %name,
        syscall = %frame.syscall,
        delivered = fanout.delivered,
        evicted = fanout.evicted,
        "ws: relayed frame"
    );
    Vec::new()
}

/// Join `name`, leaving the current room first. Returns the room's size.
async fn enter_room(state: &AppState, conn: &mut Connection, name: String) -> Result<usize, RoomError> {
    if let Some(old) = conn.room.take() {
        conn.tx = room::part_room(state, &old, conn.client_id).await;
    }
    let tx = conn.tx.take().ok_or(RoomError::Evicted)?;
    let clients = room::join_room(state, &name, conn.client_id, tx).await;
    conn.room = Some(name);
    Ok(clients)
}

// =============================================================================
// HELPERS
// =============================================================================

fn room_error(req: &Frame, e: &RoomError) -> Frame {
    req.error(e.to_string()).with_data(FRAME_CODE, e.error_code())
}

fn gateway_error(message: String) -> Frame {
    let mut frame = Frame::request(SYSCALL_GATEWAY_ERROR, json!({}))
        .with_data(FRAME_MESSAGE, message)
        .with_data(FRAME_CODE, "E_BAD_FRAME");
    frame.status = Status::Error;
    frame
}

/// Encode `frame` for a connection using `encoding`.
///
/// # Errors
///
/// Returns the serializer error if the frame cannot be written as JSON.
pub fn encode_outbound(encoding: Encoding, frame: &Frame) -> Result<Message, serde_json::Error> {
    Ok(match encoding {
        Encoding::Json => Message::Text(serde_json::to_string(frame)?.into()),
        Encoding::Binary => Message::Binary(frames::encode_frame(frame).into()),
    })
}

async fn send_frame(socket: &mut WebSocket, encoding: Encoding, frame: &Frame) -> Result<(), ()> {
    let msg = match encode_outbound(encoding, frame) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data_str(FRAME_CODE).unwrap_or("-");
        let message = frame.data_str(FRAME_MESSAGE).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(msg).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
