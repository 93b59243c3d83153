//! Room service: membership and fan-out.
//!
//! DESIGN
//! ======
//! A room is created by its first join and evicted when its last client
//! parts. Frames from one sender are queued in send order, so every
//! recipient sees one sender's traffic in FIFO order.
//!
//! Each client has a bounded queue. The room holds the only `Sender` of a
//! member's queue; a member whose queue is full (or closed) is evicted from
//! the room, which drops that `Sender` and ends the member's socket task.
//! A client therefore never misses a frame while it stays connected.

use frames::Frame;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{AppState, RoomState};

/// Longest accepted room name, in characters.
pub const MAX_ROOM_NAME: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room name required")]
    MissingName,
    #[error("invalid room name: {0:?}")]
    InvalidName(String),
    #[error("must join a room first")]
    NotJoined,
    #[error("connection was evicted for falling behind")]
    Evicted,
}

impl RoomError {
    /// Stable code carried in error replies.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingName => "E_ROOM_REQUIRED",
            Self::InvalidName(_) => "E_ROOM_INVALID",
            Self::NotJoined => "E_NOT_JOINED",
            Self::Evicted => "E_EVICTED",
        }
    }
}

/// Outcome of one [`broadcast`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fanout {
    pub delivered: usize,
    /// Members removed because their queue was full or closed.
    pub evicted: usize,
}

/// Check a client-supplied room name.
///
/// # Errors
///
/// Returns [`RoomError::InvalidName`] for blank names, names longer than
/// [`MAX_ROOM_NAME`], or names containing control characters.
pub fn validate_name(name: &str) -> Result<&str, RoomError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_ROOM_NAME || trimmed.chars().any(char::is_control) {
        return Err(RoomError::InvalidName(name.to_owned()));
    }
    Ok(trimmed)
}

/// Add a client to `room`, creating the room if needed. Returns the number
/// of clients now in the room.
pub async fn join_room(state: &AppState, room: &str, client_id: Uuid, tx: mpsc::Sender<Frame>) -> usize {
    let mut rooms = state.rooms.write().await;
    let room_state = rooms.entry(room.to_owned()).or_insert_with(RoomState::new);
    room_state.clients.insert(client_id, tx);
    let members = room_state.clients.len();
    info!(%room, %client_id, clients = members, "client joined room");
    members
}

/// Remove a client from `room`, evicting the room once it is empty.
/// Returns the client's queue sender so it can join another room; `None`
/// if the client was not a member.
pub async fn part_room(state: &AppState, room: &str, client_id: Uuid) -> Option<mpsc::Sender<Frame>> {
    let mut rooms = state.rooms.write().await;
    let room_state = rooms.get_mut(room)?;

    let tx = room_state.clients.remove(&client_id);
    info!(%room, %client_id, remaining = room_state.clients.len(), "client left room");

    if room_state.clients.is_empty() {
        rooms.remove(room);
        info!(%room, "evicted empty room");
    }
    tx
}

/// Queue `frame` for every client in `room` except `exclude`. Members that
/// cannot take the frame are evicted.
pub async fn broadcast(state: &AppState, room: &str, frame: &Frame, exclude: Option<Uuid>) -> Fanout {
    let mut fanout = Fanout::default();
    let mut lagging = Vec::new();
    {
        let rooms = state.rooms.read().await;
        let Some(room_state) = rooms.get(room) else {
            return fanout;
        };

        for (client_id, tx) in &room_state.clients {
            if exclude == Some(*client_id) {
                continue;
            }
            match tx.try_send(frame.clone()) {
                Ok(()) => fanout.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%room, %client_id, syscall = %frame.syscall, "client queue full; evicting client");
                    lagging.push(*client_id);
                }
                Err(TrySendError::Closed(_)) => lagging.push(*client_id),
            }
        }
    }

    for client_id in lagging {
        if part_room(state, room, client_id).await.is_some() {
            fanout.evicted += 1;
        }
    }
    fanout
}

/// Number of clients in `room`; zero when the room does not exist.
pub async fn member_count(state: &AppState, room: &str) -> usize {
    state.rooms.read().await.get(room).map_or(0, |r| r.clients.len())
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
