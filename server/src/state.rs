//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the relay configuration and a map of live rooms. A room exists
//! only while at least one client is in it; the relay keeps no drawing
//! history.

use std::collections::HashMap;
use std::sync::Arc;

use frames::Frame;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::RelayConfig;

// =============================================================================
// ROOM STATE
// =============================================================================

/// Per-room live state.
#[derive(Debug, Default)]
pub struct RoomState {
    /// Connected clients: `client_id` -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; all inner fields
/// are Arc-wrapped or Clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub rooms: Arc<RwLock<HashMap<String, RoomState>>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self { config: Arc::new(config), rooms: Arc::new(RwLock::new(HashMap::new())) }
    }
}
