//! In-process star relay.
//!
//! [`Hub`] behaves like the `server` relay for a single room without any
//! sockets: every frame a participant sends is stamped with its connection
//! id and queued for every other participant, in send order. Participants
//! pull their queue with [`Hub::drain`]. Tests and offline replay use it to
//! run several [`Channel`](crate::channel::Channel)s against each other.

#[cfg(test)]
#[path = "hub_test.rs"]
mod hub_test;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use frames::{FRAME_CLIENT_ID, Frame, SYSCALL_CONNECTED};
use tracing::debug;
use uuid::Uuid;

use crate::channel::{Transport, TransportError};

#[derive(Debug, Default)]
struct Peer {
    online: bool,
    inbox: VecDeque<Frame>,
}

#[derive(Debug, Default)]
struct HubState {
    /// Join order, so fan-out is deterministic.
    order: Vec<Uuid>,
    peers: HashMap<Uuid, Peer>,
}

/// Shared handle to one in-process room.
#[derive(Debug, Clone, Default)]
pub struct Hub {
    state: Arc<Mutex<HubState>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant. Its inbox starts with the `session:connected`
    /// greeting, like a fresh relay connection.
    #[must_use]
    pub fn join(&self) -> HubTransport {
        let id = Uuid::new_v4();
        let mut state = self.lock();
        state.order.push(id);
        state.peers.insert(id, Peer { online: true, inbox: VecDeque::from([greeting(id)]) });
        debug!(client_id = %id, "hub join");
        HubTransport { hub: self.clone(), id }
    }

    /// Take every frame queued for `id`, oldest first.
    #[must_use]
    pub fn drain(&self, id: Uuid) -> Vec<Frame> {
        let mut state = self.lock();
        state.peers.get_mut(&id).map(|p| p.inbox.drain(..).collect()).unwrap_or_default()
    }

    /// Number of frames waiting for `id`.
    #[must_use]
    pub fn pending(&self, id: Uuid) -> usize {
        self.lock().peers.get(&id).map_or(0, |p| p.inbox.len())
    }

    /// Take `id` off the network or bring it back. An offline participant
    /// cannot send and misses everything broadcast meanwhile. Coming back
    /// online queues a fresh greeting.
    pub fn set_online(&self, id: Uuid, online: bool) {
        let mut state = self.lock();
        let Some(peer) = state.peers.get_mut(&id) else {
            return;
        };
        if online && !peer.online {
            peer.inbox.push_back(greeting(id));
        }
        peer.online = online;
    }

    fn broadcast(&self, sender: Uuid, frame: Frame) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.peers.get(&sender).is_some_and(|p| p.online) {
            return Err(TransportError::Closed);
        }

        let frame = frame.with_from(sender.to_string());
        let HubState { order, peers } = &mut *state;
        for id in order.iter().filter(|id| **id != sender) {
            if let Some(peer) = peers.get_mut(id) {
                if peer.online {
                    peer.inbox.push_back(frame.clone());
                }
            }
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn greeting(id: Uuid) -> Frame {
    Frame::request(SYSCALL_CONNECTED, serde_json::json!({})).with_data(FRAME_CLIENT_ID, id.to_string())
}

/// One participant's connection to a [`Hub`].
#[derive(Debug, Clone)]
pub struct HubTransport {
    hub: Hub,
    id: Uuid,
}

impl HubTransport {
    #[must_use]
    pub fn client_id(&self) -> Uuid {
        self.id
    }

    /// Frames waiting for this participant, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<Frame> {
        self.hub.drain(self.id)
    }
}

impl Transport for HubTransport {
    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.hub.broadcast(self.id, frame)
    }
}
