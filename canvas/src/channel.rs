//! Synchronization channel: the participant side of the broadcast.
//!
//! DESIGN
//! ======
//! The channel is sans-io. It turns [`Message`]s into frames for a
//! [`Transport`] and turns received frames back into messages for its
//! subscribers; the host owns the socket and feeds frames in with
//! [`Channel::receive`].
//!
//! Delivery contract:
//! - `publish` is fire-and-forget. While disconnected it drops the message;
//!   nothing is queued or replayed after a reconnect.
//! - A transport failure marks the channel disconnected until the relay
//!   greets it again with `session:connected`.
//! - Frames whose `from` is our own client id are never handed to
//!   subscribers. The originator already rendered them locally.
//! - Undecodable frames are dropped and counted, never surfaced as errors.

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;

use std::fmt;

use frames::{FRAME_CLIENT_ID, Frame, SYSCALL_CONNECTED, Status};
use tracing::{debug, warn};

use crate::op::Message;

/// Error returned by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
}

/// Outbound half of a full-duplex connection to the relay.
pub trait Transport {
    /// Hand one frame to the connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the connection can no longer send.
    fn send(&mut self, frame: Frame) -> Result<(), TransportError>;
}

/// Outcome of [`Channel::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Dropped,
}

/// Traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Messages handed to the transport.
    pub sent: u64,
    /// Messages dropped on publish (disconnected or transport failure).
    pub dropped: u64,
    /// Received messages handed to subscribers.
    pub delivered: u64,
    /// Received frames skipped on purpose (own echo, replies, errors).
    pub ignored: u64,
    /// Received frames that did not decode.
    pub rejected: u64,
}

type Handler = Box<dyn FnMut(&Message)>;

/// One participant's end of the broadcast.
pub struct Channel<T> {
    transport: T,
    room: Option<String>,
    client_id: Option<String>,
    handlers: Vec<Handler>,
    stats: ChannelStats,
}

impl<T: fmt::Debug> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("transport", &self.transport)
            .field("room", &self.room)
            .field("client_id", &self.client_id)
            .field("handlers", &self.handlers.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<T: Transport> Channel<T> {
    /// A disconnected channel over `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport, room: None, client_id: None, handlers: Vec::new(), stats: ChannelStats::default() }
    }

    /// Stamp every published frame with `room`.
    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    // --- Lifecycle ---

    /// The relay accepted us under `client_id`.
    pub fn connected(&mut self, client_id: impl Into<String>) {
        let client_id = client_id.into();
        debug!(%client_id, "channel connected");
        self.client_id = Some(client_id);
    }

    pub fn disconnected(&mut self) {
        if self.client_id.take().is_some() {
            debug!("channel disconnected");
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client_id.is_some()
    }

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    // --- Traffic ---

    /// Send `msg` to every other participant.
    pub fn publish(&mut self, msg: &Message) -> Delivery {
        if !self.is_connected() {
            debug!(syscall = msg.syscall(), "publish while disconnected; dropped");
            self.stats.dropped += 1;
            return Delivery::Dropped;
        }

        let frame = match msg.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode message; dropped");
                self.stats.dropped += 1;
                return Delivery::Dropped;
            }
        };
        let frame = match &self.room {
            Some(room) => frame.with_room(room.clone()),
            None => frame,
        };

        if let Err(e) = self.transport.send(frame) {
            warn!(error = %e, "transport send failed; marking disconnected");
            self.disconnected();
            self.stats.dropped += 1;
            return Delivery::Dropped;
        }
        self.stats.sent += 1;
        Delivery::Sent
    }

    /// Register a handler called once per message from another participant.
    pub fn subscribe(&mut self, handler: impl FnMut(&Message) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Feed one frame from the transport. Returns the message handed to
    /// subscribers, if any.
    pub fn receive(&mut self, frame: &Frame) -> Option<Message> {
        if frame.syscall == SYSCALL_CONNECTED {
            match frame.data_str(FRAME_CLIENT_ID) {
                Some(id) => self.connected(id),
                None => warn!("session:connected without client_id"),
            }
            return None;
        }

        if frame.status != Status::Request {
            if frame.status == Status::Error {
                warn!(syscall = %frame.syscall, message = ?frame.data_str(frames::FRAME_MESSAGE), "relay error");
            }
            self.stats.ignored += 1;
            return None;
        }

        if frame.from.is_some() && frame.from.as_deref() == self.client_id.as_deref() {
            self.stats.ignored += 1;
            return None;
        }

        let msg = match Message::from_frame(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, syscall = %frame.syscall, "rejected inbound frame");
                self.stats.rejected += 1;
                return None;
            }
        };

        for handler in &mut self.handlers {
            handler(&msg);
        }
        self.stats.delivered += 1;
        Some(msg)
    }

    #[must_use]
    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
