//! Per-participant drawing engine.
//!
//! ARCHITECTURE
//! ============
//! `EngineCore` wires the encoder, renderer, and surfaces together for one
//! participant:
//!
//! ```text
//! pointer → Encoder → Renderer (committed raster) → Action::Publish → channel
//!                                                  ↑
//!                        channel → apply_remote ───┘
//! ```
//!
//! Committed operations are rendered locally before they are handed to the
//! host for publication, so the originator never waits on the network and
//! never needs its own echo. Drag previews and laser pings live on an overlay
//! that [`EngineCore::compose`] draws over the committed pixels; they never
//! touch the committed raster.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use tracing::debug;

use crate::consts::LASER_TTL_MS;
use crate::encoder::{Emission, Encoder};
use crate::input::{Point, Session, TextRequest, TextRequestId, Tool};
use crate::op::{DrawingOperation, LaserPing, Message};
use crate::render::Renderer;
use crate::surface::{Raster, RasterError};

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Broadcast this message to the other participants.
    Publish(Message),
    /// Collect a string from the user and answer with
    /// [`EngineCore::submit_text`].
    RequestText(TextRequest),
    /// The composed picture changed.
    RenderNeeded,
}

/// A laser ping on the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LiveLaser {
    ping: LaserPing,
    expires_at: i64,
}

/// Core engine state: everything except the host event wiring.
#[derive(Debug)]
pub struct EngineCore {
    pub session: Session,
    encoder: Encoder,
    renderer: Renderer,
    committed: Raster,
    preview: Option<DrawingOperation>,
    lasers: Vec<LiveLaser>,
    now_ms: i64,
}

impl EngineCore {
    /// Create an engine with a blank `width`x`height` surface. The laser
    /// clock starts at wall-clock time; [`EngineCore::tick`] advances it.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidSize`] for a zero dimension.
    pub fn new(width: u32, height: u32) -> Result<Self, RasterError> {
        Ok(Self {
            session: Session::default(),
            encoder: Encoder::new(),
            renderer: Renderer::new(),
            committed: Raster::new(width, height)?,
            preview: None,
            lasers: Vec::new(),
            now_ms: frames::now_ms(),
        })
    }

    // --- Session ---

    pub fn set_tool(&mut self, tool: Tool) {
        self.session.tool = tool;
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.session.style.color = color.into();
    }

    /// Returns `false` and keeps the previous width for an invalid value.
    pub fn set_line_width(&mut self, width: f64) -> bool {
        self.session.style.set_line_width(width)
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, pt: Point) -> Vec<Action> {
        let emission = self.encoder.pointer_down(&self.session, pt);
        self.handle(emission)
    }

    pub fn on_pointer_move(&mut self, pt: Point) -> Vec<Action> {
        let emission = self.encoder.pointer_move(&self.session, pt);
        self.handle(emission)
    }

    pub fn on_pointer_up(&mut self, pt: Point) -> Vec<Action> {
        let had_preview = self.preview.take().is_some();
        let emission = self.encoder.pointer_up(&self.session, pt);
        let mut actions = self.handle(emission);
        if had_preview && !actions.contains(&Action::RenderNeeded) {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    /// Abandon the gesture in progress (pointer left the surface).
    pub fn on_pointer_cancel(&mut self) -> Vec<Action> {
        self.encoder.cancel();
        if self.preview.take().is_some() {
            return vec![Action::RenderNeeded];
        }
        Vec::new()
    }

    /// Answer a text prompt raised by an earlier [`Action::RequestText`].
    pub fn submit_text(&mut self, id: TextRequestId, answer: Option<String>) -> Vec<Action> {
        match self.encoder.submit_text(id, answer) {
            Some(op) => self.commit(op),
            None => Vec::new(),
        }
    }

    // --- Data inputs ---

    /// Replay a message received from another participant.
    pub fn apply_remote(&mut self, msg: &Message) -> Vec<Action> {
        match msg {
            Message::Clear => self.wipe(),
            Message::Drawing(op) if op.is_transient() => self.add_laser(op),
            Message::Drawing(op) => self.renderer.apply(&mut self.committed, op),
        }
        vec![Action::RenderNeeded]
    }

    /// Wipe locally and tell everyone else to do the same.
    pub fn clear(&mut self) -> Vec<Action> {
        self.wipe();
        vec![Action::Publish(Message::Clear), Action::RenderNeeded]
    }

    /// Advance the overlay clock, dropping expired laser pings.
    pub fn tick(&mut self, now_ms: i64) -> Vec<Action> {
        self.now_ms = now_ms;
        let before = self.lasers.len();
        self.lasers.retain(|l| l.expires_at > now_ms);
        if self.lasers.len() == before {
            return Vec::new();
        }
        debug!(expired = before - self.lasers.len(), "laser pings expired");
        vec![Action::RenderNeeded]
    }

    // --- Queries ---

    /// Committed pixels only.
    #[must_use]
    pub fn canvas(&self) -> &Raster {
        &self.committed
    }

    /// The local drag preview, if a two-point gesture is in progress.
    #[must_use]
    pub fn preview(&self) -> Option<&DrawingOperation> {
        self.preview.as_ref()
    }

    /// Number of laser pings still on the overlay.
    #[must_use]
    pub fn live_lasers(&self) -> usize {
        self.lasers.len()
    }

    /// Committed pixels with the overlay drawn on top.
    #[must_use]
    pub fn compose(&self) -> Raster {
        let mut frame = self.committed.clone();
        let mut overlay = Renderer::new();
        if let Some(op) = &self.preview {
            overlay.apply(&mut frame, op);
        }
        for laser in &self.lasers {
            overlay.apply(&mut frame, &DrawingOperation::Laser(laser.ping));
        }
        frame
    }

    // --- Internals ---

    fn handle(&mut self, emission: Option<Emission>) -> Vec<Action> {
        match emission {
            None => Vec::new(),
            Some(Emission::Commit(op)) => self.commit(op),
            Some(Emission::Preview(op)) => {
                self.preview = Some(op);
                vec![Action::RenderNeeded]
            }
            Some(Emission::RequestText(req)) => vec![Action::RequestText(req)],
        }
    }

    fn commit(&mut self, op: DrawingOperation) -> Vec<Action> {
        if op.is_transient() {
            self.add_laser(&op);
        } else {
            self.renderer.apply(&mut self.committed, &op);
        }
        vec![Action::Publish(Message::Drawing(op)), Action::RenderNeeded]
    }

    fn add_laser(&mut self, op: &DrawingOperation) {
        if let DrawingOperation::Laser(ping) = op {
            self.lasers.push(LiveLaser { ping: *ping, expires_at: self.now_ms + LASER_TTL_MS });
        }
    }

    fn wipe(&mut self) {
        self.renderer.clear(&mut self.committed);
        self.lasers.clear();
    }
}
