//! Operation encoder: pointer events plus session state in, drawing
//! operations out.
//!
//! DESIGN
//! ======
//! The encoder is a small state machine over [`InputState`]. It never reads
//! ambient state; every call receives the [`Session`] explicitly, and every
//! emitted operation carries its own copy of the style it was drawn with.
//!
//! Per tool:
//! - pen: down emits `start`, each held move emits `draw`, up ends the stream
//! - two-point tools: down records the anchor, moves emit local previews, up
//!   emits exactly one committed shape
//! - eraser: each held move emits one `erase`
//! - laser: down emits one `laser`
//! - text: down asks the host for a string; the answer arrives later through
//!   [`Encoder::submit_text`] while other tools keep working. At most
//!   `MAX_PENDING_TEXT` prompts wait at once; raising another drops the oldest
//!
//! Malformed input (a move or up with no prior down, a down during an active
//! gesture, non-finite coordinates) is ignored.

#[cfg(test)]
#[path = "encoder_test.rs"]
mod encoder_test;

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::consts::MAX_PENDING_TEXT;
use crate::input::{InputState, Point, Session, Style, TextRequest, TextRequestId, Tool};
use crate::op::{BoxShape, DrawingOperation, Erase, LaserPing, Marquee, PenPoint, Segment, TextRun};

/// What the encoder produced for one input event.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// Render locally and broadcast.
    Commit(DrawingOperation),
    /// Render on the local overlay only; never broadcast.
    Preview(DrawingOperation),
    /// Ask the host for a text string.
    RequestText(TextRequest),
}

/// A text prompt awaiting its answer. The color is the one active when the
/// prompt was raised.
#[derive(Debug, Clone)]
struct PendingText {
    at: Point,
    color: String,
}

#[derive(Debug, Default)]
pub struct Encoder {
    state: InputState,
    pending: HashMap<TextRequestId, PendingText>,
    next_request: TextRequestId,
}

impl Encoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The gesture in progress.
    #[must_use]
    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Number of text prompts still waiting for an answer.
    #[must_use]
    pub fn pending_text(&self) -> usize {
        self.pending.len()
    }

    // --- Pointer events ---

    pub fn pointer_down(&mut self, session: &Session, pt: Point) -> Option<Emission> {
        if !pt.is_finite() || !self.state.is_idle() {
            return None;
        }

        match session.tool {
            Tool::Pen => {
                let stream = Uuid::new_v4();
                self.state = InputState::Streaming { stream };
                Some(Emission::Commit(DrawingOperation::Start(pen_point(pt, &session.style, stream))))
            }
            Tool::Text => {
                let id = self.next_request;
                self.next_request += 1;
                self.pending.insert(id, PendingText { at: pt, color: session.style.color.clone() });
                if self.pending.len() > MAX_PENDING_TEXT {
                    let oldest = self.pending.keys().min().copied();
                    if let Some(oldest) = oldest {
                        self.pending.remove(&oldest);
                        debug!(request = oldest, "dropping oldest unanswered text prompt");
                    }
                }
                Some(Emission::RequestText(TextRequest { id, x: pt.x, y: pt.y }))
            }
            Tool::Eraser => {
                self.state = InputState::Erasing;
                None
            }
            Tool::Laser => Some(Emission::Commit(DrawingOperation::Laser(LaserPing { x: pt.x, y: pt.y }))),
            tool => {
                self.state = InputState::Dragging { tool, anchor: pt, style: session.style.clone() };
                None
            }
        }
    }

    pub fn pointer_move(&mut self, session: &Session, pt: Point) -> Option<Emission> {
        if !pt.is_finite() {
            return None;
        }

        match &self.state {
            InputState::Idle => None,
            InputState::Streaming { stream } => {
                Some(Emission::Commit(DrawingOperation::Draw(pen_point(pt, &session.style, *stream))))
            }
            InputState::Dragging { tool, anchor, style } => {
                shape(*tool, *anchor, pt, style).map(Emission::Preview)
            }
            InputState::Erasing => Some(Emission::Commit(DrawingOperation::Eraser(Erase {
                x: pt.x,
                y: pt.y,
                line_width: session.style.line_width(),
            }))),
        }
    }

    pub fn pointer_up(&mut self, _session: &Session, pt: Point) -> Option<Emission> {
        let state = std::mem::take(&mut self.state);
        match state {
            InputState::Dragging { tool, anchor, style } if pt.is_finite() => {
                shape(tool, anchor, pt, &style).map(Emission::Commit)
            }
            _ => None,
        }
    }

    /// Abandon the gesture in progress without emitting anything.
    pub fn cancel(&mut self) {
        self.state = InputState::Idle;
    }

    // --- Text ---

    /// Answer a text prompt. An empty or cancelled (`None`) answer, or an
    /// unknown id, produces nothing.
    pub fn submit_text(&mut self, id: TextRequestId, answer: Option<String>) -> Option<DrawingOperation> {
        let pending = self.pending.remove(&id)?;
        let text = answer.filter(|t| !t.is_empty())?;
        Some(DrawingOperation::Text(TextRun {
            x: pending.at.x,
            y: pending.at.y,
            text,
            color: pending.color,
        }))
    }
}

fn pen_point(pt: Point, style: &Style, stream: Uuid) -> PenPoint {
    PenPoint {
        x: pt.x,
        y: pt.y,
        color: style.color.clone(),
        line_width: style.line_width(),
        stream: Some(stream),
    }
}

/// Final geometry of a two-point tool dragged from `anchor` to `pt`.
fn shape(tool: Tool, anchor: Point, pt: Point, style: &Style) -> Option<DrawingOperation> {
    let segment = || Segment {
        start_x: anchor.x,
        start_y: anchor.y,
        end_x: pt.x,
        end_y: pt.y,
        color: style.color.clone(),
        line_width: style.line_width(),
    };
    let bounds = || BoxShape {
        x: anchor.x,
        y: anchor.y,
        width: pt.x - anchor.x,
        height: pt.y - anchor.y,
        color: style.color.clone(),
        line_width: style.line_width(),
    };

    match tool {
        Tool::Line => Some(DrawingOperation::Line(segment())),
        Tool::Arrow => Some(DrawingOperation::Arrow(segment())),
        Tool::Rectangle => Some(DrawingOperation::Rectangle(bounds())),
        Tool::Ellipse => Some(DrawingOperation::Ellipse(bounds())),
        Tool::Triangle => Some(DrawingOperation::Triangle(bounds())),
        Tool::Star => Some(DrawingOperation::Star(bounds())),
        Tool::Selection => Some(DrawingOperation::Selection(
            Marquee {
                x: anchor.x,
                y: anchor.y,
                width: pt.x - anchor.x,
                height: pt.y - anchor.y,
            }
            .normalized(),
        )),
        Tool::Pen | Tool::Text | Tool::Eraser | Tool::Laser => None,
    }
}
