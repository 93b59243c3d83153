//! Input model: tools, style, the per-participant session, and the gesture
//! state machine.
//!
//! `Tool` and `Style` capture the user's intent at the time of a pointer
//! event. `Session` bundles them so the encoder never reads ambient state.
//! `InputState` is the active gesture being tracked between pointer-down and
//! pointer-up, carrying whatever was snapshotted at pointer-down.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::consts::{DEFAULT_COLOR, DEFAULT_LINE_WIDTH};

/// A point in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite numbers.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Which tool is currently active.
///
/// The discriminants are the numeric ids carried in the `tool` field on the
/// wire; they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Tool {
    /// Freehand pen (default).
    #[default]
    Pen = 1,
    /// Place a run of text.
    Text = 2,
    /// Straight line segment.
    Line = 3,
    /// Axis-aligned stroked rectangle.
    Rectangle = 4,
    /// Bounding-box ellipse.
    Ellipse = 5,
    /// Dashed selection marquee.
    Selection = 6,
    /// Destructive circular eraser.
    Eraser = 7,
    /// Transient pointer ping.
    Laser = 8,
    /// Line with a two-wing arrowhead.
    Arrow = 9,
    /// Isosceles triangle in a bounding box.
    Triangle = 10,
    /// Ten-vertex star in a bounding box.
    Star = 11,
}

impl Tool {
    pub const ALL: [Self; 11] = [
        Self::Pen,
        Self::Text,
        Self::Line,
        Self::Rectangle,
        Self::Ellipse,
        Self::Selection,
        Self::Eraser,
        Self::Laser,
        Self::Arrow,
        Self::Triangle,
        Self::Star,
    ];

    /// Numeric wire id.
    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a tool by its numeric wire id.
    #[must_use]
    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| u64::from(tool.id()) == id)
    }

    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Pen => "pen",
            Self::Text => "text",
            Self::Line => "line",
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Selection => "selection",
            Self::Eraser => "eraser",
            Self::Laser => "laser",
            Self::Arrow => "arrow",
            Self::Triangle => "triangle",
            Self::Star => "star",
        }
    }

    /// Whether this tool anchors on pointer-down and commits one shape on
    /// pointer-up.
    #[must_use]
    pub fn is_two_point(self) -> bool {
        matches!(
            self,
            Self::Line | Self::Rectangle | Self::Ellipse | Self::Selection | Self::Arrow | Self::Triangle | Self::Star
        )
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown tool name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool: {0}")]
pub struct UnknownToolName(pub String);

impl FromStr for Tool {
    type Err = UnknownToolName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|tool| tool.name() == lower)
            .ok_or(UnknownToolName(lower))
    }
}

/// Stroke style snapshotted into every operation that draws with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    /// Color string as picked by the user.
    pub color: String,
    /// Stroke width; always finite and positive.
    line_width: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self { color: DEFAULT_COLOR.to_owned(), line_width: DEFAULT_LINE_WIDTH }
    }
}

impl Style {
    /// Build a style, refusing a width that is not finite and positive.
    #[must_use]
    pub fn new(color: impl Into<String>, line_width: f64) -> Option<Self> {
        is_valid_width(line_width).then(|| Self { color: color.into(), line_width })
    }

    #[must_use]
    pub fn line_width(&self) -> f64 {
        self.line_width
    }

    /// Set the stroke width. Returns `false` and keeps the previous width
    /// when `width` is not finite and positive.
    pub fn set_line_width(&mut self, width: f64) -> bool {
        if !is_valid_width(width) {
            return false;
        }
        self.line_width = width;
        true
    }
}

fn is_valid_width(width: f64) -> bool {
    width.is_finite() && width > 0.0
}

/// Explicit per-participant tool and style state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub tool: Tool,
    pub style: Style,
}

impl Session {
    #[must_use]
    pub fn new(tool: Tool, style: Style) -> Self {
        Self { tool, style }
    }
}

/// Identifier for a pending text prompt.
pub type TextRequestId = u64;

/// A request for the host to collect a text string from the user.
///
/// Answer it with [`crate::encoder::Encoder::submit_text`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRequest {
    pub id: TextRequestId,
    pub x: f64,
    pub y: f64,
}

/// Internal state for the input state machine.
///
/// Each active variant carries the gesture context needed to emit operations
/// on later events.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// The pen is down; every move appends to this stream.
    Streaming {
        /// Stream id stamped on the `start` record and every `draw`.
        stream: Uuid,
    },
    /// A two-point tool is being dragged from an anchor.
    Dragging {
        /// Tool captured at pointer-down; later tool switches do not apply.
        tool: Tool,
        /// Surface point where the drag started.
        anchor: Point,
        /// Style captured at pointer-down.
        style: Style,
    },
    /// The eraser is down; every move punches a hole.
    Erasing,
}

impl InputState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}
