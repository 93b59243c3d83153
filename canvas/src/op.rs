//! Drawing operation schema and its wire mapping.
//!
//! A [`DrawingOperation`] is an immutable, self-describing record: replaying
//! it needs nothing but the target surface. On the wire it is the `data` of a
//! `drawing` frame, tagged by a `type` string plus a numeric `tool` id. A
//! `clear` frame carries no payload.
//!
//! ## Wire shape
//!
//! ```json
//! {"type":"start","tool":1,"x":10,"y":10,"color":"#000000","lineWidth":2}
//! {"type":"rectangle","tool":4,"x":50,"y":50,"width":100,"height":70,"color":"#000000","lineWidth":2}
//! ```
//!
//! Decoding is strict about identity (`type`, `tool`, and their agreement)
//! and about field types. Unknown extra fields are ignored.

#[cfg(test)]
#[path = "op_test.rs"]
mod op_test;

use frames::{Frame, SYSCALL_CLEAR, SYSCALL_DRAWING};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::input::Tool;

/// Data key for the numeric tool id.
pub const FIELD_TOOL: &str = "tool";

/// Data key for the operation sub-tag.
pub const FIELD_TYPE: &str = "type";

/// Every `type` tag a drawing record may carry.
pub const OPERATION_TYPES: [&str; 12] = [
    "start", "draw", "text", "line", "rectangle", "ellipse", "select", "erase", "laser", "arrow", "triangle", "star",
];

/// Error returned when a frame or record cannot become a [`Message`].
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),
    #[error("drawing payload must be a JSON object")]
    NotAnObject,
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("field {0} has the wrong type")]
    InvalidField(&'static str),
    #[error("unknown operation type: {0}")]
    UnknownType(String),
    #[error("unknown tool id: {0}")]
    UnknownTool(u64),
    #[error("tool {tool} does not draw operation type {kind}")]
    ToolMismatch { tool: Tool, kind: String },
    #[error("invalid operation record: {0}")]
    Invalid(#[from] serde_json::Error),
}

// =============================================================
// Payloads
// =============================================================

/// One pen sample: the first (`start`) or a subsequent (`draw`) point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenPoint {
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub line_width: f64,
    /// Groups the records of one stroke. Absent on records from peers that
    /// predate stream ids; those fall back to arrival adjacency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub color: String,
}

/// Two-endpoint geometry for `line` and `arrow`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    pub color: String,
    pub line_width: f64,
}

/// Bounding-box geometry for `rectangle`, `ellipse`, `triangle` and `star`.
/// `width` and `height` are signed: they point in the drag direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxShape {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub line_width: f64,
}

/// Selection marquee. Carries no style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marquee {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Marquee {
    /// The same rectangle with non-negative width and height.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            x: self.x.min(self.x + self.width),
            y: self.y.min(self.y + self.height),
            width: self.width.abs(),
            height: self.height.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erase {
    pub x: f64,
    pub y: f64,
    pub line_width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaserPing {
    pub x: f64,
    pub y: f64,
}

// =============================================================
// Operation
// =============================================================

/// One discrete drawing action, tagged by its wire `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DrawingOperation {
    Start(PenPoint),
    Draw(PenPoint),
    Text(TextRun),
    Line(Segment),
    Rectangle(BoxShape),
    Ellipse(BoxShape),
    #[serde(rename = "select")]
    Selection(Marquee),
    #[serde(rename = "erase")]
    Eraser(Erase),
    Laser(LaserPing),
    Arrow(Segment),
    Triangle(BoxShape),
    Star(BoxShape),
}

impl DrawingOperation {
    /// The tool that produces this operation.
    #[must_use]
    pub fn tool(&self) -> Tool {
        match self {
            Self::Start(_) | Self::Draw(_) => Tool::Pen,
            Self::Text(_) => Tool::Text,
            Self::Line(_) => Tool::Line,
            Self::Rectangle(_) => Tool::Rectangle,
            Self::Ellipse(_) => Tool::Ellipse,
            Self::Selection(_) => Tool::Selection,
            Self::Eraser(_) => Tool::Eraser,
            Self::Laser(_) => Tool::Laser,
            Self::Arrow(_) => Tool::Arrow,
            Self::Triangle(_) => Tool::Triangle,
            Self::Star(_) => Tool::Star,
        }
    }

    /// The wire `type` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Draw(_) => "draw",
            Self::Text(_) => "text",
            Self::Line(_) => "line",
            Self::Rectangle(_) => "rectangle",
            Self::Ellipse(_) => "ellipse",
            Self::Selection(_) => "select",
            Self::Eraser(_) => "erase",
            Self::Laser(_) => "laser",
            Self::Arrow(_) => "arrow",
            Self::Triangle(_) => "triangle",
            Self::Star(_) => "star",
        }
    }

    /// Whether this operation is a transient indicator rather than a mark.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Laser(_))
    }

    /// The record as a JSON object, including the numeric `tool` field.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Invalid`] if serialization fails.
    pub fn to_record(&self) -> Result<Value, WireError> {
        let mut value = serde_json::to_value(self)?;
        let Value::Object(map) = &mut value else {
            return Err(WireError::NotAnObject);
        };
        map.insert(FIELD_TOOL.to_owned(), Value::from(self.tool().id()));
        Ok(value)
    }

    /// Parse a record object. When `require_tool` is set the `tool` field
    /// must be present; when present it must agree with `type`.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] naming the first problem found.
    pub fn from_record(record: &Value, require_tool: bool) -> Result<Self, WireError> {
        let Value::Object(map) = record else {
            return Err(WireError::NotAnObject);
        };
        let mut map = map.clone();

        let tool = match map.remove(FIELD_TOOL) {
            Some(raw) => {
                let id = tool_id(&raw).ok_or(WireError::InvalidField(FIELD_TOOL))?;
                Some(Tool::from_id(id).ok_or(WireError::UnknownTool(id))?)
            }
            None if require_tool => return Err(WireError::MissingField(FIELD_TOOL)),
            None => None,
        };

        let kind = match map.get(FIELD_TYPE) {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(WireError::InvalidField(FIELD_TYPE)),
            None => return Err(WireError::MissingField(FIELD_TYPE)),
        };
        if !OPERATION_TYPES.contains(&kind.as_str()) {
            return Err(WireError::UnknownType(kind));
        }

        let op: Self = serde_json::from_value(Value::Object(map))?;
        if let Some(tool) = tool {
            if tool != op.tool() {
                return Err(WireError::ToolMismatch { tool, kind });
            }
        }
        Ok(op)
    }
}

/// Numeric tool id. Protobuf frames carry every number as a double, so an
/// integral float is accepted too.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tool_id(raw: &Value) -> Option<u64> {
    if let Some(id) = raw.as_u64() {
        return Some(id);
    }
    let float = raw.as_f64()?;
    (float >= 0.0 && float.fract() == 0.0 && float <= f64::from(u32::MAX)).then_some(float as u64)
}

// =============================================================
// Message
// =============================================================

/// Everything that travels over the synchronization channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Drawing(DrawingOperation),
    /// Wipe the surface. No payload.
    Clear,
}

impl Message {
    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::Drawing(_) => SYSCALL_DRAWING,
            Self::Clear => SYSCALL_CLEAR,
        }
    }

    /// Build a fresh request frame for this message.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Invalid`] if the operation cannot be serialized.
    pub fn to_frame(&self) -> Result<Frame, WireError> {
        let data = match self {
            Self::Drawing(op) => op.to_record()?,
            Self::Clear => Value::Object(Map::new()),
        };
        Ok(Frame::request(self.syscall(), data))
    }

    /// Interpret a received frame.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownSyscall`] for anything but `drawing` or
    /// `clear`, and the record errors of [`DrawingOperation::from_record`].
    pub fn from_frame(frame: &Frame) -> Result<Self, WireError> {
        match frame.syscall.as_str() {
            SYSCALL_CLEAR => Ok(Self::Clear),
            SYSCALL_DRAWING => DrawingOperation::from_record(&frame.data, true).map(Self::Drawing),
            other => Err(WireError::UnknownSyscall(other.to_owned())),
        }
    }

    /// Parse one line of a JSONL script: a drawing record (with or without
    /// `tool`) or `{"type":"clear"}`.
    ///
    /// # Errors
    ///
    /// Returns the record errors of [`DrawingOperation::from_record`].
    pub fn from_script_record(record: &Value) -> Result<Self, WireError> {
        if record.get(FIELD_TYPE).and_then(Value::as_str) == Some(SYSCALL_CLEAR) {
            return Ok(Self::Clear);
        }
        DrawingOperation::from_record(record, false).map(Self::Drawing)
    }

    /// The JSONL script form of this message.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Invalid`] if the operation cannot be serialized.
    pub fn to_script_record(&self) -> Result<Value, WireError> {
        match self {
            Self::Drawing(op) => op.to_record(),
            Self::Clear => Ok(serde_json::json!({ "type": "clear" })),
        }
    }
}
