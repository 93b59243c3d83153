//! Shared numeric constants for the canvas crate.
//!
//! Everything a peer needs to replay an operation pixel-for-pixel lives here,
//! so two builds that agree on this file agree on the picture.

use std::f64::consts::PI;

// ── Math ────────────────────────────────────────────────────────

/// π / 5 (36°), the angular step between star vertices.
pub const FRAC_PI_5: f64 = PI / 5.0;

// ── Arrow ───────────────────────────────────────────────────────

/// Arrowhead wing length in surface units, independent of line width.
pub const ARROW_SIZE: f64 = 20.0;

/// Arrowhead half-angle in radians (30°).
pub const ARROW_ANGLE: f64 = PI / 6.0;

// ── Star ────────────────────────────────────────────────────────

/// Number of vertices on a star outline (outer and inner alternate).
pub const STAR_VERTICES: u32 = 10;

/// Inner-to-outer radius ratio for the star tool.
pub const STAR_INNER_RATIO: f64 = 0.4;

// ── Selection marquee ───────────────────────────────────────────

/// Marquee highlight color.
pub const SELECTION_COLOR: &str = "#1E90FF";

/// Marquee stroke width.
pub const SELECTION_LINE_WIDTH: f64 = 1.0;

/// Marquee dash pattern (on, off).
pub const SELECTION_DASH: [f64; 2] = [5.0, 5.0];

// ── Laser pointer ───────────────────────────────────────────────

/// Laser ring color.
pub const LASER_COLOR: &str = "#FF0000";

/// Laser ring stroke width.
pub const LASER_LINE_WIDTH: f64 = 2.0;

/// Laser ring radius.
pub const LASER_RADIUS: f64 = 10.0;

/// Laser ring dash pattern (on, off).
pub const LASER_DASH: [f64; 2] = [4.0, 4.0];

/// How long a laser ping stays on the overlay, in milliseconds.
pub const LASER_TTL_MS: i64 = 1_500;

// ── Text ────────────────────────────────────────────────────────

/// Fixed font size for the text tool, in surface units.
pub const TEXT_FONT_PX: f64 = 20.0;

// ── Bookkeeping caps ────────────────────────────────────────────

/// Pen streams the renderer tracks at once; the least recently drawn is
/// forgotten past this.
pub const MAX_PEN_STREAMS: usize = 64;

/// Text prompts the encoder keeps waiting for an answer; the oldest is
/// dropped past this.
pub const MAX_PENDING_TEXT: usize = 32;

// ── Style defaults ──────────────────────────────────────────────

/// Color a fresh session starts with.
pub const DEFAULT_COLOR: &str = "#000000";

/// Line width a fresh session starts with.
pub const DEFAULT_LINE_WIDTH: f64 = 2.0;
