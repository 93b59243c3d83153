//! Color parsing for operation payloads.
//!
//! Operations carry colors as the strings a user picked (`"#ff0000"`,
//! `"red"`, `"rgba(0, 0, 0, 0.5)"`). The renderer resolves them here; a
//! string nobody can parse paints opaque black, the same fallback a Canvas2D
//! context uses when handed garbage.

#[cfg(test)]
#[path = "color_test.rs"]
mod color_test;

/// Straight (non-premultiplied) 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Self = Self::opaque(0, 0, 0);
    pub const TRANSPARENT: Self = Self { r: 0, g: 0, b: 0, a: 0 };

    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Resolve a color string, falling back to opaque black.
#[must_use]
pub fn resolve(raw: &str) -> Rgba {
    parse(raw).unwrap_or(Rgba::BLACK)
}

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`, or a CSS color name.
#[must_use]
pub fn parse(raw: &str) -> Option<Rgba> {
    let trimmed = raw.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = trimmed.to_ascii_lowercase();
    if let Some(args) = lower.strip_prefix("rgba(").and_then(|s| s.strip_suffix(')')) {
        return parse_functional(args, true);
    }
    if let Some(args) = lower.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
        return parse_functional(args, false);
    }
    named(&lower)
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let digits = hex.bytes().map(nibble).collect::<Option<Vec<u8>>>()?;

    match digits.as_slice() {
        [r, g, b] => Some(Rgba::opaque(r * 17, g * 17, b * 17)),
        [r1, r0, g1, g0, b1, b0] => Some(Rgba::opaque(r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0)),
        [r1, r0, g1, g0, b1, b0, a1, a0] => Some(Rgba {
            r: r1 * 16 + r0,
            g: g1 * 16 + g0,
            b: b1 * 16 + b0,
            a: a1 * 16 + a0,
        }),
        _ => None,
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn parse_functional(args: &str, with_alpha: bool) -> Option<Rgba> {
    let parts = args.split(',').map(str::trim).collect::<Vec<_>>();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }

    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = if with_alpha { alpha(parts[3])? } else { 255 };
    Some(Rgba { r, g, b, a })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(raw: &str) -> Option<u8> {
    let Ok(value) = raw.parse::<f64>() else {
        return None;
    };
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, 255.0) as u8)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn alpha(raw: &str) -> Option<u8> {
    let Ok(value) = raw.parse::<f64>() else {
        return None;
    };
    if !value.is_finite() {
        return None;
    }
    Some((value.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn named(name: &str) -> Option<Rgba> {
    let rgb = match name {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "lime" => (0, 255, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "cyan" | "aqua" => (0, 255, 255),
        "magenta" | "fuchsia" => (255, 0, 255),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "pink" => (255, 192, 203),
        "brown" => (165, 42, 42),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "maroon" => (128, 0, 0),
        "olive" => (128, 128, 0),
        "navy" => (0, 0, 128),
        "teal" => (0, 128, 128),
        "gold" => (255, 215, 0),
        "dodgerblue" => (30, 144, 255),
        "transparent" => return Some(Rgba::TRANSPARENT),
        _ => return None,
    };
    Some(Rgba::opaque(rgb.0, rgb.1, rgb.2))
}
