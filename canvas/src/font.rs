//! Glyph outlines for text runs.
//!
//! Text is set in the sans face bundled by `epaint_default_fonts` (Ubuntu
//! Light), falling back to Noto Emoji for characters the sans face lacks.
//! Characters neither face maps draw as the sans face's `.notdef` glyph.
//! Control characters are skipped.
//!
//! [`outline_text`] lays a run out on one line and streams the glyph
//! contours, already in surface coordinates, into a [`GlyphPen`]. The
//! raster fills them like any other path, so text honours the current fill
//! color and compositing mode.

#[cfg(test)]
#[path = "font_test.rs"]
mod font_test;

use std::sync::OnceLock;

use ab_glyph::{Font, FontRef, GlyphId, OutlineCurve, Point};
use tracing::warn;

/// Receives glyph contours. Coordinates are in surface units, y down.
pub trait GlyphPen {
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32);
    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32);
    fn close(&mut self);
}

impl GlyphPen for tiny_skia::PathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        tiny_skia::PathBuilder::move_to(self, x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        tiny_skia::PathBuilder::line_to(self, x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        tiny_skia::PathBuilder::quad_to(self, x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        tiny_skia::PathBuilder::close(self);
    }
}

static FACES: OnceLock<Vec<FontRef<'static>>> = OnceLock::new();

/// Bundled faces in fallback order. Empty only if every face fails to parse.
pub fn faces() -> &'static [FontRef<'static>] {
    FACES.get_or_init(|| {
        [
            ("ubuntu-light", epaint_default_fonts::UBUNTU_LIGHT),
            ("noto-emoji", epaint_default_fonts::NOTO_EMOJI_REGULAR),
        ]
        .into_iter()
        .filter_map(|(name, bytes)| match FontRef::try_from_slice(bytes) {
            Ok(face) => Some(face),
            Err(e) => {
                warn!(font = name, error = %e, "bundled font failed to parse");
                None
            }
        })
        .collect()
    })
}

/// The face index and glyph that will draw `c`.
#[must_use]
pub fn resolve(c: char) -> Option<(usize, GlyphId)> {
    let faces = faces();
    faces
        .iter()
        .enumerate()
        .map(|(index, face)| (index, face.glyph_id(c)))
        .find(|(_, id)| id.0 != 0)
        .or_else(|| faces.first().map(|face| (0, face.glyph_id(c))))
}

/// Lay `text` out on one line starting at `x` with its alphabetic baseline
/// at `baseline`, `size_px` to the em, and trace every glyph into `pen`.
/// Returns the horizontal advance of the whole run.
pub fn outline_text<P: GlyphPen + ?Sized>(text: &str, x: f32, baseline: f32, size_px: f32, pen: &mut P) -> f32 {
    let faces = faces();
    let mut pen_x = x;
    let mut prev: Option<(usize, GlyphId)> = None;

    for c in text.chars() {
        if c.is_control() {
            prev = None;
            continue;
        }
        let Some((index, id)) = resolve(c) else {
            continue;
        };
        let Some(face) = faces.get(index) else {
            continue;
        };
        let Some(units_per_em) = face.units_per_em() else {
            continue;
        };
        let scale = size_px / units_per_em;

        if let Some((prev_index, prev_id)) = prev {
            if prev_index == index {
                pen_x += face.kern_unscaled(prev_id, id) * scale;
            }
        }
        if let Some(outline) = face.outline(id) {
            trace(&outline.curves, pen_x, baseline, scale, pen);
        }
        pen_x += face.h_advance_unscaled(id) * scale;
        prev = Some((index, id));
    }
    pen_x - x
}

/// Emit font-unit curves (y up) as surface-space contours (y down). A curve
/// that does not start where the previous one ended opens a new contour.
fn trace<P: GlyphPen + ?Sized>(curves: &[OutlineCurve], origin_x: f32, baseline: f32, scale: f32, pen: &mut P) {
    let map = |p: Point| (origin_x + p.x * scale, baseline - p.y * scale);
    let mut last: Option<Point> = None;

    for curve in curves {
        let (start, end) = match *curve {
            OutlineCurve::Line(a, b) | OutlineCurve::Quad(a, _, b) | OutlineCurve::Cubic(a, _, _, b) => (a, b),
        };
        if last != Some(start) {
            if last.is_some() {
                pen.close();
            }
            let (sx, sy) = map(start);
            pen.move_to(sx, sy);
        }
        match *curve {
            OutlineCurve::Line(_, b) => {
                let (x, y) = map(b);
                pen.line_to(x, y);
            }
            OutlineCurve::Quad(_, c, b) => {
                let ((cx, cy), (x, y)) = (map(c), map(b));
                pen.quad_to(cx, cy, x, y);
            }
            OutlineCurve::Cubic(_, c1, c2, b) => {
                let ((x1, y1), (x2, y2), (x, y)) = (map(c1), map(c2), map(b));
                pen.curve_to(x1, y1, x2, y2, x, y);
            }
        }
        last = Some(end);
    }
    if last.is_some() {
        pen.close();
    }
}
