//! Rendering: replays drawing operations onto a [`Surface`].
//!
//! This module is the only place that turns operation geometry into surface
//! calls. It reads operations and never mutates them; the only state it keeps
//! is the last point of each open pen stream.
//!
//! Every operation is drawn between `save` and `restore`, so style, dash, and
//! compositing changes (the eraser's `DestinationOut` in particular) never
//! leak into the next operation. Operations with non-finite geometry, a
//! non-finite or non-positive line width, or empty text are skipped.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

use tracing::debug;
use uuid::Uuid;

use crate::color::{self, Rgba};
use crate::consts::{
    ARROW_ANGLE, ARROW_SIZE, FRAC_PI_5, LASER_COLOR, LASER_DASH, LASER_LINE_WIDTH, LASER_RADIUS, MAX_PEN_STREAMS,
    SELECTION_COLOR, SELECTION_DASH, SELECTION_LINE_WIDTH, STAR_INNER_RATIO, STAR_VERTICES, TEXT_FONT_PX,
};
use crate::input::Point;
use crate::op::{BoxShape, DrawingOperation, Erase, LaserPing, Marquee, PenPoint, Segment, TextRun};
use crate::surface::{Composite, LineCap, Surface};

/// Replays operations; tracks open pen streams between calls.
#[derive(Debug, Default)]
pub struct Renderer {
    /// Last point of each open pen stream. Records without a stream id share
    /// the `None` slot and rely on arrival order.
    cursors: HashMap<Option<Uuid>, Cursor>,
    /// Monotonic counter stamped on a cursor each time its stream moves.
    clock: u64,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    at: Point,
    touched: u64,
}

impl Renderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pen streams with a known last point.
    #[must_use]
    pub fn open_streams(&self) -> usize {
        self.cursors.len()
    }

    /// Apply one operation to `surface`.
    pub fn apply<S: Surface + ?Sized>(&mut self, surface: &mut S, op: &DrawingOperation) {
        if !is_drawable(op) {
            debug!(kind = op.kind(), "skipping operation with unusable geometry");
            return;
        }

        surface.save();
        match op {
            DrawingOperation::Start(p) => {
                self.place(p.stream, Point::new(p.x, p.y));
            }
            DrawingOperation::Draw(p) => self.draw_pen(surface, p),
            DrawingOperation::Text(t) => draw_text(surface, t),
            DrawingOperation::Line(s) => draw_line(surface, s),
            DrawingOperation::Arrow(s) => draw_arrow(surface, s),
            DrawingOperation::Rectangle(b) => draw_rectangle(surface, b),
            DrawingOperation::Ellipse(b) => draw_ellipse(surface, b),
            DrawingOperation::Triangle(b) => draw_triangle(surface, b),
            DrawingOperation::Star(b) => draw_star(surface, b),
            DrawingOperation::Selection(m) => draw_selection(surface, *m),
            DrawingOperation::Eraser(e) => draw_erase(surface, *e),
            DrawingOperation::Laser(l) => draw_laser(surface, *l),
        }
        surface.restore();
    }

    /// Wipe `surface` and forget every open pen stream.
    pub fn clear<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        surface.clear();
        self.cursors.clear();
    }

    fn draw_pen<S: Surface + ?Sized>(&mut self, surface: &mut S, p: &PenPoint) {
        let to = Point::new(p.x, p.y);
        // A draw with no known start only places the cursor.
        let Some(from) = self.place(p.stream, to) else {
            return;
        };

        apply_stroke(surface, &p.color, p.line_width);
        surface.set_line_cap(LineCap::Round);
        stroke_segment(surface, from, to, p.line_width);
    }

    /// Move `stream`'s cursor to `at`, returning where it was. Opening a
    /// stream past the cap forgets the least recently drawn one.
    fn place(&mut self, stream: Option<Uuid>, at: Point) -> Option<Point> {
        self.clock += 1;
        let previous = self.cursors.insert(stream, Cursor { at, touched: self.clock });
        if previous.is_none() && self.cursors.len() > MAX_PEN_STREAMS {
            let stale = self.cursors.iter().min_by_key(|(_, c)| c.touched).map(|(id, _)| *id);
            if let Some(stale) = stale {
                self.cursors.remove(&stale);
                debug!(stream = ?stale, "forgetting least recently drawn pen stream");
            }
        }
        previous.map(|c| c.at)
    }
}

// =============================================================
// Validation
// =============================================================

fn finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn valid_width(width: f64) -> bool {
    width.is_finite() && width > 0.0
}

fn is_drawable(op: &DrawingOperation) -> bool {
    match op {
        DrawingOperation::Start(p) | DrawingOperation::Draw(p) => finite(&[p.x, p.y]) && valid_width(p.line_width),
        DrawingOperation::Text(t) => finite(&[t.x, t.y]) && !t.text.is_empty(),
        DrawingOperation::Line(s) | DrawingOperation::Arrow(s) => {
            finite(&[s.start_x, s.start_y, s.end_x, s.end_y]) && valid_width(s.line_width)
        }
        DrawingOperation::Rectangle(b)
        | DrawingOperation::Ellipse(b)
        | DrawingOperation::Triangle(b)
        | DrawingOperation::Star(b) => finite(&[b.x, b.y, b.width, b.height]) && valid_width(b.line_width),
        DrawingOperation::Selection(m) => finite(&[m.x, m.y, m.width, m.height]),
        DrawingOperation::Eraser(e) => finite(&[e.x, e.y]) && valid_width(e.line_width),
        DrawingOperation::Laser(l) => finite(&[l.x, l.y]),
    }
}

// =============================================================
// Strokes
// =============================================================

/// Stroke style from an operation's snapshot. The fill color follows so
/// zero-length segments dot in the same color.
fn apply_stroke<S: Surface + ?Sized>(surface: &mut S, color_str: &str, width: f64) {
    let rgba = color::resolve(color_str);
    surface.set_stroke_color(rgba);
    surface.set_fill_color(rgba);
    surface.set_line_width(width);
}

/// Stroke `from`→`to`; a zero-length segment becomes a dot of the stroke's
/// diameter so it stays visible.
fn stroke_segment<S: Surface + ?Sized>(surface: &mut S, from: Point, to: Point, width: f64) {
    surface.begin_path();
    if from == to {
        surface.circle(to.x, to.y, width / 2.0);
        surface.fill();
        return;
    }
    surface.move_to(from.x, from.y);
    surface.line_to(to.x, to.y);
    surface.stroke();
}

fn draw_line<S: Surface + ?Sized>(surface: &mut S, s: &Segment) {
    apply_stroke(surface, &s.color, s.line_width);
    stroke_segment(surface, Point::new(s.start_x, s.start_y), Point::new(s.end_x, s.end_y), s.line_width);
}

fn draw_arrow<S: Surface + ?Sized>(surface: &mut S, s: &Segment) {
    draw_line(surface, s);

    let [left, right] = arrow_wings(s);
    let tip = Point::new(s.end_x, s.end_y);
    surface.begin_path();
    surface.move_to(left.x, left.y);
    surface.line_to(tip.x, tip.y);
    surface.line_to(right.x, right.y);
    surface.stroke();
}

/// Outer ends of the two arrowhead wings. Each wing is `ARROW_SIZE` long and
/// sits `ARROW_ANGLE` either side of the reversed shaft direction.
#[must_use]
pub fn arrow_wings(s: &Segment) -> [Point; 2] {
    let angle = (s.end_y - s.start_y).atan2(s.end_x - s.start_x);
    let wing = |offset: f64| {
        Point::new(
            s.end_x - ARROW_SIZE * (angle + offset).cos(),
            s.end_y - ARROW_SIZE * (angle + offset).sin(),
        )
    };
    [wing(-ARROW_ANGLE), wing(ARROW_ANGLE)]
}

// =============================================================
// Box shapes
// =============================================================

fn draw_rectangle<S: Surface + ?Sized>(surface: &mut S, b: &BoxShape) {
    apply_stroke(surface, &b.color, b.line_width);
    surface.begin_path();
    surface.rect(b.x, b.y, b.width, b.height);
    surface.stroke();
}

fn draw_ellipse<S: Surface + ?Sized>(surface: &mut S, b: &BoxShape) {
    apply_stroke(surface, &b.color, b.line_width);
    surface.begin_path();
    surface.ellipse(b.x + b.width / 2.0, b.y + b.height / 2.0, (b.width / 2.0).abs(), (b.height / 2.0).abs());
    surface.stroke();
}

fn draw_triangle<S: Surface + ?Sized>(surface: &mut S, b: &BoxShape) {
    apply_stroke(surface, &b.color, b.line_width);
    surface.begin_path();
    surface.move_to(b.x + b.width / 2.0, b.y);
    surface.line_to(b.x + b.width, b.y + b.height);
    surface.line_to(b.x, b.y + b.height);
    surface.close_path();
    surface.stroke();
}

fn draw_star<S: Surface + ?Sized>(surface: &mut S, b: &BoxShape) {
    apply_stroke(surface, &b.color, b.line_width);
    surface.begin_path();
    for (i, p) in star_vertices(b).into_iter().enumerate() {
        if i == 0 {
            surface.move_to(p.x, p.y);
        } else {
            surface.line_to(p.x, p.y);
        }
    }
    surface.close_path();
    surface.stroke();
}

/// Star outline: vertex 0 points straight up, radii alternate outer/inner.
#[must_use]
pub fn star_vertices(b: &BoxShape) -> Vec<Point> {
    let cx = b.x + b.width / 2.0;
    let cy = b.y + b.height / 2.0;
    let outer = b.width.abs().min(b.height.abs()) / 2.0;
    let inner = outer * STAR_INNER_RATIO;

    (0..STAR_VERTICES)
        .map(|i| {
            let angle = FRAC_PI_5.mul_add(f64::from(i), -FRAC_PI_2);
            let r = if i % 2 == 0 { outer } else { inner };
            Point::new(r.mul_add(angle.cos(), cx), r.mul_add(angle.sin(), cy))
        })
        .collect()
}

// =============================================================
// Fixed-style tools
// =============================================================

fn draw_selection<S: Surface + ?Sized>(surface: &mut S, m: Marquee) {
    let m = m.normalized();
    surface.set_stroke_color(color::resolve(SELECTION_COLOR));
    surface.set_line_width(SELECTION_LINE_WIDTH);
    surface.set_line_dash(&SELECTION_DASH);
    surface.begin_path();
    surface.rect(m.x, m.y, m.width, m.height);
    surface.stroke();
}

fn draw_laser<S: Surface + ?Sized>(surface: &mut S, l: LaserPing) {
    surface.set_stroke_color(color::resolve(LASER_COLOR));
    surface.set_line_width(LASER_LINE_WIDTH);
    surface.set_line_dash(&LASER_DASH);
    surface.begin_path();
    surface.circle(l.x, l.y, LASER_RADIUS);
    surface.stroke();
}

fn draw_erase<S: Surface + ?Sized>(surface: &mut S, e: Erase) {
    surface.set_composite(Composite::DestinationOut);
    surface.set_fill_color(Rgba::BLACK);
    surface.begin_path();
    surface.circle(e.x, e.y, e.line_width / 2.0);
    surface.fill();
    surface.set_composite(Composite::SourceOver);
}

fn draw_text<S: Surface + ?Sized>(surface: &mut S, t: &TextRun) {
    surface.set_fill_color(color::resolve(&t.color));
    surface.fill_text(&t.text, t.x, t.y, TEXT_FONT_PX);
}
