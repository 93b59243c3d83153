//! Raster drawing surface.
//!
//! [`Surface`] is the Canvas2D-shaped seam between the renderer and whatever
//! actually holds pixels: a state stack, stroke and fill styles, a current
//! path, and a compositing switch the eraser uses to punch holes. The
//! renderer talks only to this trait.
//!
//! [`Raster`] is the software implementation, backed by a
//! [`tiny_skia::Pixmap`]. It is anti-aliased and fully deterministic, so two
//! rasters fed the same operations compare pixel-identical.
//!
//! Out-of-range arguments follow Canvas2D: a non-positive or non-finite line
//! width is ignored, a dash list with a negative or non-finite entry is
//! ignored, an odd dash list is repeated to make it even.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use tiny_skia::{
    BlendMode, Color, FillRule, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, StrokeDash, Transform,
};

use crate::color::Rgba;
use crate::font;

/// Compositing mode for subsequent stroke and fill calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Composite {
    /// Paint over existing content.
    #[default]
    SourceOver,
    /// Remove existing content where painted; the paint color is irrelevant.
    DestinationOut,
}

/// End cap for stroked open paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Canvas2D-like drawing target.
pub trait Surface {
    /// Push the current drawing state (styles, dash, cap, composite).
    fn save(&mut self);
    /// Pop the most recently saved drawing state. No-op on an empty stack.
    fn restore(&mut self);

    fn set_stroke_color(&mut self, color: Rgba);
    fn set_fill_color(&mut self, color: Rgba);
    fn set_line_width(&mut self, width: f64);
    fn set_line_cap(&mut self, cap: LineCap);
    /// Set the dash pattern. An empty slice means solid.
    fn set_line_dash(&mut self, segments: &[f64]);
    fn set_composite(&mut self, mode: Composite);

    /// Discard the current path.
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn close_path(&mut self);
    /// Add a closed circle subpath.
    fn circle(&mut self, cx: f64, cy: f64, radius: f64);
    /// Add a closed axis-aligned ellipse subpath.
    fn ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64);

    /// Add a closed rectangle subpath. Width and height may be negative or zero.
    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.move_to(x, y);
        self.line_to(x + width, y);
        self.line_to(x + width, y + height);
        self.line_to(x, y + height);
        self.close_path();
    }

    /// Stroke the current path with the current stroke style.
    fn stroke(&mut self);
    /// Fill the current path (non-zero winding) with the current fill color.
    fn fill(&mut self);
    /// Draw `text` with its alphabetic baseline at `y`, starting at `x`.
    fn fill_text(&mut self, text: &str, x: f64, y: f64, size_px: f64);

    /// Make every pixel fully transparent.
    fn clear(&mut self);
}

/// Errors from creating or exporting a [`Raster`].
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("invalid raster size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("failed to encode png: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq)]
struct DrawState {
    stroke: Rgba,
    fill: Rgba,
    line_width: f32,
    cap: LineCap,
    dash: Vec<f32>,
    composite: Composite,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            stroke: Rgba::BLACK,
            fill: Rgba::BLACK,
            line_width: 1.0,
            cap: LineCap::Butt,
            dash: Vec::new(),
            composite: Composite::SourceOver,
        }
    }
}

/// Software RGBA surface.
#[derive(Clone)]
pub struct Raster {
    pixmap: Pixmap,
    state: DrawState,
    stack: Vec<DrawState>,
    path: PathBuilder,
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}

impl Raster {
    /// Create a fully transparent raster.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidSize`] when either dimension is zero or
    /// the pixel buffer would be too large.
    pub fn new(width: u32, height: u32) -> Result<Self, RasterError> {
        let pixmap = Pixmap::new(width, height).ok_or(RasterError::InvalidSize { width, height })?;
        Ok(Self {
            pixmap,
            state: DrawState::default(),
            stack: Vec::new(),
            path: PathBuilder::new(),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Straight-alpha color of one pixel, or `None` outside the raster.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba { r: c.red(), g: c.green(), b: c.blue(), a: c.alpha() })
    }

    /// Every pixel is fully transparent.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.pixmap.data().chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Same size and byte-identical premultiplied pixels.
    #[must_use]
    pub fn same_pixels(&self, other: &Self) -> bool {
        self.width() == other.width() && self.height() == other.height() && self.pixmap.data() == other.pixmap.data()
    }

    /// Premultiplied RGBA bytes, row-major.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Encode the pixels as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Encode`] if the encoder fails.
    pub fn encode_png(&self) -> Result<Vec<u8>, RasterError> {
        self.pixmap.encode_png().map_err(|e| RasterError::Encode(e.to_string()))
    }

    fn paint(&self, color: Rgba) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;
        paint.blend_mode = match self.state.composite {
            Composite::SourceOver => BlendMode::SourceOver,
            Composite::DestinationOut => BlendMode::DestinationOut,
        };
        paint
    }

    fn stroke_style(&self) -> Stroke {
        Stroke {
            width: self.state.line_width,
            line_cap: match self.state.cap {
                LineCap::Butt => tiny_skia::LineCap::Butt,
                LineCap::Round => tiny_skia::LineCap::Round,
                LineCap::Square => tiny_skia::LineCap::Square,
            },
            line_join: LineJoin::Round,
            dash: if self.state.dash.is_empty() {
                None
            } else {
                StrokeDash::new(self.state.dash.clone(), 0.0)
            },
            ..Stroke::default()
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn f(v: f64) -> f32 {
    v as f32
}

impl Surface for Raster {
    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn set_stroke_color(&mut self, color: Rgba) {
        self.state.stroke = color;
    }

    fn set_fill_color(&mut self, color: Rgba) {
        self.state.fill = color;
    }

    fn set_line_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.state.line_width = f(width);
        }
    }

    fn set_line_cap(&mut self, cap: LineCap) {
        self.state.cap = cap;
    }

    fn set_line_dash(&mut self, segments: &[f64]) {
        if segments.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return;
        }
        let mut dash = segments.iter().map(|s| f(*s)).collect::<Vec<_>>();
        if dash.len() % 2 == 1 {
            dash.extend_from_within(..);
        }
        if dash.iter().all(|s| *s == 0.0) {
            dash.clear();
        }
        self.state.dash = dash;
    }

    fn set_composite(&mut self, mode: Composite) {
        self.state.composite = mode;
    }

    fn begin_path(&mut self) {
        self.path = PathBuilder::new();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.path.move_to(f(x), f(y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.path.line_to(f(x), f(y));
    }

    fn close_path(&mut self) {
        self.path.close();
    }

    fn circle(&mut self, cx: f64, cy: f64, radius: f64) {
        if radius > 0.0 {
            self.path.push_circle(f(cx), f(cy), f(radius));
        }
    }

    fn ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64) {
        let (rx, ry) = (rx.abs(), ry.abs());
        if rx > 0.0 && ry > 0.0 {
            if let Some(bounds) = Rect::from_xywh(f(cx - rx), f(cy - ry), f(rx * 2.0), f(ry * 2.0)) {
                self.path.push_oval(bounds);
            }
            return;
        }
        // A flat ellipse degenerates to its major axis.
        self.path.move_to(f(cx - rx), f(cy - ry));
        self.path.line_to(f(cx + rx), f(cy + ry));
    }

    fn stroke(&mut self) {
        let Some(path) = self.path.clone().finish() else {
            return;
        };
        let paint = self.paint(self.state.stroke);
        let stroke = self.stroke_style();
        self.pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    fn fill(&mut self) {
        let Some(path) = self.path.clone().finish() else {
            return;
        };
        let paint = self.paint(self.state.fill);
        self.pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, size_px: f64) {
        if !(size_px.is_finite() && size_px > 0.0 && x.is_finite() && y.is_finite()) {
            return;
        }
        let mut glyphs = PathBuilder::new();
        font::outline_text(text, f(x), f(y), f(size_px), &mut glyphs);
        let Some(path) = glyphs.finish() else {
            return;
        };
        let paint = self.paint(self.state.fill);
        self.pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
        self.path = PathBuilder::new();
    }
}
