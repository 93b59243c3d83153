//! Drawing core for the shared sketch board.
//!
//! Every participant runs the same pipeline: pointer input is encoded into
//! immutable [`op::DrawingOperation`] records, each record is rendered onto
//! the local surface at once, and then broadcast so every other participant
//! replays it. A `clear` message wipes every surface. There is no history
//! store; a participant sees what was broadcast while it was connected.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`op`] | Operation schema, `Message`, and the wire mapping |
//! | [`input`] | Tools, style, pointer points, and gesture state |
//! | [`encoder`] | Pointer gestures → operations |
//! | [`render`] | Operations → surface calls |
//! | [`surface`] | `Surface` trait and the `tiny-skia` backed `Raster` |
//! | [`engine`] | Per-participant glue with local preview and laser overlay |
//! | [`channel`] | Sans-io synchronization channel |
//! | [`hub`] | In-process star relay for tests and offline replay |
//! | [`color`] | CSS color string parsing |
//! | [`font`] | Glyph outlines for text runs from the bundled faces |
//! | [`consts`] | Fixed geometry and styling constants |

pub mod channel;
pub mod color;
pub mod consts;
pub mod encoder;
pub mod engine;
pub mod font;
pub mod hub;
pub mod input;
pub mod op;
pub mod render;
pub mod surface;
