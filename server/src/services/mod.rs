//! Domain services used by websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room bookkeeping so route handlers can stay focused
//! on protocol translation.

pub mod room;
