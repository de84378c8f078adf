//! The bridge core
//!
//! ```text
//!            ┌──────────────┐  frame   ┌────────────────┐  send   ┌─────────┐
//! serial ──▶ │ FrameReader  │ ───────▶ │ EventDispatcher│ ──────▶ │   bus   │
//!            └──────────────┘          └────────────────┘         └─────────┘
//!            ┌──────────────┐  frame   ┌────────────────┐ deliver ┌─────────┐
//! serial ◀── │ FrameWriter  │ ◀─────── │ EventDispatcher│ ◀────── │   bus   │
//!            └──────────────┘          └────────────────┘         └─────────┘
//! ```
//!
//! [`event_loop::EventLoop`] waits on the serial descriptor and the
//! [`shutdown::ShutdownSignal`] descriptor and drives the upper path.

pub mod dispatcher;
pub mod event_loop;
pub mod reader;
pub mod shutdown;
pub mod writer;

use fgbridge_core::{Frame, FrameResult};

/// Anything a dispatched frame can be handed to
pub trait FrameSink: Send + Sync {
    /// Send one frame, returning the number of bytes that left
    fn send_frame(&self, frame: &Frame) -> FrameResult<usize>;
}
