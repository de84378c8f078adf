//! Frame encoding to the serial sink
//!
//! The writer is shared between the event loop owner and the thread that
//! delivers bus events, so the sink sits behind a lock and one frame is
//! always written whole before the next one starts.

use super::FrameSink;
use fgbridge_core::{codec, Frame, FrameError, FrameResult};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Encodes frames and writes them to a byte sink
pub struct FrameWriter<W> {
    sink: Arc<Mutex<W>>,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
        }
    }
}

impl<W: Write> FrameWriter<W> {
    /// Wrap a sink
    pub fn new(sink: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Encode and write one frame
    ///
    /// Returns the number of bytes written. A sink that stops accepting
    /// bytes part-way yields [`FrameError::PartialWrite`]; a sink that fails
    /// before any byte left yields [`FrameError::Io`].
    pub fn write_frame(&self, frame: &Frame) -> FrameResult<usize> {
        let bytes = codec::encode(frame)?;
        let expected = bytes.len();

        let mut sink = self.sink.lock();
        let mut written = 0;
        while written < expected {
            match sink.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if written == 0 => return Err(FrameError::Io(e)),
                Err(e) => {
                    tracing::warn!("Serial write of kind {} failed: {}", frame.kind, e);
                    break;
                }
            }
        }

        if written < expected {
            return Err(FrameError::PartialWrite { written, expected });
        }

        sink.flush()?;
        tracing::debug!("Wrote kind {} to serial ({} bytes)", frame.kind, written);
        Ok(written)
    }

    /// Run `f` with the sink locked
    pub fn with_sink<T>(&self, f: impl FnOnce(&mut W) -> T) -> T {
        f(&mut self.sink.lock())
    }
}

impl<W: Write + Send> FrameSink for FrameWriter<W> {
    fn send_frame(&self, frame: &Frame) -> FrameResult<usize> {
        self.write_frame(frame)
    }
}
