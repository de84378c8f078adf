//! Link to the coordinator's event bus
//!
//! The coordinator listens on a Unix domain socket and speaks the same
//! START/HEADER/PAYLOAD/END framing as the serial line. Handshake,
//! heartbeat and reconnect policy belong to the coordinator side; this
//! client only sends frames, delivers inbound frames to a callback, and
//! closes the connection on request.

use crate::bridge::reader::FrameReader;
use crate::bridge::FrameSink;
use fgbridge_core::{codec, BridgeError, Frame, FrameError, FrameResult, Result};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// The bus collaborator as seen by the event loop
pub trait BusClient: FrameSink {
    /// Release the connection
    fn shutdown(&mut self) -> io::Result<()>;
}

/// Bus client over a Unix domain socket
///
/// Inbound frames are decoded on a dedicated reader thread and passed to
/// the callback given to [`connect`](Self::connect). The callback runs on
/// that thread, not on the event loop. Frames the reader had to drop
/// (oversized or unallocatable) are delivered as `Err` so the caller can
/// account for them; the reader keeps going afterwards.
pub struct UnixBusClient {
    path: PathBuf,
    stream: Mutex<UnixStream>,
    reader: Option<JoinHandle<()>>,
}

impl UnixBusClient {
    /// Connect to the coordinator socket
    ///
    /// `max_payload` bounds inbound frames the same way the serial reader
    /// does. Connection failure is an initialization error.
    pub fn connect<F>(path: impl AsRef<Path>, max_payload: usize, mut on_delivery: F) -> Result<Self>
    where
        F: FnMut(FrameResult<Frame>) + Send + 'static,
    {
        let path = path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&path).map_err(|e| {
            BridgeError::init("bus", format!("failed to connect to {}: {}", path.display(), e))
        })?;
        let read_half = stream.try_clone().map_err(|e| {
            BridgeError::init("bus", format!("failed to clone bus socket: {}", e))
        })?;

        let reader = thread::Builder::new()
            .name("fgbridge-bus".to_string())
            .spawn(move || {
                let mut frames = FrameReader::new(read_half, max_payload);
                loop {
                    match frames.read_frame() {
                        Ok(Some(decoded)) => {
                            tracing::debug!("Received {} from bus", decoded.frame);
                            on_delivery(Ok(decoded.frame));
                        }
                        Ok(None) => {
                            tracing::debug!("Bus connection closed");
                            break;
                        }
                        Err(e) if e.is_transient() => {
                            tracing::warn!("Dropped frame from bus: {}", e);
                            on_delivery(Err(e));
                        }
                        Err(e) => {
                            tracing::warn!("Bus read failed: {}", e);
                            break;
                        }
                    }
                }
            })
            .map_err(|e| BridgeError::init("bus", format!("failed to spawn reader: {}", e)))?;

        tracing::info!("Connected to bus at {}", path.display());

        Ok(Self {
            path,
            stream: Mutex::new(stream),
            reader: Some(reader),
        })
    }

    /// Socket path this client is connected to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the inbound reader is still running
    pub fn is_receiving(&self) -> bool {
        self.reader.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl FrameSink for UnixBusClient {
    fn send_frame(&self, frame: &Frame) -> FrameResult<usize> {
        let bytes = codec::encode(frame)?;
        self.stream.lock().write_all(&bytes).map_err(FrameError::Io)?;
        Ok(bytes.len())
    }
}

impl BusClient for UnixBusClient {
    fn shutdown(&mut self) -> io::Result<()> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };

        match self.stream.lock().shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
            Err(e) => return Err(e),
        }

        if reader.join().is_err() {
            tracing::warn!("Bus reader thread panicked");
        }
        tracing::info!("Disconnected from bus at {}", self.path.display());
        Ok(())
    }
}

impl Drop for UnixBusClient {
    fn drop(&mut self) {
        if let Err(e) = BusClient::shutdown(self) {
            tracing::warn!("Failed to close bus connection: {}", e);
        }
    }
}

impl std::fmt::Debug for UnixBusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixBusClient")
            .field("path", &self.path)
            .field("receiving", &self.is_receiving())
            .finish()
    }
}
