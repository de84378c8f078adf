//! The bridge event loop
//!
//! One thread, one blocking `poll(2)` over two descriptors: the hardware
//! link and the shutdown pipe. There is no timeout; the loop only wakes
//! when one of them has something to say.
//!
//! ```text
//!   ┌─────────┐  shutdown readable   ┌──────────┐
//!   │ Running │ ───────────────────▶ │ Stopping │
//!   └─────────┘                      └──────────┘
//!      │   ▲
//!      └───┘ hardware readable: read one frame, dispatch it
//! ```
//!
//! Shutdown wins ties: if both descriptors are ready the loop stops without
//! touching the hardware.

use super::dispatcher::{outcome_event, Direction, EventDispatcher};
use super::reader::FrameReader;
use super::shutdown::ShutdownSignal;
use crate::communication::bus_link::BusClient;
use fgbridge_core::{BridgeError, BridgeEvent, DropReason, EventBus, Result};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io::Read;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::sync::Arc;

/// Loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting on descriptors
    Running,
    /// Terminal
    Stopping,
}

/// Multiplexes the hardware link and the shutdown signal
pub struct EventLoop<'a, R, B> {
    reader: FrameReader<R>,
    shutdown: &'a ShutdownSignal,
    dispatcher: EventDispatcher,
    bus: &'a mut B,
    events: Option<Arc<EventBus>>,
    state: LoopState,
}

impl<'a, R, B> EventLoop<'a, R, B>
where
    R: Read + AsRawFd,
    B: BusClient,
{
    /// Build a loop over a hardware reader
    pub fn new(
        reader: FrameReader<R>,
        shutdown: &'a ShutdownSignal,
        dispatcher: EventDispatcher,
        bus: &'a mut B,
    ) -> Self {
        Self {
            reader,
            shutdown,
            dispatcher,
            bus,
            events: None,
            state: LoopState::Running,
        }
    }

    /// Publish loop activity to a diagnostic bus
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Current state
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The hardware frame reader
    pub fn reader_mut(&mut self) -> &mut FrameReader<R> {
        &mut self.reader
    }

    /// Run until shutdown, then release the bus connection
    ///
    /// Returns `Ok` when stopped by the shutdown signal and
    /// [`BridgeError::LinkLost`] when the hardware descriptor died.
    pub fn run(&mut self) -> Result<()> {
        let outcome = loop {
            match self.turn() {
                Ok(LoopState::Running) => continue,
                Ok(LoopState::Stopping) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.state = LoopState::Stopping;

        if let Err(e) = &outcome {
            tracing::error!("Event loop stopped: {}", e);
        }
        self.publish(BridgeEvent::Stopped {
            graceful: outcome.is_ok(),
        });

        if let Err(e) = self.bus.shutdown() {
            tracing::warn!("Failed to release bus connection: {}", e);
        }
        outcome
    }

    /// One wait cycle
    pub fn turn(&mut self) -> Result<LoopState> {
        if self.state == LoopState::Stopping {
            return Ok(LoopState::Stopping);
        }

        let interest = PollFlags::POLLIN | PollFlags::POLLPRI;
        let (hardware, shutdown) = {
            // SAFETY: the descriptor belongs to the reader's source, which
            // outlives this poll call.
            let hw_fd = unsafe { BorrowedFd::borrow_raw(self.reader.get_ref().as_raw_fd()) };
            let mut fds = [
                PollFd::new(hw_fd, interest),
                PollFd::new(self.shutdown.as_fd(), interest),
            ];

            match poll(&mut fds, PollTimeout::NONE) {
                Ok(0) => return Ok(self.state),
                Ok(_) => {}
                Err(Errno::EINTR) => {
                    tracing::trace!("Wait interrupted by signal");
                    return Ok(self.state);
                }
                Err(e) => {
                    let err = BridgeError::Wait {
                        reason: e.to_string(),
                    };
                    tracing::warn!("{}", err);
                    return Ok(self.state);
                }
            }

            (
                fds[0].revents().unwrap_or(PollFlags::empty()),
                fds[1].revents().unwrap_or(PollFlags::empty()),
            )
        };

        if shutdown.intersects(interest) {
            tracing::info!("Shutdown requested");
            self.publish(BridgeEvent::ShutdownRequested);
            self.state = LoopState::Stopping;
            return Ok(self.state);
        }

        let mut decoded = false;
        if hardware.intersects(interest) {
            decoded = self.service_hardware();
        }

        let closed = !decoded
            && (hardware.contains(PollFlags::POLLHUP) || self.reader.is_exhausted());
        if closed || hardware.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) {
            self.state = LoopState::Stopping;
            return Err(BridgeError::LinkLost {
                reason: format!("hardware descriptor reported {:?}", hardware),
            });
        }

        Ok(self.state)
    }

    /// Read and dispatch at most one frame; true if a frame was decoded
    fn service_hardware(&mut self) -> bool {
        match self.reader.read_frame() {
            Ok(Some(decoded)) => {
                tracing::debug!("Received {} from serial", decoded.frame);
                self.publish(BridgeEvent::FrameDecoded {
                    kind: decoded.frame.kind,
                    encoded_len: decoded.len(),
                });
                let outcome =
                    self.dispatcher
                        .dispatch(&decoded.frame, &*self.bus, Direction::SerialToBus);
                if let Err(e) = &outcome {
                    tracing::warn!("Failed to forward {}: {}", decoded.frame, e);
                }
                self.publish(outcome_event(&decoded.frame, Direction::SerialToBus, &outcome));
                true
            }
            Ok(None) => {
                tracing::trace!("No complete frame on serial");
                false
            }
            Err(e) => {
                tracing::warn!("Error reading frame from serial: {}", e);
                if let Some(reason) = DropReason::for_read_error(&e) {
                    self.publish(BridgeEvent::FrameDropped { reason });
                }
                false
            }
        }
    }

    fn publish(&self, event: BridgeEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
