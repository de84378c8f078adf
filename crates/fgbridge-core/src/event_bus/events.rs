//! Event type definitions for the diagnostic bus.
//!
//! Events describe what happened to frames moving through the bridge and
//! to the bridge itself. They are cloneable and serializable so they can be
//! logged or replayed.

use crate::error::FrameError;
use serde::{Deserialize, Serialize};

/// Why a frame was discarded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Header announced more payload than allowed
    PayloadTooLarge,
    /// Frame buffer could not be allocated
    Allocation,
    /// Writing to the serial sink failed
    WriteFailed(String),
    /// Sending to the bus collaborator failed
    SendFailed(String),
}

impl DropReason {
    /// Reason for a frame the reader rejected
    ///
    /// `None` for errors that are not about a single frame.
    pub fn for_read_error(err: &FrameError) -> Option<Self> {
        match err {
            FrameError::PayloadTooLarge { .. } => Some(DropReason::PayloadTooLarge),
            FrameError::Allocation { .. } => Some(DropReason::Allocation),
            _ => None,
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::PayloadTooLarge => write!(f, "payload too large"),
            DropReason::Allocation => write!(f, "allocation failure"),
            DropReason::WriteFailed(e) => write!(f, "serial write failed: {}", e),
            DropReason::SendFailed(e) => write!(f, "bus send failed: {}", e),
        }
    }
}

/// Root event enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeEvent {
    /// Bridge entered its event loop.
    Started {
        /// Hardware device path.
        device: String,
    },
    /// A complete frame was decoded from serial.
    FrameDecoded {
        /// Event kind.
        kind: u16,
        /// Encoded length in bytes.
        encoded_len: usize,
    },
    /// A frame was handed to the bus collaborator.
    FrameForwarded {
        /// Event kind.
        kind: u16,
        /// Bytes sent.
        bytes: usize,
    },
    /// A frame from the bus was written to serial.
    FrameTransmitted {
        /// Event kind.
        kind: u16,
        /// Bytes written.
        bytes: usize,
    },
    /// A control frame was swallowed by the dispatcher.
    FrameConsumed {
        /// Event kind.
        kind: u16,
    },
    /// A frame was discarded.
    FrameDropped {
        /// Why it was discarded.
        reason: DropReason,
    },
    /// Shutdown descriptor became readable.
    ShutdownRequested,
    /// Event loop exited.
    Stopped {
        /// Whether the loop ended through a shutdown request.
        graceful: bool,
    },
}

impl BridgeEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            BridgeEvent::FrameDecoded { .. }
            | BridgeEvent::FrameTransmitted { .. }
            | BridgeEvent::FrameDropped { .. } => EventCategory::Serial,
            BridgeEvent::FrameForwarded { .. } | BridgeEvent::FrameConsumed { .. } => {
                EventCategory::Bus
            }
            BridgeEvent::Started { .. }
            | BridgeEvent::ShutdownRequested
            | BridgeEvent::Stopped { .. } => EventCategory::Lifecycle,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            BridgeEvent::Started { device } => format!("Bridge started on {}", device),
            BridgeEvent::FrameDecoded { kind, encoded_len } => {
                format!("Decoded kind {} ({} bytes)", kind, encoded_len)
            }
            BridgeEvent::FrameForwarded { kind, bytes } => {
                format!("Forwarded kind {} to bus ({} bytes)", kind, bytes)
            }
            BridgeEvent::FrameTransmitted { kind, bytes } => {
                format!("Transmitted kind {} to serial ({} bytes)", kind, bytes)
            }
            BridgeEvent::FrameConsumed { kind } => format!("Consumed control kind {}", kind),
            BridgeEvent::FrameDropped { reason } => format!("Dropped frame: {}", reason),
            BridgeEvent::ShutdownRequested => "Shutdown requested".to_string(),
            BridgeEvent::Stopped { graceful } => {
                if *graceful {
                    "Bridge stopped".to_string()
                } else {
                    "Bridge stopped on error".to_string()
                }
            }
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Traffic on the hardware link.
    Serial,
    /// Traffic toward the bus collaborator.
    Bus,
    /// Start and stop of the bridge.
    Lifecycle,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Serial => write!(f, "Serial"),
            EventCategory::Bus => write!(f, "Bus"),
            EventCategory::Lifecycle => write!(f, "Lifecycle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            BridgeEvent::FrameDecoded {
                kind: 1,
                encoded_len: 6
            }
            .category(),
            EventCategory::Serial
        );
        assert_eq!(
            BridgeEvent::FrameConsumed { kind: 0 }.category(),
            EventCategory::Bus
        );
        assert_eq!(
            BridgeEvent::ShutdownRequested.category(),
            EventCategory::Lifecycle
        );
    }

    #[test]
    fn test_drop_reason_for_read_error() {
        let err = FrameError::PayloadTooLarge {
            declared: 65535,
            max: 1024,
        };
        assert_eq!(
            DropReason::for_read_error(&err),
            Some(DropReason::PayloadTooLarge)
        );
        assert_eq!(
            DropReason::for_read_error(&FrameError::Allocation { size: 9 }),
            Some(DropReason::Allocation)
        );
        let io = FrameError::Io(std::io::Error::new(std::io::ErrorKind::Other, "gone"));
        assert_eq!(DropReason::for_read_error(&io), None);
    }

    #[test]
    fn test_descriptions() {
        let event = BridgeEvent::FrameDropped {
            reason: DropReason::PayloadTooLarge,
        };
        assert_eq!(event.description(), "Dropped frame: payload too large");
        assert_eq!(
            BridgeEvent::Stopped { graceful: true }.description(),
            "Bridge stopped"
        );
    }
}
