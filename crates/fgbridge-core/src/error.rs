//! Error handling for fgbridge
//!
//! Two layers of errors:
//! - Frame errors (decoding, encoding and writing a single frame)
//! - Bridge errors (initialization, event loop and shutdown plumbing)
//!
//! Frame errors are transient: the caller drops the frame and keeps going.
//! Bridge errors carry the failures that end the process or get logged by
//! the event loop.

use std::io;
use thiserror::Error;

/// Frame error type
///
/// Represents errors raised while moving a single frame across the wire.
/// None of these are fatal to the bridge.
#[derive(Error, Debug)]
pub enum FrameError {
    /// END marker was not where the header said it would be
    #[error("Malformed frame: {reason}")]
    MalformedFrame {
        /// What was wrong with the frame.
        reason: String,
    },

    /// Declared payload length exceeds the configured maximum
    #[error("Declared payload length {declared} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The length announced by the header.
        declared: usize,
        /// The configured maximum.
        max: usize,
    },

    /// The frame buffer could not be allocated
    #[error("Failed to allocate {size} bytes for frame buffer")]
    Allocation {
        /// Requested buffer size in bytes.
        size: usize,
    },

    /// The frame could not be serialized
    #[error("Failed to encode frame: {reason}")]
    Encode {
        /// The reason serialization failed.
        reason: String,
    },

    /// Only part of an encoded frame reached the sink
    #[error("Partial write: {written} of {expected} bytes")]
    PartialWrite {
        /// Bytes that made it to the sink.
        written: usize,
        /// Bytes the encoded frame holds.
        expected: usize,
    },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Create an encode error
    pub fn encode(reason: impl Into<String>) -> Self {
        FrameError::Encode {
            reason: reason.into(),
        }
    }

    /// Check if the caller should simply drop the frame and continue
    pub fn is_transient(&self) -> bool {
        !matches!(self, FrameError::Io(_))
    }
}

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Hardware link or bus client could not be brought up
    #[error("Failed to initialize {component}: {reason}")]
    Initialization {
        /// The component that failed ("serial", "bus", "signals").
        component: String,
        /// The reason initialization failed.
        reason: String,
    },

    /// Waiting on the descriptors failed for a reason other than a signal
    #[error("Descriptor wait failed: {reason}")]
    Wait {
        /// The reason the wait failed.
        reason: String,
    },

    /// The hardware descriptor hung up or reported an error
    #[error("Hardware link lost: {reason}")]
    LinkLost {
        /// What the descriptor reported.
        reason: String,
    },

    /// Signal handler installation or self-pipe setup failed
    #[error("Signal setup failed: {reason}")]
    Signal {
        /// The reason setup failed.
        reason: String,
    },

    /// Frame-level failure that escaped to the bridge
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BridgeError {
    /// Create an initialization error for a component
    pub fn init(component: impl Into<String>, reason: impl Into<String>) -> Self {
        BridgeError::Initialization {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error happened before the event loop started
    pub fn is_initialization(&self) -> bool {
        matches!(self, BridgeError::Initialization { .. } | BridgeError::Signal { .. })
    }
}

/// Result type for frame operations
pub type FrameResult<T> = std::result::Result<T, FrameError>;

/// Result type using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;
