//! # fgbridge Communication
//!
//! Moves frames between a microcontroller on a serial line and the
//! coordinator's event bus.
//!
//! - [`communication`]: the two links (serial port, Unix socket bus client)
//! - [`bridge`]: frame reader/writer, dispatcher, shutdown signal and the
//!   event loop tying them together

pub mod bridge;
pub mod communication;

pub use bridge::{
    dispatcher::{outcome_event, Direction, Dispatch, EventDispatcher},
    event_loop::{EventLoop, LoopState},
    reader::{DecodedFrame, FrameReader},
    shutdown::{ShutdownSignal, TERMINATION_SIGNALS},
    writer::FrameWriter,
    FrameSink,
};

pub use communication::{
    bus_link::{BusClient, UnixBusClient},
    serial::{list_ports, open_serial, SerialLink, SerialPortInfo},
};
