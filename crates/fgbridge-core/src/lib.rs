//! # fgbridge Core
//!
//! Core types shared by the serial bridge:
//! - the [`Frame`] model and the START/HEADER/PAYLOAD/END wire codec
//! - the kind to route table used by the dispatcher
//! - error types for framing and bridge lifecycle
//! - an in-process diagnostic event bus

pub mod error;
pub mod event_bus;
pub mod frame;

pub use error::{BridgeError, FrameError, FrameResult, Result};

pub use frame::{
    codec::{self, decode_header, encode, encode_header, Header, END, HEADER_SIZE, START},
    kinds, Frame, Route, RouteTable, DEFAULT_MAX_PAYLOAD, MAX_DECLARED_LENGTH,
};

pub use event_bus::{
    BridgeEvent, BridgeStats, DropReason, EventBus, EventCategory, EventFilter, StatsSnapshot,
    SubscriptionId,
};
