//! Frame model and routing
//!
//! A [`Frame`] is one protocol message exchanged with the microcontroller:
//! an event kind plus an opaque payload. The wire representation lives in
//! [`codec`].

pub mod codec;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payload bound applied when no configuration overrides it
pub const DEFAULT_MAX_PAYLOAD: usize = 1024;

/// Largest length the header can carry
pub const MAX_DECLARED_LENGTH: usize = u16::MAX as usize;

/// Well-known event kinds
pub mod kinds {
    /// Liveness ping
    pub const ALIVE: u16 = 0x0000;
    /// Acknowledgment of a previous event
    pub const CONFIRMED: u16 = 0x0001;
}

/// One decoded protocol message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Event kind identifier
    pub kind: u16,
    /// Payload bytes, exactly the declared length
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame
    pub fn new(kind: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Create a frame with no payload
    pub fn empty(kind: u16) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Length written into the header
    pub fn declared_length(&self) -> usize {
        self.payload.len()
    }

    /// Size of this frame on the wire
    pub fn encoded_len(&self) -> usize {
        codec::encoded_len(self.payload.len())
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame(kind={}, len={})", self.kind, self.payload.len())
    }
}

/// What the dispatcher does with a frame of a given kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Swallow the frame silently
    Consume,
    /// Pass the frame on to the other side of the bridge
    Forward,
}

/// Kind to route lookup
///
/// Kinds without an entry take the fallback route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<u16, Route>,
    fallback: Route,
}

impl RouteTable {
    /// Create an empty table with the given fallback
    pub fn new(fallback: Route) -> Self {
        Self {
            routes: HashMap::new(),
            fallback,
        }
    }

    /// Set the route for a kind
    pub fn with_route(mut self, kind: u16, route: Route) -> Self {
        self.routes.insert(kind, route);
        self
    }

    /// Look up the route for a kind
    pub fn route(&self, kind: u16) -> Route {
        self.routes.get(&kind).copied().unwrap_or(self.fallback)
    }

    /// Route taken by kinds with no explicit entry
    pub fn fallback(&self) -> Route {
        self.fallback
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        codec::route_table()
    }
}
