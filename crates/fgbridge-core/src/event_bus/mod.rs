//! # Event Bus Module
//!
//! Diagnostic publish/subscribe for the bridge. The event loop and the
//! dispatch path publish [`BridgeEvent`]s; observers such as
//! [`BridgeStats`] subscribe with a filter.
//!
//! ## Usage
//!
//! ```rust
//! use fgbridge_core::event_bus::{BridgeEvent, EventBus, EventCategory, EventFilter};
//!
//! let bus = EventBus::new();
//! let id = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Lifecycle]),
//!     |event| println!("{}", event.description()),
//! );
//!
//! bus.publish(BridgeEvent::ShutdownRequested);
//! bus.unsubscribe(id);
//! ```

mod bus;
mod events;
mod stats;

pub use bus::*;
pub use events::*;
pub use stats::*;
