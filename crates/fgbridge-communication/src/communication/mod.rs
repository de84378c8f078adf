//! Links on either side of the bridge
//!
//! - [`serial`]: the hardware device
//! - [`bus_link`]: the coordinator's event bus

pub mod bus_link;
pub mod serial;
