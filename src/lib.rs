//! # fgbridge
//!
//! Bridges a microcontroller on a serial line with the coordinator's event
//! bus. Frames read from serial are forwarded to the bus; frames arriving
//! from the bus are written back to serial. Keep-alive and confirmation
//! frames are consumed in both directions.
//!
//! ## Architecture
//!
//! 1. **fgbridge-core** - Frame model, wire codec, errors, diagnostic events
//! 2. **fgbridge-communication** - Serial port, bus client, framing I/O,
//!    shutdown signal and the event loop
//! 3. **fgbridge-settings** - Configuration files and validation
//! 4. **fgbridge** - This binary, which wires them together

use fgbridge_communication::{
    open_serial, outcome_event, Direction, EventDispatcher, EventLoop, FrameReader, FrameWriter,
    ShutdownSignal, UnixBusClient, TERMINATION_SIGNALS,
};
use fgbridge_core::{
    BridgeEvent, BridgeStats, DropReason, EventBus, Frame, FrameResult, Result,
};
use fgbridge_settings::BridgeConfig;
use std::io::Write;
use std::sync::Arc;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build timestamp set by the build script
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging to stderr
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))?;

    Ok(())
}

/// Run the bridge until shutdown
///
/// Returns `Ok` after a graceful stop. Failures while acquiring the
/// signal handlers, the serial device or the bus connection are
/// initialization errors; losing the serial link afterwards is reported as
/// such.
pub fn run(config: &BridgeConfig) -> Result<()> {
    let mut shutdown = ShutdownSignal::new()?;
    shutdown.install(&TERMINATION_SIGNALS)?;

    let link = open_serial(
        &config.serial.device,
        config.serial.baud_rate,
        config.serial.read_timeout(),
    )?;
    let serial_out = FrameWriter::new(link.writer);

    let events = Arc::new(EventBus::new());
    let (stats, _subscription) = BridgeStats::attach(&events);
    let dispatcher = EventDispatcher::default();

    let max_payload = config.protocol.max_payload;
    let mut bus = {
        let dispatcher = dispatcher.clone();
        let events = events.clone();
        UnixBusClient::connect(&config.bus.socket_path, max_payload, move |delivery| {
            deliver_to_serial(&dispatcher, &serial_out, &events, delivery)
        })?
    };

    events.publish(BridgeEvent::Started {
        device: config.serial.device.clone(),
    });
    tracing::info!(
        "Bridging {} <-> {}",
        config.serial.device,
        config.bus.socket_path.display()
    );

    let outcome = EventLoop::new(
        FrameReader::new(link.reader, max_payload),
        &shutdown,
        dispatcher,
        &mut bus,
    )
    .with_events(events.clone())
    .run();

    tracing::info!("Frame totals: {}", stats.snapshot());
    outcome
}

/// Handle one delivery from the bus reader thread
fn deliver_to_serial<W: Write + Send>(
    dispatcher: &EventDispatcher,
    serial: &FrameWriter<W>,
    events: &EventBus,
    delivery: FrameResult<Frame>,
) {
    match delivery {
        Ok(frame) => {
            let outcome = dispatcher.dispatch(&frame, serial, Direction::BusToSerial);
            if let Err(e) = &outcome {
                tracing::warn!("Failed to write {} to serial: {}", frame, e);
            }
            events.publish(outcome_event(&frame, Direction::BusToSerial, &outcome));
        }
        Err(e) => {
            if let Some(reason) = DropReason::for_read_error(&e) {
                events.publish(BridgeEvent::FrameDropped { reason });
            }
        }
    }
}
