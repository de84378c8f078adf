//! Serial port link to the microcontroller
//!
//! Opens the hardware device as a native TTY and splits it into a read half
//! (owned by the event loop) and a write half (owned by the frame writer).
//!
//! The line is fixed at 8N1 without flow control. A read that hits the
//! configured timeout counts as the byte stream ending.

use fgbridge_core::{BridgeError, Result};
use serialport::TTYPort;
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyAMA0")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            vid: None,
            pid: None,
        }
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports a microcontroller could sit behind
///
/// Matches on-board UARTs (`/dev/ttyAMA*`, `/dev/ttyS*`, `/dev/serial*`)
/// and USB adapters (`/dev/ttyUSB*`, `/dev/ttyACM*`).
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        BridgeError::init("serial", format!("failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_mcu_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, get_port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => info.with_usb_ids(usb.vid, usb.pid),
                _ => info,
            }
        })
        .collect())
}

fn is_mcu_port(port_name: &str) -> bool {
    const PREFIXES: [&str; 5] = [
        "/dev/ttyAMA",
        "/dev/ttyS",
        "/dev/serial",
        "/dev/ttyUSB",
        "/dev/ttyACM",
    ];
    PREFIXES.iter().any(|prefix| port_name.starts_with(prefix))
}

fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// An open hardware link, split into halves
pub struct SerialLink {
    /// Device path the link was opened on
    pub device: String,
    /// Half polled and read by the event loop
    pub reader: TTYPort,
    /// Half written by the frame writer
    pub writer: TTYPort,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device", &self.device)
            .finish()
    }
}

/// Open the hardware device
///
/// Any failure here is an initialization error: the bridge cannot run
/// without its hardware link.
pub fn open_serial(device: &str, baud_rate: u32, read_timeout: Duration) -> Result<SerialLink> {
    if baud_rate == 0 {
        return Err(BridgeError::init("serial", "baud rate must be > 0"));
    }

    let reader = serialport::new(device, baud_rate)
        .timeout(read_timeout)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .open_native()
        .map_err(|e| {
            tracing::warn!("Failed to open serial port {}: {}", device, e);
            if let Ok(ports) = list_ports() {
                let names: Vec<&str> = ports.iter().map(|p| p.port_name.as_str()).collect();
                tracing::info!("Available serial ports: {:?}", names);
            }
            BridgeError::init("serial", format!("failed to open {}: {}", device, e))
        })?;

    let writer = reader.try_clone_native().map_err(|e| {
        BridgeError::init("serial", format!("failed to clone {}: {}", device, e))
    })?;

    tracing::info!("Opened {} at {} baud", device, baud_rate);

    Ok(SerialLink {
        device: device.to_string(),
        reader,
        writer,
    })
}
