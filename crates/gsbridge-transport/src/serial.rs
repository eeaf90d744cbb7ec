//! Serial line to the radio module.
//!
//! The radio presents a transparent serial link (SPP) to the embedded
//! controller once paired. The line always runs raw 8N1 with no flow
//! control; only the baud rate is configurable at build time.

use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};

use crate::error::{Result, TransportError};

pub use tokio_serial::{Error as SerialError, ErrorKind as SerialErrorKind};

/// Serial device used when neither the command line nor the environment names one.
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyPS2";

/// Line speed of the radio module.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Baud rate.
    pub baud_rate: u32,
    /// Discard bytes buffered by the driver before the bridge started.
    pub flush_input_on_open: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            flush_input_on_open: true,
        }
    }
}

/// Open and configure the serial device for non-blocking async I/O.
///
/// Must be called from within a Tokio runtime.
pub fn open_serial(path: &str, config: &SerialConfig) -> Result<SerialStream> {
    tracing::debug!(
        port = %path,
        baud_rate = config.baud_rate,
        "opening serial port"
    );

    let stream = tokio_serial::new(path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|source| TransportError::SerialOpen {
            path: path.to_string(),
            source,
        })?;

    if config.flush_input_on_open {
        if let Err(e) = stream.clear(ClearBuffer::Input) {
            tracing::warn!(port = %path, error = %e, "failed to flush stale serial input");
        }
    }

    tracing::info!(port = %path, baud_rate = config.baud_rate, "serial port opened");
    Ok(stream)
}
