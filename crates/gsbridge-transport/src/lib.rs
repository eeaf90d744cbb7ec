//! Transports for the ground-station bridge.
//!
//! Two local endpoints are provided:
//! - a Unix domain socket listener for the host-side IPC peer
//! - a serial line to the radio module fronting the embedded controller
//!
//! This is the lowest layer of gsbridge. Framing and protocol logic live in
//! the crates above it.

pub mod error;
pub mod serial;
pub mod uds;

pub use error::{Result, TransportError};
pub use serial::{open_serial, SerialConfig, DEFAULT_BAUD_RATE, DEFAULT_SERIAL_DEVICE};
pub use uds::{UnixDomainSocket, DEFAULT_SOCKET_PATH};
