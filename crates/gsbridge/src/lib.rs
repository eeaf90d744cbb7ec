//! Ground-station bridge between a local JSON IPC socket and a serial robot link.
//!
//! The host application talks length-prefixed JSON over a Unix domain
//! socket. The robot's embedded controller, behind a serial radio, talks
//! 64-bit bit-packed words in checksummed frames. gsbridge translates
//! between the two.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix socket listener and serial port setup
//! - [`frame`]: serial frame parser and IPC envelope codec
//! - [`protocol`]: message layouts, host command validation, report JSON
//! - [`link`]: radio handshake and the bridge loop

/// Re-export transport types.
pub mod transport {
    pub use gsbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gsbridge_frame::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use gsbridge_protocol::*;
}

/// Re-export bridge types.
pub mod link {
    pub use gsbridge_link::*;
}
