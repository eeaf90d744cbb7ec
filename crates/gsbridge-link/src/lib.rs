//! Radio link management and the bridge loop.
//!
//! [`BridgeContext`] holds every piece of mutable bridge state (frame
//! parser, link state, queued commands) and is driven without any I/O.
//! [`Bridge`] owns the serial line and the IPC listener and feeds the
//! context from a single-threaded `tokio::select!` loop.

pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod handshake;

pub use bridge::{shutdown_signal, Bridge};
pub use config::{
    BridgeConfig, LinkConfig, DEFAULT_HOST_QUEUE_CAPACITY, DEFAULT_PENDING_CAPACITY, DEFAULT_TICK,
};
pub use context::{BridgeContext, LinkWrite};
pub use error::{LinkError, Result};
pub use handshake::{
    DeviceLinkState, HandshakeEvent, HandshakeKind, HandshakeOutcome, LinkHandshake, Step,
};
