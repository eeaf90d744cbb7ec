//! Robot message protocol for the ground-station bridge.
//!
//! Every message is one 64-bit word. Bits 0..5 always hold the
//! [`MessageType`]; the rest of the word is laid out per type.
//!
//! - [`message`]: typed records and the pure pack/unpack codec
//! - [`command`]: validation of host JSON commands into records
//! - [`report`]: JSON forms of device reports sent back to the host

pub mod bits;
pub mod command;
pub mod error;
pub mod message;
pub mod report;

pub use bits::BitField;
pub use command::HostCommand;
pub use error::{CodecError, CommandError, Result};
pub use message::{
    pack, unpack, Control, HealthReport, Message, MessageType, Pose, Query, StatusReport, System,
};
pub use report::Outbound;
