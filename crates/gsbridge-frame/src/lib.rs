//! Framing for both sides of the ground-station bridge.
//!
//! Serial side: each 64-bit message word travels in a fixed 12-byte frame
//! - a 2-byte preamble (`0xAA 0x55`) for stream synchronization
//! - a 1-byte payload length, always 8
//! - the word in big-endian order
//! - an XOR checksum over the payload bytes
//!
//! IPC side: each JSON message travels in an envelope with a 4-byte
//! big-endian length prefix.

pub mod envelope;
pub mod error;
pub mod reader;
pub mod serial;
pub mod writer;

pub use envelope::{
    decode_envelope, encode_envelope, EnvelopeCodec, LENGTH_PREFIX_SIZE, MAX_ENVELOPE_LEN,
};
pub use error::{FrameError, Result};
pub use reader::EnvelopeReader;
pub use serial::{
    checksum, encode_bit_string, encode_frame, frame_bytes, FrameParser, ParserPhase,
    ParserStats, TxEncoding, FRAME_SIZE, PAYLOAD_LEN, PREAMBLE,
};
pub use writer::EnvelopeWriter;
