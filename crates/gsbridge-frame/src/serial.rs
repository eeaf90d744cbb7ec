use bytes::{BufMut, BytesMut};

/// Frame preamble: `0xAA 0x55`.
pub const PREAMBLE: [u8; 2] = [0xAA, 0x55];

/// The only accepted payload length: one 64-bit word.
pub const PAYLOAD_LEN: u8 = 8;

/// Total wire size: preamble (2) + length (1) + payload (8) + checksum (1).
pub const FRAME_SIZE: usize = 12;

/// Bit-string encoding: 64 ASCII digits followed by a carriage return.
const BIT_STRING_SIZE: usize = 65;

/// XOR of all bytes in `payload`.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a word into the serial frame format.
///
/// Wire format:
/// ```text
/// ┌───────────┬────────┬──────────────────┬──────────┐
/// │ Preamble  │ Length │ Payload          │ Checksum │
/// │ 0xAA 0x55 │ 0x08   │ (8B big-endian)  │ XOR (1B) │
/// └───────────┴────────┴──────────────────┴──────────┘
/// ```
pub fn encode_frame(word: u64, dst: &mut BytesMut) {
    dst.put_slice(&frame_bytes(word));
}

/// The serial frame for `word` as a fixed-size array.
pub fn frame_bytes(word: u64) -> [u8; FRAME_SIZE] {
    let payload = word.to_be_bytes();
    let mut frame = [0u8; FRAME_SIZE];
    frame[..2].copy_from_slice(&PREAMBLE);
    frame[2] = PAYLOAD_LEN;
    frame[3..11].copy_from_slice(&payload);
    frame[11] = checksum(&payload);
    frame
}

/// Encode a word as 64 ASCII `'0'`/`'1'` characters, MSB first, then `\r`.
pub fn encode_bit_string(word: u64, dst: &mut BytesMut) {
    dst.reserve(BIT_STRING_SIZE);
    for bit in (0..64).rev() {
        dst.put_u8(if (word >> bit) & 1 == 1 { b'1' } else { b'0' });
    }
    dst.put_u8(b'\r');
}

/// How outbound words are put on the serial line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TxEncoding {
    /// Binary frame with preamble, length and checksum.
    #[default]
    Frame,
    /// ASCII bit string terminated by a carriage return.
    BitString,
}

impl TxEncoding {
    /// Append the encoding of `word` to `dst`.
    pub fn encode(self, word: u64, dst: &mut BytesMut) {
        match self {
            Self::Frame => encode_frame(word, dst),
            Self::BitString => encode_bit_string(word, dst),
        }
    }

    /// Number of bytes one word occupies on the wire.
    pub fn wire_size(self) -> usize {
        match self {
            Self::Frame => FRAME_SIZE,
            Self::BitString => BIT_STRING_SIZE,
        }
    }
}

/// Where the parser is within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserPhase {
    AwaitSync0,
    AwaitSync1,
    ReadLength,
    ReadPayload,
    ReadChecksum,
}

/// Running counters kept by a [`FrameParser`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames that passed the checksum and were emitted.
    pub frames: u64,
    /// Frames dropped on checksum mismatch.
    pub checksum_errors: u64,
    /// Frame attempts abandoned on a length byte other than 8.
    pub length_errors: u64,
    /// Bytes skipped while hunting for the preamble.
    pub discarded_bytes: u64,
}

/// Byte-at-a-time state machine that recovers 64-bit words from the serial
/// stream.
///
/// Any byte sequence is accepted. Noise, truncated frames, bad length bytes
/// and checksum mismatches never produce output; the parser simply goes back
/// to hunting for the preamble.
#[derive(Debug, Clone)]
pub struct FrameParser {
    phase: ParserPhase,
    payload: [u8; PAYLOAD_LEN as usize],
    filled: usize,
    stats: ParserStats,
}

impl FrameParser {
    /// Create a parser waiting for the first preamble byte.
    pub fn new() -> Self {
        Self {
            phase: ParserPhase::AwaitSync0,
            payload: [0; PAYLOAD_LEN as usize],
            filled: 0,
            stats: ParserStats::default(),
        }
    }

    /// Consume one byte. Returns a word when this byte completes a valid frame.
    pub fn feed(&mut self, byte: u8) -> Option<u64> {
        match self.phase {
            ParserPhase::AwaitSync0 => {
                if byte == PREAMBLE[0] {
                    self.phase = ParserPhase::AwaitSync1;
                } else {
                    self.stats.discarded_bytes += 1;
                }
            }
            ParserPhase::AwaitSync1 => {
                if byte == PREAMBLE[1] {
                    self.phase = ParserPhase::ReadLength;
                } else if byte == PREAMBLE[0] {
                    // The newer 0xAA may be the real start of a frame.
                    self.stats.discarded_bytes += 1;
                } else {
                    self.stats.discarded_bytes += 2;
                    self.phase = ParserPhase::AwaitSync0;
                }
            }
            ParserPhase::ReadLength => {
                if byte == PAYLOAD_LEN {
                    self.filled = 0;
                    self.phase = ParserPhase::ReadPayload;
                } else {
                    tracing::trace!(length = byte, "rejecting frame with bad length");
                    self.stats.length_errors += 1;
                    self.phase = if byte == PREAMBLE[0] {
                        ParserPhase::AwaitSync1
                    } else {
                        ParserPhase::AwaitSync0
                    };
                }
            }
            ParserPhase::ReadPayload => {
                self.payload[self.filled] = byte;
                self.filled += 1;
                if self.filled == self.payload.len() {
                    self.phase = ParserPhase::ReadChecksum;
                }
            }
            ParserPhase::ReadChecksum => {
                self.phase = ParserPhase::AwaitSync0;
                self.filled = 0;
                let expected = checksum(&self.payload);
                if byte != expected {
                    tracing::debug!(expected, got = byte, "dropping frame with bad checksum");
                    self.stats.checksum_errors += 1;
                    return None;
                }
                self.stats.frames += 1;
                return Some(u64::from_be_bytes(self.payload));
            }
        }
        None
    }

    /// Consume a run of bytes, returning every word completed along the way.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Vec<u64> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }

    /// Current phase.
    pub fn phase(&self) -> ParserPhase {
        self.phase
    }

    /// Counters accumulated since creation.
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Abandon any partial frame and return to hunting for the preamble.
    pub fn reset(&mut self) {
        self.phase = ParserPhase::AwaitSync0;
        self.filled = 0;
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
