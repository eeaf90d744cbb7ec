use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};

/// Envelope header: a 4-byte big-endian body length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Hard cap on a declared body length: 1 MiB.
pub const MAX_ENVELOPE_LEN: usize = 1024 * 1024;

/// Encode one message body into the envelope wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────┐
/// │ Length (4B)  │ Body                 │
/// │ big-endian   │ (Length bytes JSON)  │
/// └──────────────┴──────────────────────┘
/// ```
pub fn encode_envelope(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.is_empty() {
        return Err(FrameError::EmptyEnvelope);
    }
    if body.len() > u32::MAX as usize {
        return Err(FrameError::EnvelopeTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(LENGTH_PREFIX_SIZE + body.len());
    dst.put_u32(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Decode one envelope body from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete envelope yet.
/// The declared length is checked as soon as the prefix is available, so an
/// illegal length is reported without waiting for the body.
pub fn decode_envelope(src: &mut BytesMut, max_len: usize) -> Result<Option<Bytes>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
    let body_len = u32::from_be_bytes(prefix) as usize;

    if body_len == 0 {
        return Err(FrameError::EmptyEnvelope);
    }
    if body_len > max_len {
        return Err(FrameError::EnvelopeTooLarge {
            size: body_len,
            max: max_len,
        });
    }

    let total = LENGTH_PREFIX_SIZE + body_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(src.split_to(body_len).freeze()))
}

/// `tokio_util` codec for IPC envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_len: usize,
}

impl EnvelopeCodec {
    /// Codec with the default 1 MiB cap.
    pub fn new() -> Self {
        Self::with_max_len(MAX_ENVELOPE_LEN)
    }

    /// Codec with an explicit cap on body length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Configured cap on body length.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        decode_envelope(src, self.max_len)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(body) => Ok(Some(body)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Bytes> for EnvelopeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        Encoder::<&[u8]>::encode(self, &item[..], dst)
    }
}

impl Encoder<&[u8]> for EnvelopeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_len {
            return Err(FrameError::EnvelopeTooLarge {
                size: item.len(),
                max: self.max_len,
            });
        }
        encode_envelope(item, dst)
    }
}
