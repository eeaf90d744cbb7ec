use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::envelope::{decode_envelope, MAX_ENVELOPE_LEN};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete envelopes from any blocking `Read` stream.
///
/// Handles partial reads internally; callers always get complete bodies.
pub struct EnvelopeReader<T> {
    inner: T,
    buf: BytesMut,
    max_len: usize,
}

impl<T: Read> EnvelopeReader<T> {
    /// Create a reader with the default 1 MiB cap.
    pub fn new(inner: T) -> Self {
        Self::with_max_len(inner, MAX_ENVELOPE_LEN)
    }

    /// Create a reader with an explicit cap on body length.
    pub fn with_max_len(inner: T, max_len: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_len,
        }
    }

    /// Read the next complete envelope body (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_envelope(&mut self) -> Result<Bytes> {
        loop {
            if let Some(body) = decode_envelope(&mut self.buf, self.max_len)? {
                return Ok(body);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
