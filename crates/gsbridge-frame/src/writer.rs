use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::envelope::{encode_envelope, MAX_ENVELOPE_LEN};
use crate::error::{FrameError, Result};

/// Writes complete envelopes to any blocking `Write` stream.
///
/// Each envelope is encoded into one buffer and written as a single logical
/// write, so a prefix never goes out without its body.
pub struct EnvelopeWriter<T> {
    inner: T,
    buf: BytesMut,
    max_len: usize,
}

impl<T: Write> EnvelopeWriter<T> {
    /// Create a writer with the default 1 MiB cap.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            max_len: MAX_ENVELOPE_LEN,
        }
    }

    /// Encode and send one message body.
    pub fn send(&mut self, body: &[u8]) -> Result<()> {
        if body.len() > self.max_len {
            return Err(FrameError::EnvelopeTooLarge {
                size: body.len(),
                max: self.max_len,
            });
        }

        self.buf.clear();
        encode_envelope(body, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.inner.flush().map_err(FrameError::Io)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
