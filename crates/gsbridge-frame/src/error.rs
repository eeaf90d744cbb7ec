/// Errors that can occur while framing IPC envelopes.
///
/// Serial frame corruption is not an error: the parser drops the frame and
/// resynchronizes on its own.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The envelope declared a zero-length body.
    #[error("envelope declared zero-length body")]
    EmptyEnvelope,

    /// The envelope body exceeds the configured maximum size.
    #[error("envelope too large ({size} bytes, max {max})")]
    EnvelopeTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing envelopes.
    #[error("envelope I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete envelope was received.
    #[error("connection closed (incomplete envelope)")]
    ConnectionClosed,
}

impl FrameError {
    /// True when the peer violated the length-prefix contract.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::EmptyEnvelope | Self::EnvelopeTooLarge { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
