/// Errors that stop the bridge loop.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gsbridge_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] gsbridge_frame::FrameError),

    /// The serial line reported end of stream.
    #[error("serial line closed")]
    SerialClosed,
}

pub type Result<T> = std::result::Result<T, LinkError>;
