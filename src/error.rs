use thiserror::Error;

/// Errors surfaced at the public `Node` API boundary.
///
/// Everything recoverable at the frame level (inter-byte timeout,
/// standalone DLE, CRC mismatch on an unsolicited frame, ...) never
/// reaches this type; it is reported only through [`crate::diag::Diagnostic`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("channel is closed")]
    ChannelClosed,

    #[error("payload element out of range or unsupported")]
    InvalidPayload,

    #[error("composed frame exceeds the maximum on-wire size")]
    FrameOversize,

    #[error("write to channel failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("no response received within the configured timeout")]
    ResponseTimeout,
}

pub type Result<T> = std::result::Result<T, Error>;
