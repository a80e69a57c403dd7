use thiserror::Error;

/// Errors raised while encoding, decoding, or framing messages.
///
/// Every variant except `Io` indicates a protocol violation and is fatal
/// to the channel it occurred on.
#[derive(Debug, Error)]
pub enum WireError {
    /// Structural decode failure (bad discriminant payload, invalid name).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An unrecognized discriminant byte (action, option tag, code).
    #[error("unknown tag byte: {0:#04x}")]
    UnknownTag(u8),

    /// The input ended before the payload was complete.
    #[error("short read: input ended mid-message")]
    ShortRead,

    /// The payload decoded but bytes were left over.
    #[error("trailing bytes after payload: {0} left")]
    TrailingBytes(usize),

    /// A frame declared a length above the channel's limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A string field was not valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    /// I/O error from the underlying channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for wire operations.
pub type WireResult<T> = Result<T, WireError>;
