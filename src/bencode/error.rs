use thiserror::Error;

/// Errors produced while encoding or decoding bencode.
#[derive(Debug, Error)]
pub enum BencodeError {
    /// Input ended before the value was complete.
    #[error("truncated input")]
    Truncated,

    /// Integer literal is empty, zero-padded, or out of range.
    #[error("invalid integer: {0}")]
    BadInteger(String),

    /// Byte-string length prefix is not a number.
    #[error("invalid length prefix")]
    BadLength,

    /// A byte that cannot start a value.
    #[error("unexpected byte {0:#04x}")]
    UnexpectedByte(u8),

    /// A dictionary key that is not a byte string.
    #[error("dictionary key is not a byte string")]
    NonStringKey,

    /// More input after a complete value.
    #[error("trailing data after value")]
    TrailingData,

    /// Nesting past the recursion limit.
    #[error("nesting too deep")]
    TooDeep,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
