//! Error types for envelope operations

use thiserror::Error;

/// Errors that can occur while packing or unpacking an envelope
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key is neither an AES-128 nor an AES-256 key
    #[error("Invalid key size: expected 16 or 32, got {actual}")]
    InvalidKeySize {
        /// Actual key size in bytes
        actual: usize,
    },

    /// Invalid IV size
    #[error("Invalid IV size: expected {expected}, got {actual}")]
    InvalidIvSize {
        /// Expected IV size in bytes
        expected: usize,
        /// Actual IV size in bytes
        actual: usize,
    },

    /// Key or IV was not valid hex
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(#[from] hex::FromHexError),

    /// Ciphertext length is not a whole number of cipher blocks
    #[error("Ciphertext length {len} is not a multiple of the block size")]
    Misaligned {
        /// Ciphertext length in bytes
        len: usize,
    },

    /// Trailing pad byte does not describe a valid pad
    #[error("Invalid padding: pad length {pad} for {len} bytes")]
    InvalidPadding {
        /// Pad length read from the trailing byte
        pad: usize,
        /// Decrypted length in bytes
        len: usize,
    },

    /// MessagePack encoding failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// MessagePack decoding failed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Bytes left over after the top-level value
    #[error("Decode error: {0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// Value kind that has no JSON counterpart
    #[error("Unsupported value: {0}")]
    Unsupported(&'static str),
}

/// Result type for envelope operations
pub type Result<T> = std::result::Result<T, CryptoError>;
