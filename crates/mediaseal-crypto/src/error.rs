//! Error types for cipher and derivation operations

use thiserror::Error;

/// Errors from cipher primitives and key derivation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key length is not a valid AES-GCM key size (16 or 32 bytes)
    #[error("invalid AES-GCM key size: {size} bytes")]
    InvalidKey {
        /// The rejected key length
        size: usize,
    },

    /// Input is shorter than the authentication tag
    #[error("input too small for AES-GCM tag: {size} bytes")]
    TooSmall {
        /// The rejected input length
        size: usize,
    },

    /// Authentication tag mismatch (tampering or wrong key)
    #[error("AES-GCM authentication failed")]
    AuthFailed,

    /// The underlying cipher refused the operation
    #[error("AES-GCM operation failed")]
    OperationFailed,

    /// Key derivation was asked for an unsupported output length
    #[error("key derivation failed: unsupported output length {requested}")]
    DerivationFailed {
        /// The requested output length in bytes
        requested: usize,
    },
}
