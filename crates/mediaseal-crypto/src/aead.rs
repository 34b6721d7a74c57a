//! AES-GCM seal/open with frame-header AAD
//!
//! AES-GCM provides:
//! - 128- or 256-bit key security (selected by key length)
//! - 96-bit IVs supplied by the caller (per-frame unique)
//! - Authenticated encryption with associated data (AEAD)
//!
//! The tag length is fixed at 16 bytes; the unencrypted frame header is
//! bound as AAD so that prefix tampering fails authentication.

use aes_gcm::{
    aead::{Aead, Payload},
    Aes128Gcm, Aes256Gcm, KeyInit, Nonce,
};

use crate::error::CryptoError;

/// GCM tag size (16 bytes, regardless of the message or key size)
pub const TAG_SIZE: usize = 16;

/// IV size for AES-GCM (12 bytes)
pub const IV_SIZE: usize = 12;

/// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
///
/// Returns `ciphertext ‖ tag` where the tag is the trailing
/// [`TAG_SIZE`] bytes.
///
/// # Errors
///
/// - `InvalidKey` if the key is not 16 or 32 bytes
/// - `OperationFailed` if the underlying cipher refuses the operation
pub fn aes_gcm_seal(
    key: &[u8],
    iv: &[u8; IV_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let payload = Payload { msg: plaintext, aad };
    match key.len() {
        16 => {
            let Ok(cipher) = Aes128Gcm::new_from_slice(key) else {
                unreachable!("key length checked above");
            };
            cipher.encrypt(Nonce::from_slice(iv), payload).map_err(|_| CryptoError::OperationFailed)
        },
        32 => {
            let Ok(cipher) = Aes256Gcm::new_from_slice(key) else {
                unreachable!("key length checked above");
            };
            cipher.encrypt(Nonce::from_slice(iv), payload).map_err(|_| CryptoError::OperationFailed)
        },
        size => Err(CryptoError::InvalidKey { size }),
    }
}

/// Decrypt `ciphertext_with_tag` (as produced by [`aes_gcm_seal`]),
/// verifying `aad` against the tag.
///
/// # Errors
///
/// - `TooSmall` if the input is shorter than the 16-byte tag
/// - `InvalidKey` if the key is not 16 or 32 bytes
/// - `AuthFailed` on tag mismatch (tampering or wrong key)
pub fn aes_gcm_open(
    key: &[u8],
    iv: &[u8; IV_SIZE],
    aad: &[u8],
    ciphertext_with_tag: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext_with_tag.len() < TAG_SIZE {
        return Err(CryptoError::TooSmall { size: ciphertext_with_tag.len() });
    }

    let payload = Payload { msg: ciphertext_with_tag, aad };
    match key.len() {
        16 => {
            let Ok(cipher) = Aes128Gcm::new_from_slice(key) else {
                unreachable!("key length checked above");
            };
            cipher.decrypt(Nonce::from_slice(iv), payload).map_err(|_| CryptoError::AuthFailed)
        },
        32 => {
            let Ok(cipher) = Aes256Gcm::new_from_slice(key) else {
                unreachable!("key length checked above");
            };
            cipher.decrypt(Nonce::from_slice(iv), payload).map_err(|_| CryptoError::AuthFailed)
        },
        size => Err(CryptoError::InvalidKey { size }),
    }
}
