//! Key sets, PBKDF2 derivation, and the one-way ratchet step
//!
//! # Security Properties
//!
//! - Determinism: the same (material, salt) always derives the same key,
//!   so two endpoints holding the same material converge
//! - One-way ratchet: advancing the material does not reveal the previous
//!   material
//! - Hygiene: key sets zeroize material and derived key on drop

use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// PBKDF2 iteration count for the key-set derivation path.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Raw key material paired with its derived AES key.
///
/// Immutable after construction. The material is kept alongside the
/// derived key because the ratchet advances over the *material*, not the
/// derived key.
///
/// # Invariants
///
/// - `encryption_key.len()` is 16 or 32
pub struct KeySet {
    /// Raw input key bytes as supplied by the application
    pub material: Vec<u8>,
    /// AES key derived from the material via PBKDF2
    pub encryption_key: Vec<u8>,
}

impl Drop for KeySet {
    fn drop(&mut self) {
        self.material.zeroize();
        self.encryption_key.zeroize();
    }
}

/// Derive `out_len` bytes from `raw` with PBKDF2-HMAC-SHA256.
///
/// # Errors
///
/// Returns `DerivationFailed` if `out_len` is not a valid AES key length
/// (16 or 32 bytes) - the only lengths a [`KeySet`] admits.
pub fn pbkdf2_sha256(
    raw: &[u8],
    salt: &[u8],
    iterations: u32,
    out_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    if out_len != 16 && out_len != 32 {
        return Err(CryptoError::DerivationFailed { requested: out_len });
    }

    let mut out = vec![0u8; out_len];
    pbkdf2_hmac::<Sha256>(raw, salt, iterations, &mut out);
    Ok(out)
}

/// Derive a [`KeySet`] from raw material.
///
/// `bits` selects the AES key size (128 or 256). The ratchet path always
/// derives 128-bit keys; only an initial install may use 256.
///
/// # Errors
///
/// Returns `DerivationFailed` if `bits` is not 128 or 256.
pub fn derive_key_set(material: &[u8], salt: &[u8], bits: u32) -> Result<KeySet, CryptoError> {
    let encryption_key =
        pbkdf2_sha256(material, salt, PBKDF2_ITERATIONS, (bits / 8) as usize)?;
    Ok(KeySet { material: material.to_vec(), encryption_key })
}

/// Advance key material one ratchet step: HMAC-SHA256 keyed by the salt
/// over the current material.
///
/// Deterministic and one-way, so a sender and a receiver holding the same
/// material converge on the same next material without communicating.
pub fn ratchet_material(material: &[u8], salt: &[u8]) -> Vec<u8> {
    let Ok(mut mac) = HmacSha256::new_from_slice(salt) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(material);
    mac.finalize().into_bytes().to_vec()
}
