//! Mediaseal Cryptographic Primitives
//!
//! Cipher and key-derivation building blocks for mediaseal frame
//! encryption. Pure functions with deterministic outputs; no I/O and no
//! global state.
//!
//! # Key Lifecycle
//!
//! Raw key material (as exchanged by the application) is never used as an
//! encryption key directly. A per-slot [`KeySet`] pairs the raw material
//! with a PBKDF2-derived AES key, and a deterministic one-way ratchet step
//! lets a receiver that is behind catch up to a sender that has advanced
//! its key.
//!
//! ```text
//! Raw Key Material
//!        │
//!        ▼ PBKDF2-HMAC-SHA256 (ratchet salt, 100 000 iterations)
//! KeySet { material, encryption_key }
//!        │
//!        ▼ AES-128/256-GCM (per-frame IV, header as AAD)
//! Ciphertext ‖ Tag
//!
//! ratchet_material(material, salt) → next material (one-way, convergent)
//! ```
//!
//! # Security
//!
//! - Authenticity: AES-GCM binds the unencrypted frame header as AAD, so
//!   tampering with either region fails the tag check.
//! - Convergence: the ratchet step is a pure function of (material, salt),
//!   so sender and receiver advance to identical keys independently.
//! - Hygiene: key sets zeroize their material and derived key on drop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod derive;
pub mod error;

pub use aead::{aes_gcm_open, aes_gcm_seal, IV_SIZE, TAG_SIZE};
pub use derive::{derive_key_set, pbkdf2_sha256, ratchet_material, KeySet, PBKDF2_ITERATIONS};
pub use error::CryptoError;
