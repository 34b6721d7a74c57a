//! Participant keyrings and the key provider contract.
//!
//! A [`KeyProvider`] hands out one [`ParticipantKeyHandler`] per
//! participant (or a single shared handler in shared-key mode). Handlers
//! own an indexed keyring of derived key sets and the ratchet/validity
//! state the cryptor's recovery path drives.
//!
//! Handlers are shared across transformers and internally synchronized;
//! callers never see their locks.

pub mod handler;
pub mod provider;

pub use handler::ParticipantKeyHandler;
pub use provider::{KeyProvider, KeyProviderOptions};
