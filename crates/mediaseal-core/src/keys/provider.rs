//! Key provider: options bag and keyed handler lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::handler::ParticipantKeyHandler;

/// Default ratchet window: how many ratchet steps the receiver tries
/// before giving up on a failed frame.
pub const DEFAULT_RATCHET_WINDOW_SIZE: u32 = 16;

/// Default number of keyring slots per participant.
pub const DEFAULT_KEY_RING_SIZE: u8 = 16;

/// Fixed handler id used in shared-key mode.
const SHARED_HANDLER_ID: &str = "shared";

/// Configuration consumed by the cryptor and its key handlers.
#[derive(Debug, Clone)]
pub struct KeyProviderOptions {
    /// All participants share one handler instead of keeping one each.
    pub shared_key: bool,
    /// Salt for PBKDF2 derivation and the ratchet step. Both endpoints
    /// must agree on it.
    pub ratchet_salt: Vec<u8>,
    /// Maximum ratchet steps tried when a frame fails to decrypt. Zero
    /// disables ratchet recovery.
    pub ratchet_window_size: u32,
    /// Trailing marker identifying intentionally unencrypted frames.
    /// Empty disables the passthrough check.
    pub uncrypted_magic_bytes: Vec<u8>,
    /// Keyring slots per participant.
    pub key_ring_size: u8,
    /// Drop frames instead of passing them through while the cryptor is
    /// disabled or has no payload to work on.
    pub discard_frame_when_cryptor_not_ready: bool,
}

impl Default for KeyProviderOptions {
    fn default() -> Self {
        Self {
            shared_key: false,
            ratchet_salt: Vec::new(),
            ratchet_window_size: DEFAULT_RATCHET_WINDOW_SIZE,
            uncrypted_magic_bytes: Vec::new(),
            key_ring_size: DEFAULT_KEY_RING_SIZE,
            discard_frame_when_cryptor_not_ready: false,
        }
    }
}

/// Hands out per-participant key handlers (or one shared handler).
///
/// Shared across every transformer in a session. Internally
/// synchronized; handler lookups return `Arc`s that stay valid after the
/// provider's lock is released.
pub struct KeyProvider {
    options: KeyProviderOptions,
    handlers: Mutex<HashMap<String, Arc<ParticipantKeyHandler>>>,
}

impl KeyProvider {
    /// Create a provider with the given options.
    #[must_use]
    pub fn new(options: KeyProviderOptions) -> Self {
        Self { options, handlers: Mutex::new(HashMap::new()) }
    }

    /// The options this provider and its handlers operate under.
    pub fn options(&self) -> &KeyProviderOptions {
        &self.options
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ParticipantKeyHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handler_or_insert(&self, id: &str) -> Arc<ParticipantKeyHandler> {
        let mut handlers = self.lock();
        Arc::clone(
            handlers
                .entry(id.to_owned())
                .or_insert_with(|| Arc::new(ParticipantKeyHandler::new(self.options.clone()))),
        )
    }

    /// Handler for a participant. `None` until a key has been installed
    /// for them.
    pub fn get_key(&self, participant_id: &str) -> Option<Arc<ParticipantKeyHandler>> {
        self.lock().get(participant_id).cloned()
    }

    /// The shared handler, regardless of participant. `None` unless the
    /// provider runs in shared-key mode.
    pub fn get_shared_key(&self, participant_id: &str) -> Option<Arc<ParticipantKeyHandler>> {
        if !self.options.shared_key {
            tracing::warn!(participant_id, "shared key requested from per-participant provider");
            return None;
        }
        Some(self.handler_or_insert(SHARED_HANDLER_ID))
    }

    /// Install key material for a participant, creating their handler on
    /// first use.
    pub fn set_key(&self, participant_id: &str, index: u8, material: &[u8]) -> bool {
        self.handler_or_insert(participant_id).set_key(material, index)
    }

    /// Ratchet a participant's key at `index`, returning the new
    /// material.
    pub fn ratchet_key(&self, participant_id: &str, index: u8) -> Option<Vec<u8>> {
        self.get_key(participant_id)?.ratchet_key(index)
    }

    /// Current material for a participant at `index`.
    pub fn export_key(&self, participant_id: &str, index: u8) -> Option<Vec<u8>> {
        self.get_key(participant_id)?.export_key(index)
    }

    /// Install shared key material at `index`.
    pub fn set_shared_key(&self, index: u8, material: &[u8]) -> bool {
        self.handler_or_insert(SHARED_HANDLER_ID).set_key(material, index)
    }

    /// Ratchet the shared key at `index`, returning the new material.
    pub fn ratchet_shared_key(&self, index: u8) -> Option<Vec<u8>> {
        self.lock().get(SHARED_HANDLER_ID).cloned()?.ratchet_key(index)
    }

    /// Current shared material at `index`.
    pub fn export_shared_key(&self, index: u8) -> Option<Vec<u8>> {
        self.lock().get(SHARED_HANDLER_ID).cloned()?.export_key(index)
    }
}
