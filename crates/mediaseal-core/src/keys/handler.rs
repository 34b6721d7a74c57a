//! Per-participant keyring and ratchet state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mediaseal_crypto::{derive_key_set, ratchet_material, KeySet};

use super::provider::KeyProviderOptions;

/// Consecutive decryption failures tolerated before the handler reports
/// the stream as failed and marks its key invalid.
const DECRYPTION_FAILURE_TOLERANCE: u32 = 0;

/// Keyring and ratchet state for one participant.
///
/// Shared by every transformer carrying that participant's streams.
/// All state lives behind an internal mutex; methods are safe to call
/// from any thread.
///
/// # Invariants
///
/// - Installing a key at index `i` replaces slot `i` and makes it current
/// - `has_valid_key` is set on install and ratchet success, and cleared
///   once the failure count crosses its tolerance
pub struct ParticipantKeyHandler {
    options: KeyProviderOptions,
    state: Mutex<HandlerState>,
}

struct HandlerState {
    ring: Vec<Option<Arc<KeySet>>>,
    current_index: u8,
    has_valid_key: bool,
    decryption_failure_count: u32,
}

impl ParticipantKeyHandler {
    /// Create a handler with an empty keyring of `options.key_ring_size`
    /// slots.
    #[must_use]
    pub fn new(options: KeyProviderOptions) -> Self {
        let ring = (0..usize::from(options.key_ring_size)).map(|_| None).collect();
        Self {
            options,
            state: Mutex::new(HandlerState {
                ring,
                current_index: 0,
                has_valid_key: false,
                decryption_failure_count: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install new material at `index`, clearing any failure state.
    ///
    /// Returns false if the index is outside the keyring.
    pub fn set_key(&self, material: &[u8], index: u8) -> bool {
        if !self.set_key_from_material(material, index) {
            return false;
        }
        let mut state = self.lock();
        state.decryption_failure_count = 0;
        state.has_valid_key = true;
        true
    }

    /// Install new material at `index` without touching the failure
    /// state. Used by the ratchet recovery path, where validity is
    /// decided separately.
    ///
    /// Returns false if the index is outside the keyring.
    pub fn set_key_from_material(&self, material: &[u8], index: u8) -> bool {
        let Ok(key_set) = derive_key_set(material, &self.options.ratchet_salt, 128) else {
            return false;
        };

        let mut state = self.lock();
        let Some(slot) = state.ring.get_mut(usize::from(index)) else {
            tracing::warn!(index, ring_size = self.options.key_ring_size, "key index out of range");
            return false;
        };
        *slot = Some(Arc::new(key_set));
        state.current_index = index;
        true
    }

    /// Key set at `index`. `None` when the index is out of range or the
    /// slot is empty.
    pub fn key_set(&self, index: u8) -> Option<Arc<KeySet>> {
        self.lock().ring.get(usize::from(index)).and_then(Clone::clone)
    }

    /// Index of the most recently installed key.
    pub fn current_index(&self) -> u8 {
        self.lock().current_index
    }

    /// Advance the material at `index` one ratchet step and reinstall it.
    ///
    /// Returns the new material, or `None` if the slot is empty.
    pub fn ratchet_key(&self, index: u8) -> Option<Vec<u8>> {
        let material = self.key_set(index)?.material.clone();
        let new_material = self.ratchet_key_material(&material);
        self.set_key_from_material(&new_material, index);
        Some(new_material)
    }

    /// Current material at `index`, for sharing with late joiners.
    pub fn export_key(&self, index: u8) -> Option<Vec<u8>> {
        self.key_set(index).map(|key_set| key_set.material.clone())
    }

    /// The deterministic one-way ratchet step over `current`, using this
    /// handler's ratchet salt.
    pub fn ratchet_key_material(&self, current: &[u8]) -> Vec<u8> {
        ratchet_material(current, &self.options.ratchet_salt)
    }

    /// Whether the current key has decrypted successfully since the last
    /// failure streak.
    pub fn has_valid_key(&self) -> bool {
        self.lock().has_valid_key
    }

    /// Externally override the validity flag (e.g. after ratchet success
    /// or a key rotation announcement).
    pub fn set_has_valid_key(&self, valid: bool) {
        let mut state = self.lock();
        state.has_valid_key = valid;
        if valid {
            state.decryption_failure_count = 0;
        }
    }

    /// Record a decryption failure.
    ///
    /// Returns true once the failure count crosses the tolerance, at
    /// which point the key is marked invalid and the cryptor should
    /// surface a failure state.
    pub fn decryption_failure(&self) -> bool {
        let mut state = self.lock();
        state.decryption_failure_count += 1;
        if state.decryption_failure_count > DECRYPTION_FAILURE_TOLERANCE {
            state.has_valid_key = false;
            true
        } else {
            false
        }
    }
}
