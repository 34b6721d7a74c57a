//! The frame cryptor transformer: per-frame encrypt/decrypt state
//! machine with ratchet recovery.
//!
//! One transformer instance handles one direction-agnostic media track.
//! `transform` captures the frame and posts it to the instance's serial
//! worker, preserving per-stream order; all cipher work runs there. A
//! frame that cannot be processed is dropped - errors never reach the
//! transport. State is surfaced to an observer through edge-triggered
//! [`FrameCryptionState`] notifications dispatched on a caller-supplied
//! signaling executor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use mediaseal_crypto::{aes_gcm_open, aes_gcm_seal, derive_key_set, IV_SIZE};

use crate::env::{Environment, SystemEnv};
use crate::executor::SerialExecutor;
use crate::frame::{FrameDirection, FrameSink, TransformableFrame, VideoCodec};
use crate::h264;
use crate::iv::IvGenerator;
use crate::keys::KeyProvider;
use crate::prefix::unencrypted_prefix_len;

/// `IV_len(1) ‖ key_index(1)` at the end of every encrypted frame.
const TRAILER_SIZE: usize = 2;

/// Media kind a transformer instance carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Encoded audio (single sink).
    Audio,
    /// Encoded video (one sink per SSRC).
    Video,
}

/// Cipher suite used for frame payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncryptionAlgorithm {
    /// AES-GCM with a 12-byte IV and 16-byte tag.
    AesGcm,
}

impl EncryptionAlgorithm {
    /// IV length carried on the wire for this algorithm.
    pub fn iv_size(self) -> u8 {
        match self {
            Self::AesGcm => IV_SIZE as u8,
        }
    }
}

/// Cryption outcome surfaced to the observer.
///
/// Emitted on edges only: the observer sees each value once per
/// transition, never repeated for the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCryptionState {
    /// Frames are flowing normally.
    Ok,
    /// The cipher refused to encrypt (bad key size or internal failure).
    EncryptionFailed,
    /// Decryption failed and ratchet recovery was disabled or exhausted.
    DecryptionFailed,
    /// No handler, key index out of ring range, or empty key slot.
    MissingKey,
    /// Decryption succeeded after advancing the ratchet; the new material
    /// is installed.
    KeyRatcheted,
    /// No sink registered for a frame that arrived.
    InternalError,
}

/// Receives edge-triggered cryption state changes.
///
/// Invoked on the signaling executor, never on the cryptor's worker.
pub trait FrameCryptionObserver: Send + Sync {
    /// A direction of `participant_id`'s track transitioned to `state`.
    fn on_frame_cryption_state_changed(&self, participant_id: &str, state: FrameCryptionState);
}

/// Which per-direction state field a transition updates.
#[derive(Clone, Copy)]
enum TransformDirection {
    Encrypt,
    Decrypt,
}

struct CryptorState {
    enabled: bool,
    key_index: u8,
    participant_id: String,
    observer: Option<Arc<dyn FrameCryptionObserver>>,
    last_enc_state: FrameCryptionState,
    last_dec_state: FrameCryptionState,
}

struct SinkTable {
    audio: Option<Arc<dyn FrameSink>>,
    video: HashMap<u32, Arc<dyn FrameSink>>,
}

impl SinkTable {
    fn has_any(&self) -> bool {
        self.audio.is_some() || !self.video.is_empty()
    }
}

struct Inner<E: Environment> {
    media_type: MediaType,
    algorithm: EncryptionAlgorithm,
    key_provider: Arc<KeyProvider>,
    signaling: SerialExecutor,
    state: Mutex<CryptorState>,
    sinks: Mutex<SinkTable>,
    iv_generator: Mutex<IvGenerator<E>>,
}

/// Encrypts outbound frames and decrypts inbound ones for one media
/// track.
///
/// Owns a serial worker thread; `transform` only captures the frame and
/// posts, so the transport thread never blocks on cipher work. Dropping
/// the transformer stops the worker - frames still queued are released
/// without delivery.
pub struct FrameCryptorTransformer<E: Environment = SystemEnv> {
    inner: Arc<Inner<E>>,
    worker: SerialExecutor,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: Environment> FrameCryptorTransformer<E> {
    /// Create a transformer for one participant's track.
    ///
    /// `signaling` is the executor observer notifications are dispatched
    /// on; it is typically shared across every transformer in a session.
    pub fn new(
        participant_id: impl Into<String>,
        media_type: MediaType,
        algorithm: EncryptionAlgorithm,
        key_provider: Arc<KeyProvider>,
        signaling: SerialExecutor,
        env: E,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                media_type,
                algorithm,
                key_provider,
                signaling,
                state: Mutex::new(CryptorState {
                    enabled: false,
                    key_index: 0,
                    participant_id: participant_id.into(),
                    observer: None,
                    last_enc_state: FrameCryptionState::Ok,
                    last_dec_state: FrameCryptionState::Ok,
                }),
                sinks: Mutex::new(SinkTable { audio: None, video: HashMap::new() }),
                iv_generator: Mutex::new(IvGenerator::new(env)),
            }),
            worker: SerialExecutor::new("frame-cryptor"),
        }
    }

    /// Take ownership of a frame and process it on the worker.
    ///
    /// Frames with an unknown direction, or arriving while no sink is
    /// registered, are dropped immediately.
    pub fn transform(&self, frame: Box<dyn TransformableFrame>) {
        {
            let sinks = lock(&self.inner.sinks);
            if !sinks.has_any() {
                tracing::warn!("transform: no sink registered, dropping frame");
                return;
            }
        }

        match frame.direction() {
            FrameDirection::Sender => {
                let inner = Arc::clone(&self.inner);
                self.worker.post(move || inner.encrypt_frame(frame));
            },
            FrameDirection::Receiver => {
                let inner = Arc::clone(&self.inner);
                self.worker.post(move || inner.decrypt_frame(frame));
            },
            FrameDirection::Unknown => {
                tracing::debug!("transform: unknown direction, dropping frame");
            },
        }
    }

    /// Enable or disable cryption. While disabled, frames either pass
    /// through untouched or are discarded, per
    /// `discard_frame_when_cryptor_not_ready`.
    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.inner.state).enabled = enabled;
    }

    /// Whether cryption is currently enabled.
    pub fn enabled(&self) -> bool {
        lock(&self.inner.state).enabled
    }

    /// Select the keyring slot used to encrypt outbound frames.
    pub fn set_key_index(&self, index: u8) {
        lock(&self.inner.state).key_index = index;
    }

    /// Keyring slot used to encrypt outbound frames.
    pub fn key_index(&self) -> u8 {
        lock(&self.inner.state).key_index
    }

    /// Re-point this transformer at a different participant's keys.
    pub fn set_participant_id(&self, participant_id: impl Into<String>) {
        lock(&self.inner.state).participant_id = participant_id.into();
    }

    /// Participant whose keys this transformer uses.
    pub fn participant_id(&self) -> String {
        lock(&self.inner.state).participant_id.clone()
    }

    /// Register or clear the cryption state observer.
    pub fn set_observer(&self, observer: Option<Arc<dyn FrameCryptionObserver>>) {
        lock(&self.inner.state).observer = observer;
    }

    /// Register the single audio sink.
    pub fn set_sink(&self, sink: Arc<dyn FrameSink>) {
        lock(&self.inner.sinks).audio = Some(sink);
    }

    /// Register the video sink for one SSRC.
    pub fn set_sink_for(&self, ssrc: u32, sink: Arc<dyn FrameSink>) {
        lock(&self.inner.sinks).video.insert(ssrc, sink);
    }

    /// Remove the video sink for one SSRC.
    pub fn remove_sink(&self, ssrc: u32) {
        lock(&self.inner.sinks).video.remove(&ssrc);
    }
}

impl<E: Environment> Inner<E> {
    fn sink_for(&self, frame: &dyn TransformableFrame) -> Option<Arc<dyn FrameSink>> {
        let sinks = lock(&self.sinks);
        match self.media_type {
            MediaType::Audio => sinks.audio.clone(),
            MediaType::Video => sinks.video.get(&frame.ssrc()).cloned(),
        }
    }

    fn frame_is_h264(&self, frame: &dyn TransformableFrame) -> bool {
        self.media_type == MediaType::Video && frame.video_codec() == Some(VideoCodec::H264)
    }

    /// Record a state transition and, on an edge, notify the observer on
    /// the signaling executor.
    fn transition(&self, direction: TransformDirection, next: FrameCryptionState) {
        let notify = {
            let mut state = lock(&self.state);
            let last = match direction {
                TransformDirection::Encrypt => &mut state.last_enc_state,
                TransformDirection::Decrypt => &mut state.last_dec_state,
            };
            if *last == next {
                return;
            }
            *last = next;
            state.observer.clone().map(|observer| (observer, state.participant_id.clone()))
        };

        if let Some((observer, participant_id)) = notify {
            self.signaling.post(move || {
                observer.on_frame_cryption_state_changed(&participant_id, next);
            });
        }
    }

    fn encrypt_frame(&self, mut frame: Box<dyn TransformableFrame>) {
        let (enabled, key_index, participant_id) = {
            let state = lock(&self.state);
            (state.enabled, state.key_index, state.participant_id.clone())
        };

        let Some(sink) = self.sink_for(frame.as_ref()) else {
            tracing::warn!(ssrc = frame.ssrc(), "encrypt: no sink for stream");
            self.transition(TransformDirection::Encrypt, FrameCryptionState::InternalError);
            return;
        };

        if frame.payload().is_empty() || !enabled {
            if self.key_provider.options().discard_frame_when_cryptor_not_ready {
                return;
            }
            sink.on_transformed_frame(frame);
            return;
        }

        let handler = if self.key_provider.options().shared_key {
            self.key_provider.get_shared_key(&participant_id)
        } else {
            self.key_provider.get_key(&participant_id)
        };
        let key_set = handler.and_then(|handler| handler.key_set(key_index));
        let Some(key_set) = key_set else {
            tracing::info!(key_index, %participant_id, "encrypt: no key installed");
            self.transition(TransformDirection::Encrypt, FrameCryptionState::MissingKey);
            return;
        };

        let payload = frame.payload().to_vec();
        let prefix_len = unencrypted_prefix_len(frame.as_ref(), self.media_type);
        let (header, plaintext) = payload.split_at(prefix_len);

        let iv = lock(&self.iv_generator).make_iv(frame.ssrc(), frame.timestamp());

        match aes_gcm_seal(&key_set.encryption_key, &iv, header, plaintext) {
            Ok(ciphertext) => {
                let mut suffix =
                    Vec::with_capacity(ciphertext.len() + IV_SIZE + TRAILER_SIZE);
                suffix.extend_from_slice(&ciphertext);
                suffix.extend_from_slice(&iv);
                suffix.push(self.algorithm.iv_size());
                suffix.push(key_index);

                let mut out = Vec::with_capacity(prefix_len + suffix.len() + suffix.len() / 2);
                out.extend_from_slice(header);
                if self.frame_is_h264(frame.as_ref()) {
                    out.extend_from_slice(&h264::write_rbsp(&suffix));
                } else {
                    out.extend_from_slice(&suffix);
                }

                frame.set_payload(Bytes::from(out));
                self.transition(TransformDirection::Encrypt, FrameCryptionState::Ok);
                sink.on_transformed_frame(frame);
            },
            Err(error) => {
                tracing::warn!(%error, ssrc = frame.ssrc(), "encrypt: cipher failure");
                self.transition(TransformDirection::Encrypt, FrameCryptionState::EncryptionFailed);
            },
        }
    }

    fn decrypt_frame(&self, mut frame: Box<dyn TransformableFrame>) {
        let (enabled, participant_id) = {
            let state = lock(&self.state);
            (state.enabled, state.participant_id.clone())
        };

        let Some(sink) = self.sink_for(frame.as_ref()) else {
            tracing::warn!(ssrc = frame.ssrc(), "decrypt: no sink for stream");
            self.transition(TransformDirection::Decrypt, FrameCryptionState::InternalError);
            return;
        };

        if frame.payload().is_empty() || !enabled {
            if self.key_provider.options().discard_frame_when_cryptor_not_ready {
                return;
            }
            sink.on_transformed_frame(frame);
            return;
        }

        let options = self.key_provider.options();
        let payload = frame.payload().to_vec();

        // Frames carrying the magic-byte marker were never encrypted:
        // strip the marker and pass them through before any trailer
        // parsing.
        let magic = &options.uncrypted_magic_bytes;
        if !magic.is_empty()
            && payload.len() >= magic.len()
            && payload[payload.len() - magic.len()..] == magic[..]
        {
            frame.set_payload(Bytes::copy_from_slice(&payload[..payload.len() - magic.len()]));
            sink.on_transformed_frame(frame);
            return;
        }

        let prefix_len = unencrypted_prefix_len(frame.as_ref(), self.media_type);

        let iv_size = usize::from(self.algorithm.iv_size());
        if payload.len() < TRAILER_SIZE
            || payload[payload.len() - 2] != self.algorithm.iv_size()
        {
            tracing::warn!(ssrc = frame.ssrc(), "decrypt: malformed trailer");
            self.transition(TransformDirection::Decrypt, FrameCryptionState::DecryptionFailed);
            return;
        }
        let key_index = payload[payload.len() - 1];

        let handler = if options.shared_key {
            self.key_provider.get_shared_key(&participant_id)
        } else {
            self.key_provider.get_key(&participant_id)
        };
        let key_set = if key_index < options.key_ring_size {
            handler.as_ref().and_then(|handler| handler.key_set(key_index))
        } else {
            None
        };
        let (Some(handler), Some(key_set)) = (handler, key_set) else {
            tracing::info!(key_index, %participant_id, "decrypt: no key installed");
            self.transition(TransformDirection::Decrypt, FrameCryptionState::MissingKey);
            return;
        };

        // After a failure streak with no fresh key, stop thrashing the
        // ratchet and wait for a new key install.
        if lock(&self.state).last_dec_state == FrameCryptionState::DecryptionFailed
            && !handler.has_valid_key()
        {
            return;
        }

        if payload.len() < prefix_len + iv_size + TRAILER_SIZE {
            tracing::warn!(ssrc = frame.ssrc(), "decrypt: frame too short");
            self.transition(TransformDirection::Decrypt, FrameCryptionState::DecryptionFailed);
            return;
        }

        // IV and trailer sit at raw (escaped) positions; only the body is
        // unescaped. See the module docs for the layout.
        let iv_start = payload.len() - TRAILER_SIZE - iv_size;
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&payload[iv_start..payload.len() - TRAILER_SIZE]);

        let header = &payload[..prefix_len];
        let mut body = payload[prefix_len..iv_start].to_vec();
        if self.frame_is_h264(frame.as_ref()) && h264::needs_rbsp_unescape(&body) {
            body = h264::parse_rbsp(&body);
        }

        let mut ratcheted = false;
        let mut plaintext = aes_gcm_open(&key_set.encryption_key, &iv, header, &body).ok();

        if plaintext.is_none() && options.ratchet_window_size > 0 {
            // The sender may have ratcheted ahead of us. Walk the ratchet
            // forward up to the window; on success install the new
            // material, otherwise roll back so the sender's real key is
            // not overwritten by guesses.
            let initial_material = key_set.material.clone();
            let mut current = initial_material.clone();
            let mut attempts = 0u32;

            while attempts < options.ratchet_window_size {
                attempts += 1;
                tracing::info!(
                    attempt = attempts,
                    window = options.ratchet_window_size,
                    "decrypt: ratcheting key"
                );

                let new_material = handler.ratchet_key_material(&current);
                let Ok(ratcheted_keys) =
                    derive_key_set(&new_material, &options.ratchet_salt, 128)
                else {
                    break;
                };

                if let Ok(recovered) =
                    aes_gcm_open(&ratcheted_keys.encryption_key, &iv, header, &body)
                {
                    tracing::info!(key_index, "decrypt: ratchet succeeded, installing key");
                    handler.set_key_from_material(&new_material, key_index);
                    handler.set_has_valid_key(true);
                    self.transition(TransformDirection::Decrypt, FrameCryptionState::KeyRatcheted);
                    ratcheted = true;
                    plaintext = Some(recovered);
                    break;
                }
                current = new_material;
            }

            if plaintext.is_none() {
                handler.set_key_from_material(&initial_material, key_index);
            }
        }

        let Some(plaintext) = plaintext else {
            if handler.decryption_failure() {
                self.transition(TransformDirection::Decrypt, FrameCryptionState::DecryptionFailed);
            }
            return;
        };

        let mut out = Vec::with_capacity(prefix_len + plaintext.len());
        out.extend_from_slice(header);
        out.extend_from_slice(&plaintext);
        frame.set_payload(Bytes::from(out));

        if !ratcheted {
            self.transition(TransformDirection::Decrypt, FrameCryptionState::Ok);
        }
        sink.on_transformed_frame(frame);
    }
}
