//! Mediaseal: end-to-end media frame encryption
//!
//! A streaming transformer that sits between a real-time media transport
//! and its encoder/decoder endpoints. Outbound encoded frames (Opus
//! audio; VP8, H.264, AV1 video) are selectively encrypted under
//! per-participant keys - a codec-dependent prefix stays in clear so
//! middleboxes and depacketizers keep working - and inbound frames are
//! decrypted, with a bounded key-ratchet recovery when decryption fails.
//!
//! # Architecture
//!
//! ```text
//! Transport ──► FrameCryptorTransformer::transform(frame)
//!                      │ post to per-instance serial worker
//!                      ▼
//!            encrypt / decrypt path
//!                      │
//!        ┌─────────────┼──────────────┐
//!        ▼             ▼              ▼
//!   KeyProvider   IvGenerator    H.264 helpers
//!   (keyrings,    (per-SSRC      (NALU scan,
//!    ratchet)      counters)      RBSP escape)
//!                      │
//!                      ▼
//!            FrameSink (per stream)
//! ```
//!
//! # On-wire layout
//!
//! ```text
//! [ unencrypted_prefix | ciphertext+tag | IV(12) | IV_len(1) | key_index(1) ]
//! ```
//!
//! For H.264 the region after the prefix is RBSP-escaped so that
//! emulated start codes do not confuse downstream NALU parsing.
//!
//! Failures never escape to the transport: bad frames are dropped and an
//! edge-triggered [`FrameCryptionState`] notification is delivered to the
//! registered observer on a caller-supplied signaling executor.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cryptor;
pub mod env;
pub mod executor;
pub mod frame;
pub mod h264;
pub mod iv;
pub mod keys;
pub mod prefix;

pub use cryptor::{
    EncryptionAlgorithm, FrameCryptionObserver, FrameCryptionState, FrameCryptorTransformer,
    MediaType,
};
pub use env::{Environment, SystemEnv};
pub use executor::SerialExecutor;
pub use frame::{
    FrameDirection, FrameSink, H264PacketizationMode, TransformableFrame, VideoCodec,
};
pub use keys::{KeyProvider, KeyProviderOptions, ParticipantKeyHandler};
