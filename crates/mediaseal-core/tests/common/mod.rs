//! Shared fixtures for cryptor integration tests: synthetic frames,
//! channel-backed sinks and observers, and a deterministic environment.

#![allow(dead_code)]

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mediaseal_core::{
    EncryptionAlgorithm, Environment, FrameCryptionObserver, FrameCryptionState,
    FrameCryptorTransformer, FrameDirection, FrameSink, KeyProvider, KeyProviderOptions,
    MediaType, SerialExecutor, TransformableFrame, VideoCodec,
};

/// Generous bound for worker-thread handoffs.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Window in which an event must NOT arrive.
pub const QUIET_TIMEOUT: Duration = Duration::from_millis(300);

pub const TEST_SALT: &[u8] = b"mediaseal-test-salt";

/// Environment whose RNG always returns zero, so IV counters start at 0.
#[derive(Clone)]
pub struct ZeroEnv;

impl Environment for ZeroEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0);
    }
}

/// Synthetic transport frame.
pub struct TestFrame {
    pub direction: FrameDirection,
    pub ssrc: u32,
    pub timestamp: u32,
    pub payload: Bytes,
    pub codec: Option<VideoCodec>,
    pub key_frame: bool,
}

impl TestFrame {
    pub fn audio(direction: FrameDirection, payload: &[u8]) -> Box<Self> {
        Box::new(Self {
            direction,
            ssrc: 0x1122_3344,
            timestamp: 0x0102_0304,
            payload: Bytes::copy_from_slice(payload),
            codec: None,
            key_frame: false,
        })
    }

    pub fn video(
        direction: FrameDirection,
        codec: VideoCodec,
        key_frame: bool,
        payload: &[u8],
    ) -> Box<Self> {
        Box::new(Self {
            direction,
            ssrc: 0x1122_3344,
            timestamp: 0x0102_0304,
            payload: Bytes::copy_from_slice(payload),
            codec: Some(codec),
            key_frame,
        })
    }

    pub fn with_ssrc(mut self: Box<Self>, ssrc: u32) -> Box<Self> {
        self.ssrc = ssrc;
        self
    }
}

impl TransformableFrame for TestFrame {
    fn direction(&self) -> FrameDirection {
        self.direction
    }

    fn ssrc(&self) -> u32 {
        self.ssrc
    }

    fn timestamp(&self) -> u32 {
        self.timestamp
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn set_payload(&mut self, payload: Bytes) {
        self.payload = payload;
    }

    fn video_codec(&self) -> Option<VideoCodec> {
        self.codec
    }

    fn is_key_frame(&self) -> bool {
        self.key_frame
    }
}

/// Sink that forwards transformed payloads into a channel.
pub struct CollectingSink {
    sender: Sender<Vec<u8>>,
}

impl CollectingSink {
    pub fn new() -> (Arc<Self>, Receiver<Vec<u8>>) {
        let (sender, receiver) = channel();
        (Arc::new(Self { sender }), receiver)
    }
}

impl FrameSink for CollectingSink {
    fn on_transformed_frame(&self, frame: Box<dyn TransformableFrame>) {
        let _ = self.sender.send(frame.payload().to_vec());
    }
}

/// Observer that forwards state edges into a channel.
pub struct StateObserver {
    sender: Sender<(String, FrameCryptionState)>,
}

impl StateObserver {
    pub fn new() -> (Arc<Self>, Receiver<(String, FrameCryptionState)>) {
        let (sender, receiver) = channel();
        (Arc::new(Self { sender }), receiver)
    }
}

impl FrameCryptionObserver for StateObserver {
    fn on_frame_cryption_state_changed(&self, participant_id: &str, state: FrameCryptionState) {
        let _ = self.sender.send((participant_id.to_owned(), state));
    }
}

pub fn test_options() -> KeyProviderOptions {
    KeyProviderOptions { ratchet_salt: TEST_SALT.to_vec(), ..KeyProviderOptions::default() }
}

pub fn cryptor(
    participant_id: &str,
    media_type: MediaType,
    provider: &Arc<KeyProvider>,
) -> FrameCryptorTransformer<ZeroEnv> {
    FrameCryptorTransformer::new(
        participant_id,
        media_type,
        EncryptionAlgorithm::AesGcm,
        Arc::clone(provider),
        SerialExecutor::new("signaling"),
        ZeroEnv,
    )
}

/// Build an enabled audio sender/receiver pair over independent
/// providers holding the same key material.
#[allow(clippy::type_complexity)]
pub fn audio_pair(
    material: &[u8],
    key_index: u8,
    options: KeyProviderOptions,
) -> (
    FrameCryptorTransformer<ZeroEnv>,
    Receiver<Vec<u8>>,
    FrameCryptorTransformer<ZeroEnv>,
    Receiver<Vec<u8>>,
) {
    let sender_provider = Arc::new(KeyProvider::new(options.clone()));
    let receiver_provider = Arc::new(KeyProvider::new(options));
    sender_provider.set_key("alice", key_index, material);
    receiver_provider.set_key("alice", key_index, material);

    let sender = cryptor("alice", MediaType::Audio, &sender_provider);
    let (sender_sink, sender_rx) = CollectingSink::new();
    sender.set_sink(sender_sink);
    sender.set_enabled(true);
    sender.set_key_index(key_index);

    let receiver = cryptor("alice", MediaType::Audio, &receiver_provider);
    let (receiver_sink, receiver_rx) = CollectingSink::new();
    receiver.set_sink(receiver_sink);
    receiver.set_enabled(true);

    (sender, sender_rx, receiver, receiver_rx)
}
