//! Property-based tests for the cryptor's end-to-end laws:
//!
//! 1. **Round-trip**: decrypt(encrypt(frame)) restores the payload
//! 2. **Prefix preservation**: the clear prefix survives encryption
//! 3. **Trailer shape**: non-H.264 outputs end in `[12, key_index]`
//! 4. **IV uniqueness**: one stream never repeats an IV within the window
//! 5. **Ratchet convergence**: a receiver k steps behind catches up

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{
    audio_pair, cryptor, test_options, CollectingSink, TestFrame, RECV_TIMEOUT, TEST_SALT,
};
use mediaseal_core::{FrameDirection, KeyProvider, MediaType, VideoCodec};
use mediaseal_crypto::{ratchet_material, IV_SIZE, TAG_SIZE};
use proptest::prelude::*;

const OVERHEAD: usize = TAG_SIZE + IV_SIZE + 2;

fn arb_material() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![Just(16usize), Just(32usize)]
        .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len..=len))
}

proptest! {
    // Every case pays for PBKDF2 installs, so the counts stay small.
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_audio_roundtrip(
        material in arb_material(),
        payload in prop::collection::vec(any::<u8>(), 1..200),
        key_index in 0u8..4,
    ) {
        let (sender, sender_rx, receiver, receiver_rx) =
            audio_pair(&material, key_index, test_options());

        sender.transform(TestFrame::audio(FrameDirection::Sender, &payload));
        let encrypted = sender_rx.recv_timeout(RECV_TIMEOUT).unwrap();

        prop_assert_eq!(encrypted.len(), payload.len() + OVERHEAD);
        prop_assert_eq!(encrypted[0], payload[0], "prefix byte preserved");
        prop_assert_eq!(encrypted[encrypted.len() - 2], 12u8);
        prop_assert_eq!(encrypted[encrypted.len() - 1], key_index);

        receiver.transform(TestFrame::audio(FrameDirection::Receiver, &encrypted));
        prop_assert_eq!(receiver_rx.recv_timeout(RECV_TIMEOUT).unwrap(), payload);
    }

    #[test]
    fn prop_video_roundtrip(
        material in arb_material(),
        payload in prop::collection::vec(any::<u8>(), 10..200),
        codec_choice in 0usize..4,
    ) {
        let (codec, key_frame, prefix_len) = match codec_choice {
            0 => (VideoCodec::Vp8, true, 10),
            1 => (VideoCodec::Vp8, false, 3),
            2 => (VideoCodec::Av1, false, 0),
            _ => (VideoCodec::Generic, true, 0),
        };

        let provider = Arc::new(KeyProvider::new(test_options()));
        provider.set_key("alice", 0, &material);

        let sender = cryptor("alice", MediaType::Video, &provider);
        let (sender_sink, sender_rx) = CollectingSink::new();
        sender.set_sink_for(0x1122_3344, sender_sink);
        sender.set_enabled(true);

        let receiver = cryptor("alice", MediaType::Video, &provider);
        let (receiver_sink, receiver_rx) = CollectingSink::new();
        receiver.set_sink_for(0x1122_3344, receiver_sink);
        receiver.set_enabled(true);

        sender.transform(TestFrame::video(FrameDirection::Sender, codec, key_frame, &payload));
        let encrypted = sender_rx.recv_timeout(RECV_TIMEOUT).unwrap();

        prop_assert_eq!(&encrypted[..prefix_len], &payload[..prefix_len]);
        prop_assert_eq!(encrypted[encrypted.len() - 2], 12u8);

        receiver.transform(TestFrame::video(FrameDirection::Receiver, codec, key_frame, &encrypted));
        prop_assert_eq!(receiver_rx.recv_timeout(RECV_TIMEOUT).unwrap(), payload);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(4))]

    #[test]
    fn prop_ratchet_converges_within_window(
        steps in 1u32..=3,
        payload in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let mut options = test_options();
        options.ratchet_window_size = 4;

        let receiver_material = b"chain-origin".to_vec();
        let mut sender_material = receiver_material.clone();
        for _ in 0..steps {
            sender_material = ratchet_material(&sender_material, TEST_SALT);
        }

        let sender_provider = Arc::new(KeyProvider::new(options.clone()));
        sender_provider.set_key("alice", 0, &sender_material);
        let sender = cryptor("alice", MediaType::Audio, &sender_provider);
        let (sender_sink, sender_rx) = CollectingSink::new();
        sender.set_sink(sender_sink);
        sender.set_enabled(true);

        let receiver_provider = Arc::new(KeyProvider::new(options));
        receiver_provider.set_key("alice", 0, &receiver_material);
        let receiver = cryptor("alice", MediaType::Audio, &receiver_provider);
        let (receiver_sink, receiver_rx) = CollectingSink::new();
        receiver.set_sink(receiver_sink);
        receiver.set_enabled(true);

        sender.transform(TestFrame::audio(FrameDirection::Sender, &payload));
        let encrypted = sender_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        receiver.transform(TestFrame::audio(FrameDirection::Receiver, &encrypted));

        prop_assert_eq!(receiver_rx.recv_timeout(RECV_TIMEOUT).unwrap(), payload);
        prop_assert_eq!(
            receiver_provider.export_key("alice", 0).unwrap(),
            sender_material,
            "receiver installs the sender's current material"
        );
    }
}

#[test]
fn ivs_are_unique_within_stream() {
    let (sender, sender_rx, _receiver, _receiver_rx) = audio_pair(b"material", 0, test_options());

    // Identical payload and timestamp on every frame; only the send
    // counter distinguishes the IVs.
    let mut seen = HashSet::new();
    for _ in 0..50 {
        sender.transform(TestFrame::audio(FrameDirection::Sender, b"\xAAsame frame"));
        let encrypted = sender_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        let iv_start = encrypted.len() - 2 - IV_SIZE;
        let iv = encrypted[iv_start..encrypted.len() - 2].to_vec();
        assert!(seen.insert(iv), "IV repeated within a stream");
    }
}
