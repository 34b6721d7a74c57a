//! Fuzz target for the decrypt path
//!
//! Feeds arbitrary bytes to a receiver-side transformer as if they came
//! off the wire. The cryptor must never panic: malformed trailers, bogus
//! key indices, truncated IVs, and corrupt ciphertext all end in a
//! silent drop or an observer edge, never a crash.
//!
//! Ratchet recovery is disabled here - every arbitrary input would walk
//! the full PBKDF2 window and drown the fuzzer in key derivations.

#![no_main]

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock};

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use mediaseal_core::{
    EncryptionAlgorithm, Environment, FrameCryptorTransformer, FrameDirection, FrameSink,
    KeyProvider, KeyProviderOptions, MediaType, SerialExecutor, TransformableFrame, VideoCodec,
};

#[derive(Debug, Clone, Arbitrary)]
struct FrameCase {
    payload: Vec<u8>,
    codec: CodecCase,
    key_frame: bool,
}

#[derive(Debug, Clone, Arbitrary)]
enum CodecCase {
    Audio,
    Vp8,
    H264,
    Av1,
}

#[derive(Clone)]
struct ZeroEnv;

impl Environment for ZeroEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0);
    }
}

struct FuzzFrame {
    payload: Bytes,
    codec: Option<VideoCodec>,
    key_frame: bool,
}

impl TransformableFrame for FuzzFrame {
    fn direction(&self) -> FrameDirection {
        FrameDirection::Receiver
    }

    fn ssrc(&self) -> u32 {
        1
    }

    fn timestamp(&self) -> u32 {
        1
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

struct NullSink {
    done: Mutex<Sender<()>>,
}

impl FrameSink for NullSink {
    fn on_transformed_frame(&self, _frame: Box<dyn TransformableFrame>) {
        let _ = self.done.lock().unwrap().send(());
    }
}

struct Setup {
    audio: FrameCryptorTransformer<ZeroEnv>,
    video: FrameCryptorTransformer<ZeroEnv>,
    delivered: Mutex<Receiver<()>>,
}

fn setup() -> &'static Setup {
    static SETUP: OnceLock<Setup> = OnceLock::new();
    SETUP.get_or_init(|| {
        let options = KeyProviderOptions {
            ratchet_salt: b"fuzz-salt".to_vec(),
            ratchet_window_size: 0,
            ..KeyProviderOptions::default()
        };
        let provider = Arc::new(KeyProvider::new(options));
        provider.set_key("fuzz", 0, b"fuzz-material");

        let signaling = SerialExecutor::new("fuzz-signaling");
        let (done, delivered) = channel();

        let audio = FrameCryptorTransformer::new(
            "fuzz",
            MediaType::Audio,
            EncryptionAlgorithm::AesGcm,
            Arc::clone(&provider),
            signaling.clone(),
            ZeroEnv,
        );
        audio.set_sink(Arc::new(NullSink { done: Mutex::new(done.clone()) }));
        audio.set_enabled(true);

        let video = FrameCryptorTransformer::new(
            "fuzz",
            MediaType::Video,
            EncryptionAlgorithm::AesGcm,
            provider,
            signaling,
            ZeroEnv,
        );
        video.set_sink_for(1, Arc::new(NullSink { done: Mutex::new(done) }));
        video.set_enabled(true);

        Setup { audio, video, delivered: Mutex::new(delivered) }
    })
}

fuzz_target!(|case: FrameCase| {
    let setup = setup();

    let (transformer, codec) = match case.codec {
        CodecCase::Audio => (&setup.audio, None),
        CodecCase::Vp8 => (&setup.video, Some(VideoCodec::Vp8)),
        CodecCase::H264 => (&setup.video, Some(VideoCodec::H264)),
        CodecCase::Av1 => (&setup.video, Some(VideoCodec::Av1)),
    };

    transformer.transform(Box::new(FuzzFrame {
        payload: Bytes::from(case.payload),
        codec,
        key_frame: case.key_frame,
    }));

    // Drain any passthrough deliveries so the channel never grows
    // unbounded across iterations.
    while setup.delivered.lock().unwrap().try_recv().is_ok() {}
});
