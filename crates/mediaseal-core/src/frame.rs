//! Frame and sink abstractions at the transport seam.
//!
//! The transport owns frame allocation; the cryptor sees frames through
//! [`TransformableFrame`] and hands them off through [`FrameSink`]. A
//! frame belongs to the cryptor from `transform` entry until it is
//! delivered to a sink or dropped.

use bytes::Bytes;

/// Direction a frame is traveling, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    /// Outbound frame - will be encrypted.
    Sender,
    /// Inbound frame - will be decrypted.
    Receiver,
    /// Direction not known; such frames are dropped.
    Unknown,
}

/// Video codec carried by a frame.
///
/// Determines the codec-dependent unencrypted prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum VideoCodec {
    /// VP8 - prefix 10 bytes on key frames, 3 otherwise.
    Vp8,
    /// VP9 - no clear prefix.
    Vp9,
    /// H.264 - prefix from the first slice NALU; suffix is RBSP-escaped.
    H264,
    /// AV1 - no clear prefix.
    Av1,
    /// Any other codec - no clear prefix.
    Generic,
}

/// H.264 packetization mode, as signaled in SDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum H264PacketizationMode {
    /// Mode 1 - STAP-A and FU-A allowed.
    #[default]
    NonInterleaved,
    /// Mode 0 - one NALU per packet.
    SingleNalUnit,
}

/// An encoded media frame owned by the cryptor during transformation.
///
/// Implemented by the transport integration. Audio frames may leave the
/// video accessors at their defaults.
pub trait TransformableFrame: Send {
    /// Direction this frame is traveling.
    fn direction(&self) -> FrameDirection;

    /// RTP synchronization source of the stream this frame belongs to.
    fn ssrc(&self) -> u32;

    /// RTP timestamp of this frame.
    fn timestamp(&self) -> u32;

    /// Read view of the payload bytes.
    fn payload(&self) -> &[u8];

    /// Replace the payload bytes.
    fn set_payload(&mut self, payload: Bytes);

    /// Codec of a video frame. `None` for audio.
    fn video_codec(&self) -> Option<VideoCodec> {
        None
    }

    /// Whether a video frame is a key frame.
    fn is_key_frame(&self) -> bool {
        false
    }

    /// H.264 packetization mode of a video frame.
    fn h264_packetization_mode(&self) -> H264PacketizationMode {
        H264PacketizationMode::default()
    }
}

/// Receives transformed frames for one stream.
///
/// Called from the cryptor's worker thread; implementations must hand the
/// frame back to the transport without blocking on cipher-rate work.
pub trait FrameSink: Send + Sync {
    /// Deliver a transformed (or passed-through) frame.
    fn on_transformed_frame(&self, frame: Box<dyn TransformableFrame>);
}
