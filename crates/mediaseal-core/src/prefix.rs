//! Codec-aware unencrypted prefix computation.
//!
//! A short prefix of each encoded frame stays in clear so that
//! middleboxes and depacketizers keep working without the key:
//!
//! - Audio: 1 byte
//! - VP8: 10 bytes on key frames, 3 otherwise
//! - AV1: 0 (the OBU layer tolerates opaque payloads)
//! - H.264: up to and including the first two bytes of the first slice
//!   NALU payload; 0 when no slice NALU is present
//! - Anything else: 0
//!
//! Kept as a free function over the frame so tests can drive it with
//! synthetic frames, without a transport.

use crate::cryptor::MediaType;
use crate::frame::{TransformableFrame, VideoCodec};
use crate::h264::{find_nalu_indices, parse_nalu_type, NaluType};

/// Number of leading payload bytes that stay unencrypted, clamped to the
/// payload length.
pub fn unencrypted_prefix_len(frame: &dyn TransformableFrame, media_type: MediaType) -> usize {
    let len = match media_type {
        MediaType::Audio => 1,
        MediaType::Video => match frame.video_codec() {
            Some(VideoCodec::Vp8) => {
                if frame.is_key_frame() {
                    10
                } else {
                    3
                }
            },
            Some(VideoCodec::H264) => h264_prefix_len(frame.payload()),
            _ => 0,
        },
    };
    len.min(frame.payload().len())
}

/// Prefix for H.264: scan NALUs and stop at the first IDR or non-IDR
/// slice, keeping its start code, header byte, and one payload byte in
/// clear.
fn h264_prefix_len(payload: &[u8]) -> usize {
    for index in find_nalu_indices(payload) {
        let Some(&header_byte) = payload.get(index.payload_start_offset) else {
            continue;
        };
        match parse_nalu_type(header_byte) {
            NaluType::Idr | NaluType::Slice => {
                tracing::debug!(
                    offset = index.payload_start_offset,
                    payload_size = index.payload_size,
                    "found slice NALU for clear prefix"
                );
                return index.payload_start_offset + 2;
            },
            _ => {},
        }
    }
    0
}
