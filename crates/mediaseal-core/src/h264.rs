//! H.264 bitstream helpers: NALU scanning and RBSP emulation prevention.
//!
//! The cryptor needs just enough H.264 awareness to (a) find the first
//! slice NALU when computing the unencrypted prefix and (b) keep the
//! encrypted suffix from emitting bytes that parse as start codes.
//!
//! Escaping inserts an emulation-prevention `0x03` after every `00 00`
//! pair. This is a conservative superset of the H.264 rule (which only
//! requires it before a byte <= 3); decoders strip every `00 00 03`
//! triple, so conservatively escaped data stays interoperable and
//! `parse_rbsp(write_rbsp(x)) == x` holds for the suffix layout.

/// Location of one NAL unit inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaluIndex {
    /// Offset of the start code.
    pub start_offset: usize,
    /// Offset of the first byte after the start code (the NALU header).
    pub payload_start_offset: usize,
    /// Length of the NALU payload, up to the next start code or buffer end.
    pub payload_size: usize,
}

/// NAL unit type, from the low 5 bits of the NALU header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluType {
    /// Coded slice of a non-IDR picture.
    Slice,
    /// Coded slice of an IDR picture.
    Idr,
    /// Supplemental enhancement information.
    Sei,
    /// Sequence parameter set.
    Sps,
    /// Picture parameter set.
    Pps,
    /// Access unit delimiter.
    Aud,
    /// Single-time aggregation packet.
    StapA,
    /// Fragmentation unit.
    FuA,
    /// Any other type.
    Unspecified(u8),
}

/// Parse the NALU type from the header byte (low 5 bits).
pub fn parse_nalu_type(header_byte: u8) -> NaluType {
    match header_byte & 0x1F {
        1 => NaluType::Slice,
        5 => NaluType::Idr,
        6 => NaluType::Sei,
        7 => NaluType::Sps,
        8 => NaluType::Pps,
        9 => NaluType::Aud,
        24 => NaluType::StapA,
        28 => NaluType::FuA,
        other => NaluType::Unspecified(other),
    }
}

/// Locate NAL units by their `00 00 01` / `00 00 00 01` start codes.
pub fn find_nalu_indices(data: &[u8]) -> Vec<NaluIndex> {
    let mut indices: Vec<NaluIndex> = Vec::new();
    if data.len() < 3 {
        return indices;
    }

    let end = data.len() - 2;
    let mut i = 0;
    while i < end {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            let mut start_offset = i;
            // A preceding zero byte makes this a 4-byte start code.
            if start_offset > 0 && data[start_offset - 1] == 0 {
                start_offset -= 1;
            }

            if let Some(previous) = indices.last_mut() {
                previous.payload_size = start_offset - previous.payload_start_offset;
            }

            indices.push(NaluIndex {
                start_offset,
                payload_start_offset: i + 3,
                payload_size: 0,
            });
            i += 3;
        } else {
            i += 1;
        }
    }

    if let Some(last) = indices.last_mut() {
        last.payload_size = data.len() - last.payload_start_offset;
    }
    indices
}

/// Whether `data` contains an emulation-prevention sequence.
///
/// The scan stops three bytes short of the end, mirroring the upstream
/// detector; a sequence beginning in the final three bytes goes
/// undetected. The cryptor's trailer layout never places one there.
pub fn needs_rbsp_unescape(data: &[u8]) -> bool {
    data.windows(3).take(data.len().saturating_sub(3)).any(|window| window == [0, 0, 3])
}

/// Escape `src`, inserting an emulation-prevention `0x03` after every
/// `00 00` pair.
pub fn write_rbsp(src: &[u8]) -> Vec<u8> {
    let mut dst = Vec::with_capacity(src.len() + src.len() / 2);
    let mut consecutive_zeros = 0usize;

    for &byte in src {
        if consecutive_zeros == 2 {
            dst.push(0x03);
            consecutive_zeros = 0;
        }
        dst.push(byte);
        if byte == 0 {
            consecutive_zeros += 1;
        } else {
            consecutive_zeros = 0;
        }
    }
    dst
}

/// Remove emulation-prevention bytes: every `00 00 03` triple becomes
/// `00 00`.
pub fn parse_rbsp(src: &[u8]) -> Vec<u8> {
    let mut dst = Vec::with_capacity(src.len());
    let mut i = 0;

    while i < src.len() {
        if src.len() - i >= 3 && src[i] == 0 && src[i + 1] == 0 && src[i + 2] == 3 {
            dst.push(0);
            dst.push(0);
            i += 3;
        } else {
            dst.push(src[i]);
            i += 1;
        }
    }
    dst
}
