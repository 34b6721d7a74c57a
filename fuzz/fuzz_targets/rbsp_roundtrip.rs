//! Fuzz target for the H.264 byte scanners
//!
//! Exercises NALU indexing and RBSP escape/unescape with arbitrary byte
//! sequences.
//!
//! # Invariants
//!
//! - No scanner panics on any input
//! - `parse_rbsp(write_rbsp(x)) == x` for all x
//! - NALU indices stay within the buffer
//! - Escaped output never contains a raw start code after the escape point

#![no_main]

use libfuzzer_sys::fuzz_target;
use mediaseal_core::h264::{find_nalu_indices, needs_rbsp_unescape, parse_rbsp, write_rbsp};

fuzz_target!(|data: &[u8]| {
    // INVARIANT 1: escape/unescape round-trips exactly
    let escaped = write_rbsp(data);
    assert_eq!(parse_rbsp(&escaped), data, "escape/unescape must round-trip");

    // INVARIANT 2: escaping leaves no interior 00 00 pair unprotected,
    // so no 00 00 01 start code can appear after the escape point
    assert!(
        !escaped.windows(3).any(|window| window == [0, 0, 1]),
        "escaped data must not contain a start code"
    );

    // INVARIANT 3: indices are in bounds
    for index in find_nalu_indices(data) {
        assert!(index.start_offset < data.len());
        assert!(index.payload_start_offset <= data.len());
        assert!(index.payload_start_offset + index.payload_size <= data.len());
        assert!(index.start_offset < index.payload_start_offset);
    }

    // INVARIANT 4: detection and unescape never panic on raw input
    let _ = needs_rbsp_unescape(data);
    let _ = parse_rbsp(data);
});
