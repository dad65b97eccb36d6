//! Fuzz target for frame and batch decoding
//!
//! Arbitrary bytes must never panic the decoder. Anything that does decode
//! must re-encode to a frame that decodes to the same value.

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use lockstep_proto::{decode_frame, encode_frame, FrameBatch};

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = decode_frame(data) {
        assert!(!frame.frame_id.is_sentinel(), "decoded the sentinel frame");

        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf).expect("decoded frame must re-encode");
        assert_eq!(decode_frame(&buf).expect("re-encoded frame must decode"), frame);
    }

    if let Ok(batch) = FrameBatch::decode(data) {
        let ids: Vec<u64> = batch.frames.iter().map(|f| f.frame_id.get()).collect();
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1), "non-consecutive batch: {ids:?}");
    }
});
