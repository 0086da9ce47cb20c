//! Fuzz target for the frame decoder.
//!
//! Feeds arbitrary bytes in arbitrary chunks and checks decoding never panics
//! and never keeps more than one partial frame around.

#![no_main]

use libfuzzer_sys::fuzz_target;
use repeat_client::FrameDecoder;
use repeat_client::codec::MAX_FRAME_SIZE;

fuzz_target!(|chunks: Vec<Vec<u8>>| {
    let mut decoder = FrameDecoder::new();
    for chunk in &chunks {
        decoder.extend(chunk);
        for frame in decoder.frames() {
            let _ = frame;
        }
        assert!(decoder.buffered() <= MAX_FRAME_SIZE + chunk.len());
    }
});
