//! Fuzz target: `VectorFrame::decode`
//!
//! Drives arbitrary bytes into the published-vector decoder.  Whatever
//! decodes must encode back to bytes that decode to the same frame.
//!
//! cargo fuzz run fuzz_vector_frame

#![no_main]

use libfuzzer_sys::fuzz_target;
use vector_cycle::app::VectorFrame;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = VectorFrame::decode(data) else {
        return;
    };
    let bytes = postcard::to_allocvec(&frame).expect("decoded frame re-encodes");
    let again = VectorFrame::decode(&bytes).expect("re-encoded frame decodes");
    assert_eq!(frame.timestamp, again.timestamp);
    assert_eq!(frame.events, again.events);
    assert_eq!(frame.data.len(), again.data.len());
});
