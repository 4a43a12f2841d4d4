#![no_main]
use libfuzzer_sys::fuzz_target;
use p3s::SceneCodec;

fuzz_target!(|data: &[u8]| {
    // The preview-only fast path must never decompress a SHAPE/PALETTE
    // chunk it walks past.
    let _ = SceneCodec::get_preview(data);
});
