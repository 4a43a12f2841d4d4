#![no_main]
use libfuzzer_sys::fuzz_target;
use p3s::shape_codec;
use p3s::ShapeSettings;

fuzz_target!(|data: &[u8]| {
    // Check that it decodes (or fails cleanly) without a panic, with and
    // without the Object sub-chunks being materialized.
    let _ = shape_codec::decode(data, &ShapeSettings::default(), true);
    let _ = shape_codec::decode(data, &ShapeSettings::default(), false);
});
