#![no_main]
use libfuzzer_sys::fuzz_target;
use p3s::low_level::legacy_palettes::BuiltinLegacyPalettes;
use p3s::{AssetFilter, SceneCodec, ShapeSettings};

fuzz_target!(|data: &[u8]| {
    let _ = SceneCodec::load_assets(
        data,
        &BuiltinLegacyPalettes,
        AssetFilter::ANY,
        &ShapeSettings::default(),
    );
});
