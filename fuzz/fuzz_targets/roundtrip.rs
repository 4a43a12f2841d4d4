#![no_main]
use libfuzzer_sys::fuzz_target;
use p3s::low_level::legacy_palettes::BuiltinLegacyPalettes;
use p3s::{AssetFilter, ColorPalette, Rgba, SceneCodec, Shape, ShapeSettings};

fuzz_target!(|data: &[u8]| {
    let Some((dims, rest)) = data.split_at_checked(3) else {
        return;
    };
    let w = (dims[0] % 8 + 1) as u16;
    let h = (dims[1] % 8 + 1) as u16;
    let d = (dims[2] % 8 + 1) as u16;
    let cell_count = w as usize * h as usize * d as usize;

    let Some((palette_bytes, block_bytes)) = rest.split_at_checked(4) else {
        return;
    };
    let palette_len = (palette_bytes[0] % 4 + 1) as usize;
    if block_bytes.len() < cell_count {
        return;
    }

    let mut shape = Shape::new((w, h, d));
    shape.palette = std::rc::Rc::new(std::cell::RefCell::new(ColorPalette {
        colors: (0..palette_len)
            .map(|i| Rgba::new(i as u8, (i * 7) as u8, (i * 13) as u8, 255))
            .collect(),
        emissive: vec![false; palette_len],
    }));
    for (cell, &b) in shape.blocks.iter_mut().zip(block_bytes) {
        *cell = if b == 0xFF { 0xFF } else { b % palette_len as u8 };
    }

    let Ok(buffer) = SceneCodec::save_shape_to_buffer(&shape, None, None) else {
        return;
    };

    let assets = SceneCodec::load_assets(
        &buffer[..],
        &BuiltinLegacyPalettes,
        AssetFilter::ANY,
        &ShapeSettings::default(),
    )
    .expect("a buffer this crate just wrote must load back");
    assert_eq!(assets.len(), 1);
});
