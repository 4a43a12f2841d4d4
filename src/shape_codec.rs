//! Encodes/decodes the sub-chunk stream inside one `SHAPE` chunk envelope.
//! The envelope itself is always uncompressed; the surrounding
//! `ChunkCodec` frame is what may be zlib-compressed.

use std::collections::BTreeMap;

use crate::color::ColorPalette;
use crate::error::{P3sError, Result};
use crate::low_level::byte_sink::ByteSink;
use crate::low_level::byte_stream::ByteStream;
use crate::low_level::chunk_ids::*;
use crate::shape::{block_count, BakedLight, Shape, ShapeSettings};
use crate::transform::{CollisionBox, Transform};

/// Everything recovered from one `SHAPE` envelope before the scene codec
/// resolves palette sharing and parent linkage. Mirrors [`Shape`]
/// but keeps the embedded palette as a plain value rather than the shared
/// `Rc<RefCell<_>>` the public `Shape` type carries.
#[derive(Debug)]
pub struct ShapeEnvelope {
    pub shape_id: u16,
    pub parent_id: u16,
    pub size: (u16, u16, u16),
    pub blocks: Vec<u8>,
    pub embedded_palette: Option<ColorPalette>,
    pub name: Option<String>,
    pub transform: Transform,
    pub pivot: [f32; 3],
    pub collision_box: CollisionBox,
    pub is_hidden_self: bool,
    pub points: BTreeMap<String, [f32; 3]>,
    pub point_rotations: BTreeMap<String, [f32; 3]>,
    pub baked_lighting: Option<Vec<BakedLight>>,
}

fn read_named_point<R: std::io::Read>(
    stream: &mut ByteStream<R>,
) -> Result<(String, [f32; 3])> {
    let name_len = stream.read_u8()? as usize;
    let name_bytes = stream.read_bytes_vec(name_len)?;
    let name = String::from_utf8_lossy(&name_bytes).into_owned();
    let value = stream.read_f32x3()?;
    Ok((name, value))
}

fn write_named_point(sink: &mut ByteSink, name: &str, value: [f32; 3]) -> Result<()> {
    let name_bytes = name.as_bytes();
    if name_bytes.len() > 255 {
        return Err(P3sError::BadChunk("point name longer than 255 bytes".into()));
    }
    sink.write_u8(name_bytes.len() as u8)?;
    sink.write_bytes(name_bytes)?;
    sink.write_f32x3(value)?;
    Ok(())
}

/// Decodes the sub-chunk stream of a single `SHAPE` envelope.
///
/// `parse_object` gates whether `OBJECT_COLLISION_BOX`/`OBJECT_IS_HIDDEN`
/// are actually materialized onto the result (the `Object` bit of
/// `AssetFilter`). When `false` their bytes are still consumed so the
/// envelope cursor stays correctly positioned, but the fields are left at
/// their defaults.
pub fn decode(payload: &[u8], settings: &ShapeSettings, parse_object: bool) -> Result<ShapeEnvelope> {
    let mut stream = ByteStream::new(payload);

    let mut size: Option<(u16, u16, u16)> = None;
    let mut blocks: Option<Vec<u8>> = None;
    let mut pending_blocks_raw: Option<Vec<u8>> = None;
    let mut pending_lighting_raw: Option<Vec<u8>> = None;
    let mut baked_lighting: Option<Vec<BakedLight>> = None;
    let mut embedded_palette = None;
    let mut name = None;
    let mut shape_id = 0u16;
    let mut parent_id = 0u16;
    let mut transform = Transform::default();
    let mut pivot = [0.0f32; 3];
    let mut collision_box = CollisionBox::default();
    let mut is_hidden_self = false;
    let mut points = BTreeMap::new();
    let mut point_rotations = BTreeMap::new();

    while stream.position() < payload.len() as u64 {
        let sub_id = stream.read_u8()?;

        // SHAPE_NAME is the one sub-chunk without a `u32 subSize` prefix
        // (a documented irregularity; never "fixed" on read).
        if sub_id == SHAPE_NAME {
            let name_len = stream.read_u8()? as usize;
            let name_bytes = stream.read_bytes_vec(name_len)?;
            name = Some(String::from_utf8_lossy(&name_bytes).into_owned());
            continue;
        }

        let is_known = matches!(
            sub_id,
            SHAPE_SIZE
                | SHAPE_BLOCKS
                | SHAPE_POINT
                | SHAPE_BAKED_LIGHTING
                | SHAPE_POINT_ROTATION
                | SHAPE_ID
                | SHAPE_PARENT_ID
                | SHAPE_TRANSFORM
                | SHAPE_PIVOT
                | SHAPE_PALETTE
                | OBJECT_COLLISION_BOX
                | OBJECT_IS_HIDDEN
        );

        if !is_known {
            let remaining = payload.len() as u64 - stream.position();
            if remaining < 4 {
                log::trace!("unknown sub-chunk id {sub_id} truncated tail, stopping envelope");
                break;
            }
            let size = stream.read_u32()? as u64;
            log::trace!("skipping unknown sub-chunk id {sub_id} ({size} bytes)");
            stream.skip(size)?;
            continue;
        }

        let sub_size = stream.read_u32()? as usize;
        let sub_bytes = stream.read_bytes_vec(sub_size)?;
        let mut sub = ByteStream::new(&sub_bytes[..]);

        match sub_id {
            SHAPE_SIZE => {
                let w = sub.read_u16()?;
                let h = sub.read_u16()?;
                let d = sub.read_u16()?;
                size = Some((w, h, d));
                let expected = block_count((w, h, d));

                if let Some(raw) = pending_blocks_raw.take() {
                    blocks = Some(decode_blocks(&raw, expected)?);
                }
                if let Some(raw) = pending_lighting_raw.take() {
                    baked_lighting = decode_lighting(&raw, expected, settings);
                }
            }
            SHAPE_BLOCKS => match size {
                Some((w, h, d)) => blocks = Some(decode_blocks(&sub_bytes, block_count((w, h, d)))?),
                None => pending_blocks_raw = Some(sub_bytes),
            },
            SHAPE_BAKED_LIGHTING => match size {
                Some((w, h, d)) => {
                    baked_lighting = decode_lighting(&sub_bytes, block_count((w, h, d)), settings)
                }
                None => pending_lighting_raw = Some(sub_bytes),
            },
            SHAPE_POINT => {
                let (name, value) = read_named_point(&mut sub)?;
                points.insert(name, value);
            }
            SHAPE_POINT_ROTATION => {
                let (name, value) = read_named_point(&mut sub)?;
                point_rotations.insert(name, value);
            }
            SHAPE_ID => shape_id = sub.read_u16()?,
            SHAPE_PARENT_ID => parent_id = sub.read_u16()?,
            SHAPE_TRANSFORM => {
                transform = Transform {
                    position: sub.read_f32x3()?,
                    rotation: sub.read_f32x3()?,
                    scale: sub.read_f32x3()?,
                }
            }
            SHAPE_PIVOT => pivot = sub.read_f32x3()?,
            SHAPE_PALETTE => embedded_palette = Some(ColorPalette::read_current(&mut sub)?),
            OBJECT_COLLISION_BOX => {
                let parsed = CollisionBox {
                    min: sub.read_f32x3()?,
                    max: sub.read_f32x3()?,
                };
                if parse_object {
                    collision_box = parsed;
                }
            }
            OBJECT_IS_HIDDEN => {
                let parsed = sub.read_u8()? != 0;
                if parse_object {
                    is_hidden_self = parsed;
                }
            }
            _ => unreachable!("covered by is_known above"),
        }
    }

    if pending_blocks_raw.is_some() {
        return Err(P3sError::BadChunk(
            "SHAPE_BLOCKS present but SHAPE_SIZE was never found in the envelope".into(),
        ));
    }

    let size = size.unwrap_or((0, 0, 0));
    let blocks = blocks.unwrap_or_else(|| vec![AIR; block_count(size)]);

    Ok(ShapeEnvelope {
        shape_id,
        parent_id,
        size,
        blocks,
        embedded_palette,
        name,
        transform,
        pivot,
        collision_box,
        is_hidden_self,
        points,
        point_rotations,
        baked_lighting,
    })
}

fn decode_blocks(raw: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    if raw.len() != expected_len {
        return Err(P3sError::BadChunk(format!(
            "SHAPE_BLOCKS length {} does not match w*h*d {}",
            raw.len(),
            expected_len
        )));
    }
    Ok(raw.to_vec())
}

fn decode_lighting(raw: &[u8], expected_cells: usize, settings: &ShapeSettings) -> Option<Vec<BakedLight>> {
    let expected_bytes = expected_cells * BakedLight::SIZE;
    if raw.len() != expected_bytes {
        log::warn!(
            "baked lighting size {} does not match w*h*d*{} = {}, dropping",
            raw.len(),
            BakedLight::SIZE,
            expected_bytes
        );
        return None;
    }
    if !settings.materialize_baked_lighting {
        return None;
    }
    Some(
        raw.chunks_exact(BakedLight::SIZE)
            .map(|c| BakedLight {
                r: c[0],
                g: c[1],
                b: c[2],
                ambient_occlusion: c[3],
            })
            .collect(),
    )
}

/// Crops a dense `w*h*d` grid down to the sub-box `[start, end)` of the
/// original `full_size` grid, keeping the x-major/y/z ordering used by
/// coordinate normalization.
pub fn crop_volume<T: Copy>(
    data: &[T],
    full_size: (u16, u16, u16),
    start: [u16; 3],
    end: [u16; 3],
) -> Vec<T> {
    let (w, h, _d) = full_size;
    let cropped_size = [end[0] - start[0], end[1] - start[1], end[2] - start[2]];
    let mut out = Vec::with_capacity(cropped_size[0] as usize * cropped_size[1] as usize * cropped_size[2] as usize);

    for z in start[2]..end[2] {
        for y in start[1]..end[1] {
            for x in start[0]..end[0] {
                let index = x as usize + w as usize * (y as usize + h as usize * z as usize);
                out.push(data[index]);
            }
        }
    }

    out
}

/// Remaps every non-`AIR` byte through `permutation` (in-memory palette
/// index -> serialized palette index), leaving `AIR` untouched (the
/// palette remapping applied on write).
pub fn remap_blocks(blocks: &[u8], permutation: &[u8]) -> Result<Vec<u8>> {
    blocks
        .iter()
        .map(|&b| {
            if b == AIR {
                Ok(AIR)
            } else {
                permutation.get(b as usize).copied().ok_or_else(|| {
                    P3sError::BadChunk(format!("block index {b} has no palette entry"))
                })
            }
        })
        .collect()
}

/// Encodes a `Shape` as an uncompressed sub-chunk stream, given the
/// `shapeId`/`parentId` the scene codec assigned it, the serialized
/// (canonical-order) palette it should embed (`None` when it shares the
/// root's palette), and the permutation its own blocks should be remapped
/// through.
pub fn encode(
    shape: &Shape,
    shape_id: u16,
    parent_id: u16,
    embed_palette: Option<&ColorPalette>,
    permutation: &[u8],
) -> Result<Vec<u8>> {
    let mut sink = ByteSink::new();

    sink.write_u8(SHAPE_ID)?;
    sink.write_u32(2)?;
    sink.write_u16(shape_id)?;

    sink.write_u8(SHAPE_PARENT_ID)?;
    sink.write_u32(2)?;
    sink.write_u16(parent_id)?;

    if let Some(name) = &shape.name {
        let name_bytes = name.as_bytes();
        if name_bytes.len() > 255 {
            return Err(P3sError::BadChunk("shape name longer than 255 bytes".into()));
        }
        sink.write_u8(SHAPE_NAME)?;
        sink.write_u8(name_bytes.len() as u8)?;
        sink.write_bytes(name_bytes)?;
    }

    let (start, end) = shape.occupied_aabb().unwrap_or(([0, 0, 0], [shape.size.0, shape.size.1, shape.size.2]));
    let cropped_size = (end[0] - start[0], end[1] - start[1], end[2] - start[2]);

    sink.write_u8(SHAPE_SIZE)?;
    sink.write_u32(6)?;
    sink.write_u16(cropped_size.0)?;
    sink.write_u16(cropped_size.1)?;
    sink.write_u16(cropped_size.2)?;

    let cropped_blocks = crop_volume(&shape.blocks, shape.size, start, end);
    let remapped_blocks = remap_blocks(&cropped_blocks, permutation)?;
    sink.write_u8(SHAPE_BLOCKS)?;
    sink.write_u32(remapped_blocks.len() as u32)?;
    sink.write_bytes(&remapped_blocks)?;

    if let Some(lighting) = &shape.baked_lighting {
        let cropped_lighting = crop_volume(lighting, shape.size, start, end);
        let mut bytes = Vec::with_capacity(cropped_lighting.len() * BakedLight::SIZE);
        for l in cropped_lighting {
            bytes.extend_from_slice(&[l.r, l.g, l.b, l.ambient_occlusion]);
        }
        sink.write_u8(SHAPE_BAKED_LIGHTING)?;
        sink.write_u32(bytes.len() as u32)?;
        sink.write_bytes(&bytes)?;
    }

    let start_f = [start[0] as f32, start[1] as f32, start[2] as f32];

    sink.write_u8(SHAPE_TRANSFORM)?;
    sink.write_u32(36)?;
    sink.write_f32x3(shape.transform.position)?;
    sink.write_f32x3(shape.transform.rotation)?;
    sink.write_f32x3(shape.transform.scale)?;

    sink.write_u8(SHAPE_PIVOT)?;
    sink.write_u32(12)?;
    sink.write_f32x3(sub_vec3(shape.pivot, start_f))?;

    if let Some(palette) = embed_palette {
        let mut palette_sink = ByteSink::new();
        palette.write_current(&mut palette_sink)?;
        let palette_bytes = palette_sink.into_bytes();
        sink.write_u8(SHAPE_PALETTE)?;
        sink.write_u32(palette_bytes.len() as u32)?;
        sink.write_bytes(&palette_bytes)?;
    }

    sink.write_u8(OBJECT_COLLISION_BOX)?;
    sink.write_u32(24)?;
    sink.write_f32x3(shape.collision_box.min)?;
    sink.write_f32x3(shape.collision_box.max)?;

    sink.write_u8(OBJECT_IS_HIDDEN)?;
    sink.write_u32(1)?;
    sink.write_u8(shape.is_hidden_self as u8)?;

    for (name, position) in &shape.points {
        sink.write_u8(SHAPE_POINT)?;
        let mut point_sink = ByteSink::new();
        write_named_point(&mut point_sink, name, sub_vec3(*position, start_f))?;
        let bytes = point_sink.into_bytes();
        sink.write_u32(bytes.len() as u32)?;
        sink.write_bytes(&bytes)?;
    }

    for (name, rotation) in &shape.point_rotations {
        sink.write_u8(SHAPE_POINT_ROTATION)?;
        let mut point_sink = ByteSink::new();
        write_named_point(&mut point_sink, name, *rotation)?;
        let bytes = point_sink.into_bytes();
        sink.write_u32(bytes.len() as u32)?;
        sink.write_bytes(&bytes)?;
    }

    Ok(sink.into_bytes())
}

fn sub_vec3(v: [f32; 3], offset: [f32; 3]) -> [f32; 3] {
    [v[0] - offset[0], v[1] - offset[1], v[2] - offset[2]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn identity_permutation(n: usize) -> Vec<u8> {
        (0..n as u8).collect()
    }

    #[test]
    fn round_trips_size_and_blocks() {
        let mut shape = Shape::new((2, 1, 1));
        shape.blocks = vec![0, AIR];
        shape.palette = Rc::new(RefCell::new(ColorPalette {
            colors: vec![crate::color::Rgba::new(255, 0, 0, 255)],
            emissive: vec![false],
        }));

        let palette = shape.palette.borrow().clone();
        let encoded = encode(&shape, 1, 0, Some(&palette), &identity_permutation(1)).unwrap();

        let decoded = decode(&encoded, &ShapeSettings::default(), true).unwrap();
        assert_eq!(decoded.size, (2, 1, 1));
        assert_eq!(decoded.blocks, vec![0, AIR]);
        assert_eq!(decoded.shape_id, 1);
        assert_eq!(decoded.parent_id, 0);
        assert_eq!(decoded.embedded_palette.unwrap().colors.len(), 1);
    }

    #[test]
    fn blocks_before_size_are_buffered() {
        let mut sink = ByteSink::new();
        sink.write_u8(SHAPE_BLOCKS).unwrap();
        sink.write_u32(2).unwrap();
        sink.write_bytes(&[5, AIR]).unwrap();

        sink.write_u8(SHAPE_SIZE).unwrap();
        sink.write_u32(6).unwrap();
        sink.write_u16(2).unwrap();
        sink.write_u16(1).unwrap();
        sink.write_u16(1).unwrap();

        let decoded = decode(&sink.into_bytes(), &ShapeSettings::default(), true).unwrap();
        assert_eq!(decoded.blocks, vec![5, AIR]);
    }

    #[test]
    fn blocks_without_size_anywhere_is_bad_chunk() {
        let mut sink = ByteSink::new();
        sink.write_u8(SHAPE_BLOCKS).unwrap();
        sink.write_u32(1).unwrap();
        sink.write_bytes(&[0]).unwrap();

        let err = decode(&sink.into_bytes(), &ShapeSettings::default(), true).unwrap_err();
        assert!(matches!(err, P3sError::BadChunk(_)));
    }

    #[test]
    fn mismatched_baked_lighting_is_dropped_not_fatal() {
        let mut sink = ByteSink::new();
        sink.write_u8(SHAPE_SIZE).unwrap();
        sink.write_u32(6).unwrap();
        sink.write_u16(1).unwrap();
        sink.write_u16(1).unwrap();
        sink.write_u16(1).unwrap();

        sink.write_u8(SHAPE_BAKED_LIGHTING).unwrap();
        sink.write_u32(3).unwrap(); // wrong: should be 4 bytes for 1 cell
        sink.write_bytes(&[1, 2, 3]).unwrap();

        let decoded = decode(&sink.into_bytes(), &ShapeSettings::default(), true).unwrap();
        assert!(decoded.baked_lighting.is_none());
    }

    #[test]
    fn unknown_sub_chunk_is_skipped() {
        let mut sink = ByteSink::new();
        sink.write_u8(200).unwrap();
        sink.write_u32(3).unwrap();
        sink.write_bytes(&[1, 2, 3]).unwrap();

        sink.write_u8(SHAPE_ID).unwrap();
        sink.write_u32(2).unwrap();
        sink.write_u16(42).unwrap();

        let decoded = decode(&sink.into_bytes(), &ShapeSettings::default(), true).unwrap();
        assert_eq!(decoded.shape_id, 42);
    }

    #[test]
    fn name_sub_chunk_has_no_size_prefix() {
        let mut sink = ByteSink::new();
        sink.write_u8(SHAPE_NAME).unwrap();
        sink.write_u8(5).unwrap();
        sink.write_bytes(b"torch").unwrap();

        let decoded = decode(&sink.into_bytes(), &ShapeSettings::default(), true).unwrap();
        assert_eq!(decoded.name.as_deref(), Some("torch"));
    }

    #[test]
    fn coordinate_framing_normalizes_to_aabb_minimum() {
        let mut shape = Shape::new((10, 10, 10));
        let i = shape.block_index(5, 2, 7);
        shape.blocks[i] = 0;
        shape.pivot = [5.5, 2.5, 7.5];
        shape.points.insert("foo".into(), [5.5, 2.5, 7.5]);
        shape.palette = Rc::new(RefCell::new(ColorPalette {
            colors: vec![crate::color::Rgba::new(1, 1, 1, 255)],
            emissive: vec![false],
        }));

        let palette = shape.palette.borrow().clone();
        let encoded = encode(&shape, 1, 0, Some(&palette), &identity_permutation(1)).unwrap();
        let decoded = decode(&encoded, &ShapeSettings::default(), true).unwrap();

        assert_eq!(decoded.size, (1, 1, 1));
        assert_eq!(decoded.blocks, vec![0]);
        assert_eq!(decoded.pivot, [0.5, 0.5, 0.5]);
        assert_eq!(decoded.points["foo"], [0.5, 0.5, 0.5]);
    }
}
