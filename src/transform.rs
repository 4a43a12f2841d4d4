//! Local transform and custom collision box data.

/// A shape's local transform relative to its parent: position, Euler XYZ
/// rotation in radians, and scale. Written directly without normalization
/// (these are never adjusted by the codec itself).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

/// An axis-aligned custom collision box, `min`/`max` in local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl CollisionBox {
    /// The collider implied when `OBJECT_COLLISION_BOX` is absent: omitting
    /// it yields this default rather than an empty box. Covers exactly one
    /// unit block, matching the shape's natural AABB.
    pub const DEFAULT: CollisionBox = CollisionBox {
        min: [0.0, 0.0, 0.0],
        max: [1.0, 1.0, 1.0],
    };
}

impl Default for CollisionBox {
    fn default() -> Self {
        CollisionBox::DEFAULT
    }
}
