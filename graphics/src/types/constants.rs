//! Shader-visible constant layouts.
//!
//! These structs are written verbatim into constant buffers and linear
//! allocations, so they are `#[repr(C)]` and [`bytemuck::Pod`].

use bytemuck::{Pod, Zeroable};

/// Required alignment (and size granularity) of constant buffer views.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Round a constant payload size up to [`CONSTANT_BUFFER_ALIGNMENT`].
pub fn constant_buffer_size(size: u64) -> u64 {
    (size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// Column-major 4x4 identity.
const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Camera matrices, rewritten once per frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneConstants {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
}

impl Default for SceneConstants {
    fn default() -> Self {
        Self {
            view: IDENTITY,
            projection: IDENTITY,
            view_projection: IDENTITY,
        }
    }
}

/// Per-object transforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
    pub inverse_world: [[f32; 4]; 4],
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self {
            world: IDENTITY,
            inverse_world: IDENTITY,
        }
    }
}

/// Bindless texture indices of a material. `-1` means "no texture".
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct MaterialIndices {
    pub diffuse_texture_index: i32,
    pub metallic_roughness_texture_index: i32,
}

impl Default for MaterialIndices {
    fn default() -> Self {
        Self {
            diffuse_texture_index: -1,
            metallic_roughness_texture_index: -1,
        }
    }
}

/// Indices a draw passes as root constants so the shader can fetch
/// everything it needs from the shared descriptor table. `-1` means unset.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RenderResourceIndices {
    pub vertex_buffer_index: i32,
    pub scene_buffer_index: i32,
    pub diffuse_texture_index: i32,
    pub metallic_roughness_texture_index: i32,
}

impl Default for RenderResourceIndices {
    fn default() -> Self {
        Self {
            vertex_buffer_index: -1,
            scene_buffer_index: -1,
            diffuse_texture_index: -1,
            metallic_roughness_texture_index: -1,
        }
    }
}

impl RenderResourceIndices {
    /// Root-constant words, in declaration order.
    pub fn as_root_constants(&self) -> [u32; 4] {
        bytemuck::cast(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_buffer_size_rounds_up() {
        assert_eq!(constant_buffer_size(1), 256);
        assert_eq!(constant_buffer_size(256), 256);
        assert_eq!(
            constant_buffer_size(std::mem::size_of::<SceneConstants>() as u64),
            256
        );
    }

    #[test]
    fn test_indices_default_to_none() {
        let indices = RenderResourceIndices::default();
        assert_eq!(indices.as_root_constants(), [u32::MAX; 4]);
        assert_eq!(MaterialIndices::default().diffuse_texture_index, -1);
    }
}
