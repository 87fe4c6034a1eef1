//! Descriptors and descriptor tables.
//!
//! A descriptor is a slot in a [`DescriptorTable`] holding one resource view.
//! Shaders reach shader-visible slots by index ("bindless"), so a
//! descriptor's index is as much a part of its identity as its handles.

mod table;

pub use table::{AllocationPolicy, DescriptorTable};

use crate::backend::{GpuBuffer, GpuTexture};
use crate::types::{BufferSrvDescriptor, TextureFormat};

/// The kind of view a descriptor table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Constant buffer, shader resource and unordered access views.
    CbvSrvUav,
    /// Render target views.
    Rtv,
    /// Depth-stencil views.
    Dsv,
    /// Samplers.
    Sampler,
}

impl DescriptorKind {
    /// Whether tables of this kind can be bound for shader access.
    pub fn can_be_shader_visible(self) -> bool {
        matches!(self, Self::CbvSrvUav | Self::Sampler)
    }
}

/// CPU-side handle used to write a view into a slot or to name a render
/// target when recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CpuDescriptorHandle(pub u64);

/// GPU-side handle of a slot in a shader-visible table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuDescriptorHandle(pub u64);

/// One slot of a descriptor table.
///
/// A `Descriptor` is a borrowed value: copying it does not copy the slot,
/// and the table alone decides when the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub cpu: CpuDescriptorHandle,
    pub gpu: GpuDescriptorHandle,
    /// Slot index, or `-1` for [`Descriptor::NONE`].
    pub index: i32,
}

impl Descriptor {
    /// "No descriptor in this table."
    pub const NONE: Self = Self {
        cpu: CpuDescriptorHandle(0),
        gpu: GpuDescriptorHandle(0),
        index: -1,
    };

    pub fn is_valid(&self) -> bool {
        self.index >= 0
    }

    /// Index to hand to a shader, `-1` when unallocated.
    pub fn index_or_none(&self) -> i32 {
        self.index
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::NONE
    }
}

/// A view to write into a descriptor slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewDescriptor {
    /// Constant buffer view over `size` bytes at `address`.
    ConstantBuffer { address: u64, size: u64 },
    /// Shader resource view over a buffer.
    BufferSrv {
        buffer: GpuBuffer,
        desc: BufferSrvDescriptor,
    },
    /// Unordered access view over a buffer.
    BufferUav {
        buffer: GpuBuffer,
        desc: BufferSrvDescriptor,
    },
    /// Shader resource view over a 2D texture.
    TextureSrv {
        texture: GpuTexture,
        format: TextureFormat,
    },
    /// Unordered access view over a 2D texture.
    TextureUav {
        texture: GpuTexture,
        format: TextureFormat,
    },
    /// Render target view.
    RenderTarget {
        texture: GpuTexture,
        format: TextureFormat,
    },
    /// Depth-stencil view.
    DepthStencil {
        texture: GpuTexture,
        format: TextureFormat,
    },
}

impl ViewDescriptor {
    /// The table kind this view must be written into.
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::ConstantBuffer { .. }
            | Self::BufferSrv { .. }
            | Self::BufferUav { .. }
            | Self::TextureSrv { .. }
            | Self::TextureUav { .. } => DescriptorKind::CbvSrvUav,
            Self::RenderTarget { .. } => DescriptorKind::Rtv,
            Self::DepthStencil { .. } => DescriptorKind::Dsv,
        }
    }
}
