//! GPU buffer resource.

use crate::backend::{GpuBuffer, GpuResource};
use crate::command::BarrierTarget;
use crate::descriptor::Descriptor;
use crate::types::{BufferDescriptor, IndexBufferView, IndexFormat, VertexBufferView};

/// A committed GPU buffer together with the views created for it.
///
/// Buffers are created by [`Device::create_buffer`](crate::Device::create_buffer)
/// and are owned by one holder. View slots start unallocated
/// ([`Descriptor::NONE`]) and are filled by the device's `create_*_view`
/// calls.
///
/// # Example
///
/// ```ignore
/// let mut vertices = device.create_buffer(
///     &BufferDescriptor::new(1024, BufferUsage::VERTEX | BufferUsage::SHADER_RESOURCE),
/// )?;
/// device.create_shader_resource_view(&mut vertices, BufferSrvDescriptor::structured(32, 32))?;
/// let bindless_index = vertices.srv().index_or_none();
/// ```
pub struct Buffer {
    gpu: GpuBuffer,
    descriptor: BufferDescriptor,
    pub(crate) srv: Descriptor,
    pub(crate) uav: Descriptor,
    pub(crate) cbv: Descriptor,
}

impl Buffer {
    pub(crate) fn new(gpu: GpuBuffer, descriptor: BufferDescriptor) -> Self {
        Self {
            gpu,
            descriptor,
            srv: Descriptor::NONE,
            uav: Descriptor::NONE,
            cbv: Descriptor::NONE,
        }
    }

    pub fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }

    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// GPU virtual address of the first byte.
    pub fn gpu_address(&self) -> u64 {
        self.gpu.gpu_address()
    }

    pub fn srv(&self) -> Descriptor {
        self.srv
    }

    pub fn uav(&self) -> Descriptor {
        self.uav
    }

    pub fn cbv(&self) -> Descriptor {
        self.cbv
    }

    /// View of the whole buffer as vertices of `stride` bytes.
    pub fn vertex_buffer_view(&self, stride: u32) -> VertexBufferView {
        VertexBufferView {
            buffer_location: self.gpu_address(),
            size_in_bytes: self.size() as u32,
            stride_in_bytes: stride,
        }
    }

    /// View of the whole buffer as indices.
    pub fn index_buffer_view(&self, format: IndexFormat) -> IndexBufferView {
        IndexBufferView {
            buffer_location: self.gpu_address(),
            size_in_bytes: self.size() as u32,
            format,
        }
    }
}

impl AsRef<GpuBuffer> for Buffer {
    fn as_ref(&self) -> &GpuBuffer {
        &self.gpu
    }
}

impl BarrierTarget for Buffer {
    fn barrier_resource(&self) -> GpuResource {
        GpuResource::Buffer(self.gpu.clone())
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("heap", &self.descriptor.heap)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);
