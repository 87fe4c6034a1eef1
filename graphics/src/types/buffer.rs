//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// How a buffer will be bound. Used for validation and debug output.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be viewed as a constant buffer.
        const CONSTANT = 1 << 2;
        /// Buffer can be viewed as a shader resource (structured or raw).
        const SHADER_RESOURCE = 1 << 3;
        /// Buffer can be viewed for unordered access.
        const UNORDERED_ACCESS = 1 << 4;
        /// Buffer can be the source of a copy.
        const COPY_SRC = 1 << 5;
        /// Buffer can be the destination of a copy.
        const COPY_DST = 1 << 6;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Which memory pool backs a buffer.
///
/// Only [`HeapType::Upload`] and [`HeapType::Readback`] buffers are mapped
/// and can be accessed from the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeapType {
    /// Device-local memory. Written only through copies.
    #[default]
    Default,
    /// Host-visible, write-combined memory the GPU reads from.
    Upload,
    /// Host-visible memory the GPU writes into for CPU readback.
    Readback,
}

impl HeapType {
    /// Returns true if the CPU can map memory from this heap.
    pub fn is_host_visible(self) -> bool {
        matches!(self, Self::Upload | Self::Readback)
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
    /// Memory pool.
    pub heap: HeapType,
}

impl BufferDescriptor {
    /// Create a device-local buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
            heap: HeapType::Default,
        }
    }

    /// Create a descriptor for a mapped upload buffer.
    pub fn upload(size: u64) -> Self {
        Self {
            label: None,
            size,
            usage: BufferUsage::COPY_SRC | BufferUsage::CONSTANT | BufferUsage::VERTEX,
            heap: HeapType::Upload,
        }
    }

    /// Create a descriptor for a mapped readback buffer.
    pub fn readback(size: u64) -> Self {
        Self {
            label: None,
            size,
            usage: BufferUsage::COPY_DST,
            heap: HeapType::Readback,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the memory pool.
    pub fn with_heap(mut self, heap: HeapType) -> Self {
        self.heap = heap;
        self
    }

    /// Label used in logs and errors.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed buffer>")
    }
}
