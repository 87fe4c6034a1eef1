//! GPU backend abstraction layer.
//!
//! Everything above this module (queues, command lists, descriptor tables,
//! the frame ring) talks to the GPU only through the [`GpuBackend`] trait and
//! the opaque handles defined here.
//!
//! # Available Backends
//!
//! - `dummy`: a software GPU. Submissions run on a worker thread in queue
//!   order, fences complete only after the work before them has executed, and
//!   copies and clears act on host memory so results can be read back.
//!
//! A hardware backend adds a variant to each handle enum and an arm to
//! [`create_backend`].

pub mod dummy;

use std::sync::Arc;

use crate::command::Command;
use crate::descriptor::{DescriptorKind, ViewDescriptor};
use crate::error::GraphicsError;
use crate::render_state::{GraphicsPipelineDescriptor, RootParameters};
use crate::types::{BufferDescriptor, ResourceStates, TextureDescriptor};

pub use dummy::{DummyBackend, DummyConfig, DummyStats};

/// Implements identity-based `Debug`, `PartialEq` and `Eq` for a handle enum.
macro_rules! handle_identity {
    ($handle:ident) => {
        impl std::fmt::Debug for $handle {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    Self::Dummy(inner) => {
                        write!(f, concat!(stringify!($handle), "::Dummy({})"), inner.id())
                    }
                }
            }
        }

        impl PartialEq for $handle {
            fn eq(&self, other: &Self) -> bool {
                self.id() == other.id()
            }
        }

        impl Eq for $handle {}
    };
}

/// Handle to a GPU buffer resource.
#[derive(Clone)]
pub enum GpuBuffer {
    /// Software buffer backed by host memory.
    Dummy(Arc<dummy::DummyResource>),
}

impl GpuBuffer {
    /// Unique identifier within the backend.
    pub fn id(&self) -> u64 {
        match self {
            Self::Dummy(resource) => resource.id(),
        }
    }

    /// GPU virtual address of the first byte.
    pub fn gpu_address(&self) -> u64 {
        match self {
            Self::Dummy(resource) => resource.gpu_address(),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::Dummy(resource) => resource.size(),
        }
    }
}

handle_identity!(GpuBuffer);

impl AsRef<GpuBuffer> for GpuBuffer {
    fn as_ref(&self) -> &GpuBuffer {
        self
    }
}

/// Handle to a GPU texture resource.
#[derive(Clone)]
pub enum GpuTexture {
    /// Software texture backed by tightly packed host memory.
    Dummy(Arc<dummy::DummyResource>),
}

impl GpuTexture {
    /// Unique identifier within the backend.
    pub fn id(&self) -> u64 {
        match self {
            Self::Dummy(resource) => resource.id(),
        }
    }
}

handle_identity!(GpuTexture);

impl AsRef<GpuTexture> for GpuTexture {
    fn as_ref(&self) -> &GpuTexture {
        self
    }
}

/// Any resource a barrier can transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuResource {
    Buffer(GpuBuffer),
    Texture(GpuTexture),
}

impl GpuResource {
    pub fn id(&self) -> u64 {
        match self {
            Self::Buffer(buffer) => buffer.id(),
            Self::Texture(texture) => texture.id(),
        }
    }
}

/// Handle to a block of descriptor slots.
#[derive(Clone)]
pub enum GpuDescriptorHeap {
    Dummy(Arc<dummy::DummyDescriptorHeap>),
}

impl GpuDescriptorHeap {
    pub fn id(&self) -> u64 {
        match self {
            Self::Dummy(heap) => heap.id(),
        }
    }

    /// CPU handle of slot zero.
    pub fn cpu_start(&self) -> u64 {
        match self {
            Self::Dummy(heap) => heap.cpu_start(),
        }
    }

    /// GPU handle of slot zero. Zero for heaps that are not shader visible.
    pub fn gpu_start(&self) -> u64 {
        match self {
            Self::Dummy(heap) => heap.gpu_start(),
        }
    }

    /// Distance in bytes between consecutive slot handles.
    pub fn stride(&self) -> u64 {
        match self {
            Self::Dummy(heap) => heap.stride(),
        }
    }
}

handle_identity!(GpuDescriptorHeap);

/// Handle to a compiled root signature.
#[derive(Clone)]
pub enum GpuRootSignature {
    Dummy(Arc<dummy::DummyObject>),
}

impl GpuRootSignature {
    pub fn id(&self) -> u64 {
        match self {
            Self::Dummy(object) => object.id(),
        }
    }
}

handle_identity!(GpuRootSignature);

/// Handle to a compiled graphics pipeline state object.
#[derive(Clone)]
pub enum GpuPipelineState {
    Dummy(Arc<dummy::DummyObject>),
}

impl GpuPipelineState {
    pub fn id(&self) -> u64 {
        match self {
            Self::Dummy(object) => object.id(),
        }
    }
}

handle_identity!(GpuPipelineState);

/// Handle to the memory pool command lists record into.
///
/// An allocator may only be reset once every submission recorded from it has
/// finished executing.
#[derive(Clone)]
pub enum GpuCommandAllocator {
    Dummy(Arc<dummy::DummyCommandAllocator>),
}

impl GpuCommandAllocator {
    pub fn id(&self) -> u64 {
        match self {
            Self::Dummy(allocator) => allocator.id(),
        }
    }
}

handle_identity!(GpuCommandAllocator);

/// The operations the frame pipeline needs from a GPU API.
///
/// A backend owns exactly one direct queue and one fence on it. Submissions
/// and signals execute in the order they are issued.
pub trait GpuBackend: Send + Sync + 'static {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Create a committed buffer. Upload buffers start in
    /// [`ResourceStates::GENERIC_READ`], readback buffers in
    /// [`ResourceStates::COPY_DEST`], everything else in `COMMON`.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError>;

    /// Create a committed 2D texture in `initial_state`.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_state: ResourceStates,
    ) -> Result<GpuTexture, GraphicsError>;

    /// Create a heap of `capacity` descriptor slots of one kind.
    fn create_descriptor_heap(
        &self,
        kind: DescriptorKind,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<GpuDescriptorHeap, GraphicsError>;

    /// Write a view into slot `index` of `heap`.
    fn write_descriptor(
        &self,
        heap: &GpuDescriptorHeap,
        index: u32,
        view: &ViewDescriptor,
    ) -> Result<(), GraphicsError>;

    fn create_root_signature(
        &self,
        parameters: &RootParameters,
    ) -> Result<GpuRootSignature, GraphicsError>;

    fn create_pipeline_state(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<GpuPipelineState, GraphicsError>;

    fn create_command_allocator(&self, label: &str) -> Result<GpuCommandAllocator, GraphicsError>;

    /// Recycle an allocator's memory.
    ///
    /// Fails with [`GraphicsError::SynchronizationViolation`] if the GPU may
    /// still be executing commands recorded from it.
    fn reset_command_allocator(&self, allocator: &GpuCommandAllocator)
    -> Result<(), GraphicsError>;

    /// Write into a host-visible buffer.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8])
    -> Result<(), GraphicsError>;

    /// Read from a host-visible buffer.
    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64)
    -> Result<Vec<u8>, GraphicsError>;

    /// Queue a closed command list for execution.
    fn submit(
        &self,
        allocator: &GpuCommandAllocator,
        commands: Vec<Command>,
    ) -> Result<(), GraphicsError>;

    /// Queue a fence signal. The fence reaches `value` once everything
    /// submitted before this call has executed.
    fn signal(&self, value: u64) -> Result<(), GraphicsError>;

    /// Highest fence value the GPU has reached.
    fn completed_value(&self) -> u64;

    /// Block until the fence reaches `value`.
    fn wait_for_value(&self, value: u64) -> Result<(), GraphicsError>;
}

/// Backend selection for [`create_backend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Pick the best backend compiled in.
    #[default]
    Auto,
    /// Software GPU.
    Dummy,
}

/// Create a backend of the requested type.
pub fn create_backend(backend_type: BackendType) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    match backend_type {
        BackendType::Auto => {
            log::info!("No hardware backend compiled in, falling back to dummy backend");
            Ok(Arc::new(DummyBackend::new()))
        }
        BackendType::Dummy => {
            log::info!("Using dummy backend");
            Ok(Arc::new(DummyBackend::new()))
        }
    }
}
