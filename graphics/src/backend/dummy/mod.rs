//! Software GPU backend for testing and development.
//!
//! This backend needs no GPU hardware, but it is not a stub. Resources live
//! in host memory, submissions execute on a worker thread in queue order,
//! and a fence value completes only after everything queued before its
//! signal has executed. Copies and clears really move bytes, so tests can
//! upload data and read it back.
//!
//! It also checks what real drivers only check with a debug layer: barrier
//! `before` states against the tracked resource state, draws without a bound
//! pipeline or root signature, and allocator resets while the GPU may still
//! be reading them. Each failure is logged and counted in [`DummyStats`].
//!
//! ```ignore
//! let backend = Arc::new(DummyBackend::new());
//! backend.pause();           // hold GPU progress
//! let fence = queue.signal()?;
//! assert!(!queue.is_complete(fence));
//! backend.resume();
//! queue.wait_for_fence(fence)?;
//! ```

mod memory;
mod timeline;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::command::Command;
use crate::descriptor::{DescriptorKind, ViewDescriptor};
use crate::error::GraphicsError;
use crate::memory::align_up;
use crate::render_state::{GraphicsPipelineDescriptor, RootParameters};
use crate::types::{BufferDescriptor, HeapType, ResourceStates, TextureDescriptor};

use super::{
    GpuBackend, GpuBuffer, GpuCommandAllocator, GpuDescriptorHeap, GpuPipelineState,
    GpuRootSignature, GpuTexture,
};

pub use memory::{DummyResource, DummyResourceKind};

use memory::{GPU_ADDRESS_BASE, MemoryBudget, RESOURCE_PLACEMENT_ALIGNMENT};
use timeline::{Timeline, TimelineOp};

/// Distance between consecutive descriptor handles.
const DESCRIPTOR_STRIDE: u64 = 32;

/// CPU descriptor handles start here, so a zero handle is never valid.
const CPU_DESCRIPTOR_BASE: u64 = 0x1000;

/// GPU descriptor handles of shader-visible heaps start here.
const GPU_DESCRIPTOR_BASE: u64 = 0x10_0000_0000;

/// Configuration of the simulated GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DummyConfig {
    /// Bytes of video memory. Creation fails once resources would exceed it.
    pub memory_budget: u64,
    /// Time the worker spends on each submission before executing it.
    pub latency: Duration,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            memory_budget: 1024 * 1024 * 1024,
            latency: Duration::ZERO,
        }
    }
}

impl DummyConfig {
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = bytes;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Counters of the work the simulated GPU has executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyStats {
    /// Command lists executed.
    pub submissions: u64,
    /// Fence signals queued.
    pub signals: u64,
    /// Barrier commands executed, each a batch of one or more transitions.
    pub barrier_batches: u64,
    /// Individual transitions executed.
    pub barriers: u64,
    pub draws: u64,
    pub copies: u64,
    pub clears: u64,
    /// Misuse detected while creating, resetting or executing.
    pub validation_errors: u64,
}

/// A block of descriptor slots in host memory.
pub struct DummyDescriptorHeap {
    id: u64,
    kind: DescriptorKind,
    cpu_start: u64,
    gpu_start: u64,
    slots: Mutex<Vec<Option<ViewDescriptor>>>,
}

impl DummyDescriptorHeap {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn cpu_start(&self) -> u64 {
        self.cpu_start
    }

    pub fn gpu_start(&self) -> u64 {
        self.gpu_start
    }

    pub fn stride(&self) -> u64 {
        DESCRIPTOR_STRIDE
    }

    pub fn capacity(&self) -> u32 {
        self.slots.lock().len() as u32
    }

    /// The view written at a CPU handle inside this heap.
    fn view_at(&self, cpu_handle: u64) -> Option<ViewDescriptor> {
        let offset = cpu_handle.checked_sub(self.cpu_start)?;
        if offset % DESCRIPTOR_STRIDE != 0 {
            return None;
        }
        let slots = self.slots.lock();
        slots.get((offset / DESCRIPTOR_STRIDE) as usize)?.clone()
    }
}

/// A compiled object with no host-side contents: root signatures and
/// pipeline states.
#[derive(Debug)]
pub struct DummyObject {
    id: u64,
    label: String,
}

impl DummyObject {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Command memory, tracked by how many of its submissions are still queued.
#[derive(Debug)]
pub struct DummyCommandAllocator {
    id: u64,
    label: String,
    in_flight: AtomicU64,
    /// Fence value covering the newest submission.
    covering_fence: AtomicU64,
}

impl DummyCommandAllocator {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn finish_one(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// State shared with the worker thread.
struct DummyShared {
    timeline: Timeline,
    stats: Mutex<DummyStats>,
    heaps: Mutex<Vec<Weak<DummyDescriptorHeap>>>,
}

impl DummyShared {
    fn resolve_view(&self, cpu_handle: u64) -> Option<ViewDescriptor> {
        self.heaps
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .find_map(|heap| heap.view_at(cpu_handle))
    }
}

/// Software GPU with one direct queue and one fence.
pub struct DummyBackend {
    config: DummyConfig,
    shared: Arc<DummyShared>,
    budget: Arc<MemoryBudget>,
    sender: Sender<TimelineOp>,
    worker: Option<JoinHandle<()>>,
    next_id: AtomicU64,
    next_gpu_address: AtomicU64,
    next_cpu_descriptor: AtomicU64,
    next_gpu_descriptor: AtomicU64,
    last_signal_queued: AtomicU64,
}

impl DummyBackend {
    pub fn new() -> Self {
        Self::with_config(DummyConfig::default())
    }

    pub fn with_config(config: DummyConfig) -> Self {
        let shared = Arc::new(DummyShared {
            timeline: Timeline::default(),
            stats: Mutex::new(DummyStats::default()),
            heaps: Mutex::new(Vec::new()),
        });
        let (sender, receiver) = mpsc::channel();
        let worker = {
            let shared = shared.clone();
            let latency = config.latency;
            std::thread::spawn(move || timeline::run(receiver, shared, latency))
        };

        log::debug!(
            "DummyBackend: created with {} MiB budget, {:?} latency",
            config.memory_budget / (1024 * 1024),
            config.latency
        );

        Self {
            config,
            shared,
            budget: Arc::new(MemoryBudget::new(config.memory_budget)),
            sender,
            worker: Some(worker),
            next_id: AtomicU64::new(1),
            next_gpu_address: AtomicU64::new(GPU_ADDRESS_BASE),
            next_cpu_descriptor: AtomicU64::new(CPU_DESCRIPTOR_BASE),
            next_gpu_descriptor: AtomicU64::new(GPU_DESCRIPTOR_BASE),
            last_signal_queued: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Stop the worker before its next operation. Fences stop advancing
    /// until [`resume`](Self::resume).
    pub fn pause(&self) {
        log::trace!("DummyBackend: paused");
        self.shared.timeline.pause();
    }

    pub fn resume(&self) {
        log::trace!("DummyBackend: resumed");
        self.shared.timeline.resume();
    }

    /// Simulate device removal. Every later submit, signal and wait fails
    /// with [`GraphicsError::DeviceLost`], and blocked waits wake up with it.
    pub fn lose_device(&self) {
        log::warn!("DummyBackend: device lost");
        self.shared.timeline.lose();
    }

    pub fn stats(&self) -> DummyStats {
        *self.shared.stats.lock()
    }

    /// Bytes of simulated video memory in use.
    pub fn memory_used(&self) -> u64 {
        self.budget.used()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_alive(&self) -> Result<(), GraphicsError> {
        if self.shared.timeline.is_lost() {
            Err(GraphicsError::DeviceLost)
        } else {
            Ok(())
        }
    }

    fn send(&self, op: TimelineOp) -> Result<(), GraphicsError> {
        self.sender
            .send(op)
            .map_err(|_| GraphicsError::DeviceLost)
    }

    fn out_of_memory_reason(&self, size: u64) -> String {
        format!(
            "out of video memory: {} bytes requested, {} of {} in use",
            size,
            self.budget.used(),
            self.budget.limit()
        )
    }

    fn host_visible_buffer<'a>(
        &self,
        buffer: &'a GpuBuffer,
        offset: u64,
        len: u64,
    ) -> Result<&'a DummyResource, GraphicsError> {
        let GpuBuffer::Dummy(resource) = buffer;
        match resource.kind() {
            DummyResourceKind::Buffer { heap } if heap.is_host_visible() => {}
            _ => {
                return Err(GraphicsError::InvalidParameter(format!(
                    "buffer '{}' is not host visible",
                    resource.label()
                )));
            }
        }
        if offset.checked_add(len).is_none_or(|end| end > resource.size()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} bytes at offset {} overrun buffer '{}' of {} bytes",
                len,
                offset,
                resource.label(),
                resource.size()
            )));
        }
        Ok(resource)
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer '{}' has zero size",
                descriptor.display_label()
            )));
        }
        if !self.budget.reserve(descriptor.size) {
            return Err(GraphicsError::ResourceCreation {
                label: descriptor.display_label().to_string(),
                size: descriptor.size,
                format: None,
                reason: self.out_of_memory_reason(descriptor.size),
            });
        }

        let gpu_address = self.next_gpu_address.fetch_add(
            align_up(descriptor.size, RESOURCE_PLACEMENT_ALIGNMENT),
            Ordering::Relaxed,
        );
        let initial_state = match descriptor.heap {
            HeapType::Upload => ResourceStates::GENERIC_READ,
            HeapType::Readback => ResourceStates::COPY_DEST,
            HeapType::Default => ResourceStates::COMMON,
        };

        log::trace!(
            "DummyBackend: creating buffer '{}' ({} bytes, {:?} heap) at {:#x}",
            descriptor.display_label(),
            descriptor.size,
            descriptor.heap,
            gpu_address
        );

        Ok(GpuBuffer::Dummy(Arc::new(DummyResource::new(
            self.next_id(),
            descriptor.display_label().to_string(),
            DummyResourceKind::Buffer {
                heap: descriptor.heap,
            },
            gpu_address,
            descriptor.size,
            initial_state,
            self.budget.clone(),
        ))))
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_state: ResourceStates,
    ) -> Result<GpuTexture, GraphicsError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture '{}' has zero extent",
                descriptor.display_label()
            )));
        }
        let size = descriptor.size_in_bytes();
        if !self.budget.reserve(size) {
            return Err(GraphicsError::ResourceCreation {
                label: descriptor.display_label().to_string(),
                size,
                format: Some(descriptor.format),
                reason: self.out_of_memory_reason(size),
            });
        }

        log::trace!(
            "DummyBackend: creating texture '{}' ({}x{} {:?})",
            descriptor.display_label(),
            descriptor.width,
            descriptor.height,
            descriptor.format
        );

        Ok(GpuTexture::Dummy(Arc::new(DummyResource::new(
            self.next_id(),
            descriptor.display_label().to_string(),
            DummyResourceKind::Texture {
                width: descriptor.width,
                height: descriptor.height,
                format: descriptor.format,
            },
            0,
            size,
            initial_state,
            self.budget.clone(),
        ))))
    }

    fn create_descriptor_heap(
        &self,
        kind: DescriptorKind,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<GpuDescriptorHeap, GraphicsError> {
        if capacity == 0 {
            return Err(GraphicsError::InvalidParameter(
                "descriptor heap capacity cannot be zero".to_string(),
            ));
        }
        if shader_visible && !kind.can_be_shader_visible() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{kind:?} heaps cannot be shader visible"
            )));
        }

        // Leave a one-slot gap between heaps so handles never run into the next heap.
        let span = (capacity as u64 + 1) * DESCRIPTOR_STRIDE;
        let cpu_start = self.next_cpu_descriptor.fetch_add(span, Ordering::Relaxed);
        let gpu_start = if shader_visible {
            self.next_gpu_descriptor.fetch_add(span, Ordering::Relaxed)
        } else {
            0
        };

        let heap = Arc::new(DummyDescriptorHeap {
            id: self.next_id(),
            kind,
            cpu_start,
            gpu_start,
            slots: Mutex::new(vec![None; capacity as usize]),
        });

        let mut heaps = self.shared.heaps.lock();
        heaps.retain(|heap| heap.strong_count() > 0);
        heaps.push(Arc::downgrade(&heap));

        log::trace!(
            "DummyBackend: creating {:?} descriptor heap ({} slots) at {:#x}",
            kind,
            capacity,
            cpu_start
        );
        Ok(GpuDescriptorHeap::Dummy(heap))
    }

    fn write_descriptor(
        &self,
        heap: &GpuDescriptorHeap,
        index: u32,
        view: &ViewDescriptor,
    ) -> Result<(), GraphicsError> {
        let GpuDescriptorHeap::Dummy(heap) = heap;
        if view.kind() != heap.kind {
            return Err(GraphicsError::InvalidParameter(format!(
                "{:?} view written into a {:?} heap",
                view.kind(),
                heap.kind
            )));
        }
        let mut slots = heap.slots.lock();
        let capacity = slots.len();
        let slot = slots.get_mut(index as usize).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "descriptor index {index} outside a heap of {capacity}"
            ))
        })?;
        *slot = Some(view.clone());
        Ok(())
    }

    fn create_root_signature(
        &self,
        parameters: &RootParameters,
    ) -> Result<GpuRootSignature, GraphicsError> {
        log::trace!(
            "DummyBackend: creating root signature ({} dwords)",
            parameters.size_in_dwords()
        );
        Ok(GpuRootSignature::Dummy(Arc::new(DummyObject {
            id: self.next_id(),
            label: "root signature".to_string(),
        })))
    }

    fn create_pipeline_state(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<GpuPipelineState, GraphicsError> {
        if descriptor.vertex_shader.bytecode.is_empty() || descriptor.pixel_shader.bytecode.is_empty()
        {
            return Err(GraphicsError::InvalidParameter(
                "pipeline state created without shader bytecode".to_string(),
            ));
        }
        log::trace!(
            "DummyBackend: creating pipeline state for root signature '{}'",
            descriptor.root_signature.name()
        );
        Ok(GpuPipelineState::Dummy(Arc::new(DummyObject {
            id: self.next_id(),
            label: descriptor.vertex_shader.entry_point.clone(),
        })))
    }

    fn create_command_allocator(&self, label: &str) -> Result<GpuCommandAllocator, GraphicsError> {
        Ok(GpuCommandAllocator::Dummy(Arc::new(DummyCommandAllocator {
            id: self.next_id(),
            label: label.to_string(),
            in_flight: AtomicU64::new(0),
            covering_fence: AtomicU64::new(0),
        })))
    }

    fn reset_command_allocator(
        &self,
        allocator: &GpuCommandAllocator,
    ) -> Result<(), GraphicsError> {
        self.check_alive()?;
        let GpuCommandAllocator::Dummy(allocator) = allocator;
        if allocator.in_flight.load(Ordering::Acquire) > 0 {
            let required = allocator.covering_fence.load(Ordering::Acquire);
            let completed = self.shared.timeline.completed();
            log::warn!(
                "DummyBackend: validation error: allocator '{}' reset while in flight (needs fence {}, at {})",
                allocator.label,
                required,
                completed
            );
            self.shared.stats.lock().validation_errors += 1;
            return Err(GraphicsError::SynchronizationViolation {
                resource: "command allocator",
                required,
                completed,
            });
        }
        Ok(())
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let resource = self.host_visible_buffer(buffer, offset, data.len() as u64)?;
        let start = offset as usize;
        resource.data()[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        let resource = self.host_visible_buffer(buffer, offset, size)?;
        let start = offset as usize;
        Ok(resource.data()[start..start + size as usize].to_vec())
    }

    fn submit(
        &self,
        allocator: &GpuCommandAllocator,
        commands: Vec<Command>,
    ) -> Result<(), GraphicsError> {
        self.check_alive()?;
        let GpuCommandAllocator::Dummy(allocator) = allocator;
        allocator.in_flight.fetch_add(1, Ordering::AcqRel);
        allocator.covering_fence.store(
            self.last_signal_queued.load(Ordering::Acquire) + 1,
            Ordering::Release,
        );

        log::trace!(
            "DummyBackend: queued '{}' ({} commands)",
            allocator.label,
            commands.len()
        );
        self.send(TimelineOp::Execute {
            allocator: allocator.clone(),
            commands,
        })
    }

    fn signal(&self, value: u64) -> Result<(), GraphicsError> {
        self.check_alive()?;
        self.last_signal_queued.fetch_max(value, Ordering::AcqRel);
        self.shared.stats.lock().signals += 1;
        self.send(TimelineOp::Signal(value))
    }

    fn completed_value(&self) -> u64 {
        self.shared.timeline.completed()
    }

    fn wait_for_value(&self, value: u64) -> Result<(), GraphicsError> {
        let queued = self.last_signal_queued.load(Ordering::Acquire);
        if value > queued {
            return Err(GraphicsError::InvalidParameter(format!(
                "fence value {value} was never signaled (last queued {queued})"
            )));
        }
        self.shared.timeline.wait_for(value)
    }
}

impl Drop for DummyBackend {
    fn drop(&mut self) {
        self.shared.timeline.resume();
        // The worker may already be gone; nothing to do then.
        let _ = self.sender.send(TimelineOp::Shutdown);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("DummyBackend: timeline thread panicked");
        }
    }
}

impl std::fmt::Debug for DummyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyBackend")
            .field("config", &self.config)
            .field("completed", &self.completed_value())
            .field("memory_used", &self.memory_used())
            .finish_non_exhaustive()
    }
}
