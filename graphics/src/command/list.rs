//! Command list wrapper with barrier batching.

use std::sync::Arc;

use crate::backend::{GpuBackend, GpuBuffer, GpuCommandAllocator, GpuDescriptorHeap, GpuTexture};
use crate::descriptor::{CpuDescriptorHandle, DescriptorTable};
use crate::error::GraphicsError;
use crate::queue::CommandQueue;
use crate::render_state::{PipelineState, RootSignature};
use crate::types::{
    ImageData, IndexBufferView, PrimitiveTopology, ResourceStates, ScissorRect, VertexBufferView,
    Viewport,
};

use super::{BarrierBatch, BarrierTarget, Command, ResourceBarrier};

/// Lifecycle of a [`CommandList`].
///
/// ```text
/// Closed ──reset──► Recording ──close──► Closed ──execute──► Submitted
///    ▲                                                          │
///    └──────────────── reset (after the fence completes) ───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandListState {
    /// Accepting commands.
    Recording,
    /// Immutable, ready to execute. Also the state of a new list.
    Closed,
    /// Handed to the queue. The GPU may still be reading it.
    Submitted,
}

/// A command buffer plus the allocator its memory comes from.
///
/// Recording methods are thin, order-preserving wrappers. They do not check
/// that a pipeline or root signature is bound before a draw: binding order
/// is the caller's job, as it is on the hardware.
///
/// Each list owns its allocator, and [`reset`](Self::reset) refuses to
/// recycle it until the fence covering the list's last submission has
/// completed.
///
/// Commands recorded while the list is not recording are dropped and
/// counted. [`close`](Self::close), and with it submission, fails until the
/// next reset once anything was dropped.
pub struct CommandList {
    backend: Arc<dyn GpuBackend>,
    allocator: GpuCommandAllocator,
    label: String,
    commands: Vec<Command>,
    barriers: BarrierBatch,
    state: CommandListState,
    /// Fence value that covers the last submission, 0 if never submitted.
    submitted_fence: u64,
    /// Commands and barriers recorded outside `Recording` since the last reset.
    dropped: usize,
}

impl CommandList {
    /// Create a closed list with its own allocator.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        label: impl Into<String>,
    ) -> Result<Self, GraphicsError> {
        let label = label.into();
        let allocator = backend.create_command_allocator(&label)?;
        Ok(Self {
            backend,
            allocator,
            label,
            commands: Vec::new(),
            barriers: BarrierBatch::new(),
            state: CommandListState::Closed,
            submitted_fence: 0,
            dropped: 0,
        })
    }

    /// Recycle the allocator and reopen the list for recording.
    ///
    /// Fails with [`GraphicsError::SynchronizationViolation`] if `queue` has
    /// not yet completed the fence covering this list's last submission.
    pub fn reset(&mut self, queue: &CommandQueue) -> Result<(), GraphicsError> {
        let completed = queue.completed_value();
        if self.submitted_fence > completed {
            return Err(GraphicsError::SynchronizationViolation {
                resource: "command allocator",
                required: self.submitted_fence,
                completed,
            });
        }

        self.backend.reset_command_allocator(&self.allocator)?;
        self.commands.clear();
        self.barriers.clear();
        self.dropped = 0;
        self.state = CommandListState::Recording;

        log::trace!("Command list '{}' reset", self.label);
        Ok(())
    }

    /// Stop recording. Pending barriers are dispatched first.
    ///
    /// Fails with [`GraphicsError::InvalidParameter`] if commands were
    /// dropped since the last reset, so an incomplete list never reaches
    /// the queue.
    pub fn close(&mut self) -> Result<(), GraphicsError> {
        if self.dropped > 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "command list '{}' dropped {} commands recorded outside Recording",
                self.label, self.dropped
            )));
        }
        match self.state {
            CommandListState::Recording => {}
            CommandListState::Closed => return Ok(()),
            CommandListState::Submitted => {
                return Err(GraphicsError::InvalidParameter(format!(
                    "command list '{}' closed again without a reset",
                    self.label
                )));
            }
        }

        if !self.barriers.is_empty() {
            log::debug!(
                "Command list '{}' closed with {} pending barriers, dispatching them",
                self.label,
                self.barriers.len()
            );
            self.dispatch_barriers();
        }
        self.state = CommandListState::Closed;
        Ok(())
    }

    /// Move the recorded commands out for execution and remember the fence
    /// value that will cover them.
    pub(crate) fn take_for_submission(
        &mut self,
        covering_fence: u64,
    ) -> Result<Vec<Command>, GraphicsError> {
        if self.state != CommandListState::Closed {
            return Err(GraphicsError::InvalidParameter(format!(
                "command list '{}' submitted while {:?}",
                self.label, self.state
            )));
        }
        self.state = CommandListState::Submitted;
        self.submitted_fence = covering_fence;
        Ok(std::mem::take(&mut self.commands))
    }

    fn record(&mut self, command: Command) {
        if self.state != CommandListState::Recording {
            self.dropped += 1;
            log::error!(
                "Command list '{}': {} recorded while {:?}, dropped",
                self.label,
                command.name(),
                self.state
            );
            return;
        }
        self.commands.push(command);
    }

    // ------------------------------------------------------------------
    // Barriers
    // ------------------------------------------------------------------

    /// Queue a state transition. Nothing is recorded until
    /// [`dispatch_barriers`](Self::dispatch_barriers).
    pub fn add_barrier(
        &mut self,
        resource: &impl BarrierTarget,
        before: ResourceStates,
        after: ResourceStates,
    ) {
        if self.state != CommandListState::Recording {
            self.dropped += 1;
            log::error!(
                "Command list '{}': barrier added while {:?}, dropped",
                self.label,
                self.state
            );
            return;
        }
        self.barriers
            .add(resource.barrier_resource(), before, after);
    }

    /// Record every pending transition as one barrier command and clear the
    /// pending list. Records nothing if no transition is pending.
    pub fn dispatch_barriers(&mut self) {
        if self.barriers.is_empty() {
            return;
        }
        let barriers = self.barriers.take();
        log::trace!(
            "Command list '{}': dispatching {} barriers",
            self.label,
            barriers.len()
        );
        self.record(Command::ResourceBarrier(barriers));
    }

    /// Transitions queued but not yet dispatched.
    pub fn pending_barriers(&self) -> &[ResourceBarrier] {
        self.barriers.pending()
    }

    // ------------------------------------------------------------------
    // Output merger and rasterizer
    // ------------------------------------------------------------------

    pub fn clear_render_target(&mut self, view: CpuDescriptorHandle, color: [f32; 4]) {
        self.record(Command::ClearRenderTarget { view, color });
    }

    pub fn clear_depth_stencil(&mut self, view: CpuDescriptorHandle, depth: f32, stencil: u8) {
        self.record(Command::ClearDepthStencil {
            view,
            depth,
            stencil,
        });
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.record(Command::SetViewport(viewport));
    }

    pub fn set_scissor(&mut self, scissor: ScissorRect) {
        self.record(Command::SetScissor(scissor));
    }

    pub fn set_render_targets(
        &mut self,
        render_targets: &[CpuDescriptorHandle],
        depth_stencil: Option<CpuDescriptorHandle>,
    ) {
        self.record(Command::SetRenderTargets {
            render_targets: render_targets.to_vec(),
            depth_stencil,
        });
    }

    // ------------------------------------------------------------------
    // Copies
    // ------------------------------------------------------------------

    pub fn copy_buffer_region(
        &mut self,
        dst: &impl AsRef<GpuBuffer>,
        dst_offset: u64,
        src: &impl AsRef<GpuBuffer>,
        src_offset: u64,
        size: u64,
    ) {
        self.record(Command::CopyBufferRegion {
            dst: dst.as_ref().clone(),
            dst_offset,
            src: src.as_ref().clone(),
            src_offset,
            size,
        });
    }

    /// Copy pixel rows laid out as `footprint` in `src` into `dst`.
    pub fn copy_texture_region(
        &mut self,
        src: &impl AsRef<GpuBuffer>,
        dst: &impl AsRef<GpuTexture>,
        footprint: ImageData,
    ) {
        self.record(Command::CopyBufferToTexture {
            src: src.as_ref().clone(),
            footprint,
            dst: dst.as_ref().clone(),
        });
    }

    /// Copy a texture into `dst` with the row layout of `footprint`.
    pub fn copy_texture_to_buffer(
        &mut self,
        src: &impl AsRef<GpuTexture>,
        dst: &impl AsRef<GpuBuffer>,
        footprint: ImageData,
    ) {
        self.record(Command::CopyTextureToBuffer {
            src: src.as_ref().clone(),
            dst: dst.as_ref().clone(),
            footprint,
        });
    }

    // ------------------------------------------------------------------
    // Pipeline binding
    // ------------------------------------------------------------------

    pub fn set_descriptor_heaps(&mut self, heaps: &[&GpuDescriptorHeap]) {
        self.record(Command::SetDescriptorHeaps(
            heaps.iter().map(|heap| (*heap).clone()).collect(),
        ));
    }

    /// Bind the heaps behind `tables` for shader-side indexing.
    pub fn set_descriptor_tables(&mut self, tables: &[&DescriptorTable]) {
        self.record(Command::SetDescriptorHeaps(
            tables.iter().map(|table| table.heap().clone()).collect(),
        ));
    }

    pub fn set_pipeline_state(&mut self, pipeline: &PipelineState) {
        self.record(Command::SetPipelineState(pipeline.gpu().clone()));
    }

    pub fn set_graphics_root_signature(&mut self, root_signature: &RootSignature) {
        self.record(Command::SetGraphicsRootSignature(root_signature.gpu().clone()));
    }

    pub fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) {
        self.record(Command::SetVertexBuffers {
            start_slot,
            views: views.to_vec(),
        });
    }

    pub fn set_index_buffer(&mut self, view: IndexBufferView) {
        self.record(Command::SetIndexBuffer(view));
    }

    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.record(Command::SetPrimitiveTopology(topology));
    }

    /// Bind a constant buffer address to a root descriptor parameter.
    pub fn set_graphics_root_cbv(&mut self, root_index: u32, address: u64) {
        self.record(Command::SetGraphicsRootConstantBufferView {
            root_index,
            address,
        });
    }

    /// Set root constants, starting `dest_offset` words into the parameter.
    pub fn set_graphics_root_constants(&mut self, root_index: u32, values: &[u32], dest_offset: u32) {
        self.record(Command::SetGraphicsRoot32BitConstants {
            root_index,
            values: values.to_vec(),
            dest_offset,
        });
    }

    // ------------------------------------------------------------------
    // Draws
    // ------------------------------------------------------------------

    pub fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.record(Command::DrawIndexedInstanced {
            index_count_per_instance,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Commands recorded since the last reset.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn state(&self) -> CommandListState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CommandListState::Recording
    }

    /// Fence value covering the last submission, 0 if never submitted.
    pub fn submitted_fence(&self) -> u64 {
        self.submitted_fence
    }

    /// Commands and barriers dropped since the last reset.
    pub fn dropped_commands(&self) -> usize {
        self.dropped
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn allocator(&self) -> &GpuCommandAllocator {
        &self.allocator
    }
}

impl std::fmt::Debug for CommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandList")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("commands", &self.commands.len())
            .field("pending_barriers", &self.barriers.len())
            .field("submitted_fence", &self.submitted_fence)
            .field("dropped", &self.dropped)
            .finish()
    }
}
