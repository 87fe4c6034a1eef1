//! One slot of the frame ring.

use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::command::CommandList;
use crate::error::GraphicsError;
use crate::memory::LinearAllocator;
use crate::queue::CommandQueue;
use crate::resources::Buffer;
use crate::types::{BufferDescriptor, SceneConstants};

/// Where a [`FrameResource`] is in its reuse cycle.
///
/// There is no `Submitted → Idle` edge: the fence wait at the start of the
/// slot's next use, K frames later, stands in for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    /// Never used, or waited on and not yet reopened.
    #[default]
    Idle,
    /// Owned by the render thread, accepting commands and allocations.
    Recording,
    /// Handed to the queue. `fence_value` covers it.
    Submitted,
}

/// Everything one frame in flight needs: its own command list, its own
/// transient arena and the fence value of its last submission.
///
/// Renderer code reaches the current slot through
/// [`Device::frame_resource_mut`](crate::Device::frame_resource_mut) and
/// uses the public fields directly:
///
/// ```ignore
/// let frame = device.frame_resource_mut();
/// let constants = frame.linear_allocator.allocate_pod(&object_constants)?;
/// frame.command_list.set_graphics_root_cbv(1, constants.gpu_address);
/// ```
pub struct FrameResource {
    /// Recording target for this slot. Reset only after `fence_value` completes.
    pub command_list: CommandList,
    /// Per-draw transient constants. Reset together with the command list.
    pub linear_allocator: LinearAllocator,
    backend: Arc<dyn GpuBackend>,
    constants: Buffer,
    fence_value: u64,
    state: FrameState,
    index: usize,
}

impl FrameResource {
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        index: usize,
        linear_allocator_size: u64,
        frame_constants_size: u64,
    ) -> Result<Self, GraphicsError> {
        let command_list = CommandList::new(backend.clone(), format!("frame {index} commands"))?;
        let linear_allocator =
            LinearAllocator::new(backend.clone(), linear_allocator_size, format!("frame {index} arena"))?;

        let desc = BufferDescriptor::upload(frame_constants_size)
            .with_label(format!("frame {index} constants"));
        let gpu = backend.create_buffer(&desc)?;
        let constants = Buffer::new(gpu, desc);
        backend.write_buffer(constants.gpu(), 0, bytemuck::bytes_of(&SceneConstants::default()))?;

        Ok(Self {
            command_list,
            linear_allocator,
            backend,
            constants,
            fence_value: 0,
            state: FrameState::Idle,
            index,
        })
    }

    /// Wait until the GPU is done with this slot, then reopen it.
    ///
    /// Returns the completed fence value observed at the reset.
    pub(crate) fn begin(&mut self, queue: &CommandQueue) -> Result<u64, GraphicsError> {
        queue.wait_for_fence(self.fence_value)?;

        let completed = queue.completed_value();
        debug_assert!(
            self.fence_value <= completed,
            "frame {} reset before fence {} completed",
            self.index,
            self.fence_value
        );

        self.command_list.reset(queue)?;
        self.linear_allocator.reset();
        self.state = FrameState::Recording;
        Ok(completed)
    }

    /// Submit the recorded commands and store the fence that covers them.
    pub(crate) fn submit(&mut self, queue: &CommandQueue) -> Result<u64, GraphicsError> {
        queue.execute_command_lists(&mut [&mut self.command_list])?;
        let fence = queue.signal()?;
        self.fence_value = fence;
        self.state = FrameState::Submitted;
        Ok(fence)
    }

    /// Overwrite this frame's scene constants.
    ///
    /// Only legal while recording: in any other state the GPU may still be
    /// reading the buffer.
    pub fn write_constants(&self, constants: &SceneConstants) -> Result<(), GraphicsError> {
        if self.state != FrameState::Recording {
            return Err(GraphicsError::InvalidParameter(format!(
                "frame {} constants written while {:?}",
                self.index, self.state
            )));
        }
        self.backend
            .write_buffer(self.constants.gpu(), 0, bytemuck::bytes_of(constants))
    }

    /// The scene constant buffer. Its CBV lives in the shader-visible table.
    pub fn constants(&self) -> &Buffer {
        &self.constants
    }

    pub(crate) fn constants_mut(&mut self) -> &mut Buffer {
        &mut self.constants
    }

    /// Fence value of the last submission, 0 if never submitted.
    pub fn fence_value(&self) -> u64 {
        self.fence_value
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Position in the ring.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl std::fmt::Debug for FrameResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameResource")
            .field("index", &self.index)
            .field("state", &self.state)
            .field("fence_value", &self.fence_value)
            .field("command_list", &self.command_list.state())
            .field("arena_used", &self.linear_allocator.used())
            .finish()
    }
}
