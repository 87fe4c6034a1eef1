//! Frame resource ring for keeping several frames in flight.
//!
//! This module provides [`FrameRing`], which owns one [`FrameResource`] per
//! frame in flight and coordinates CPU-GPU synchronization across them, so
//! the CPU records frame N+1 while the GPU executes frame N.
//!
//! # Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Device                                     │
//! │  Composition root. Owns the queue, the descriptor tables, the ring and  │
//! │  the back buffers. Hands out the current FrameResource to renderers.    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                             FrameRing                                   │
//! │  K FrameResources used round-robin.                                     │
//! │                                                                         │
//! │  Responsibilities:                                                      │
//! │  - Pick the next slot at the start of each frame (begin_frame)          │
//! │  - Block until the GPU finished the slot's previous occupant            │
//! │  - Submit the slot and store its new fence value (end_frame)            │
//! │  - Graceful shutdown (wait_idle)                                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                           FrameResource                                 │
//! │  { CommandList, LinearAllocator, fence value }                          │
//! │  Exclusively owned by the render thread while Recording.                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                           CommandQueue                                  │
//! │  The only thing that knows how far the GPU has progressed.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Synchronization Model
//!
//! | Level | Primitive | Purpose |
//! |-------|-----------|---------|
//! | Command → Command | Barriers | Resource state transitions within a list |
//! | List → List | Queue order | Submission order is execution order |
//! | Frame → Frame | Fence values | CPU-GPU sync before a slot is reused |
//!
//! # Slot State Machine
//!
//! ```text
//!            wait_for_fence(slot.fence_value)
//!   Idle ──────────────────────────────────────► Recording
//!    ▲        reset command list + arena            │
//!    │                                              │ execute + signal
//!    │                                              ▼
//!    └─────────── next wait, K frames later ─── Submitted
//! ```
//!
//! The first wait on a slot is a no-op: its fence value starts at 0, which
//! the GPU has always reached.
//!
//! # Frame Overlap (Pipelining)
//!
//! With 3 frames in flight, frame `n` uses slot `n mod 3`:
//!
//! ```text
//! Slot 0: [Frame 0] ──► [Frame 3] ──► [Frame 6] ──►
//! Slot 1: [Frame 1] ──► [Frame 4] ──► [Frame 7] ──►
//! Slot 2: [Frame 2] ──► [Frame 5] ──► [Frame 8] ──►
//!
//! Frame 3:  [wait fence 1] [reset] [record] [submit, signal 4]
//!                 ▲
//!                 └── fence stored by frame 0, the slot's previous occupant
//! ```
//!
//! - The CPU only waits when it is about to reuse a slot
//! - Memory written by frame `n` is never overwritten before frame `n` completes
//! - Transient allocations are valid until the slot comes around again
//!
//! # Graceful Shutdown
//!
//! ```text
//! [Window Close Event]
//!         │
//!         ▼
//! ┌───────────────────┐
//! │  Stop rendering   │  Don't start new frames
//! └─────────┬─────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │  ring.wait_idle   │  Wait for all in-flight GPU work
//! └─────────┬─────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │  Drop resources   │  Safe to destroy GPU objects
//! └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use emberlight_graphics::{CommandQueue, pipeline::FrameRing};
//!
//! let queue = CommandQueue::new(backend.clone());
//! let mut ring = FrameRing::new(backend, 3, 64 * 1024, 256)?;
//!
//! while !window.should_close() {
//!     ring.begin_frame(&queue)?;          // may block if the GPU is behind
//!     record(&mut ring.frame_mut().command_list);
//!     ring.end_frame(&queue)?;            // execute + signal
//! }
//!
//! ring.wait_idle(&queue)?;
//! ```
//!
//! # Choosing Frames in Flight
//!
//! | Count | Behavior |
//! |-------|----------|
//! | 1 | CPU waits for GPU every frame. Simple but slow. |
//! | 2 | CPU records N+1 while GPU renders N. |
//! | 3 | Default. Absorbs uneven frame times at one extra frame of latency. |
//!
//! Every extra frame costs a command allocator, an arena and a constant
//! buffer.

mod frame_resource;

pub use frame_resource::{FrameResource, FrameState};

use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::error::GraphicsError;
use crate::profiling::{frame_mark, profile_plot, profile_scope};
use crate::queue::CommandQueue;

/// What [`FrameRing::begin_frame`] observed while acquiring a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBegin {
    /// 0-based number of this visual frame.
    pub frame_index: u64,
    /// Ring slot the frame records into.
    pub slot: usize,
    /// Fence value waited on before the reset, 0 for a fresh slot.
    pub waited_fence: u64,
    /// The queue's completed value at the moment of the reset.
    pub completed_at_reset: u64,
}

/// A fixed ring of [`FrameResource`]s used round-robin.
///
/// The ring starts before slot 0: the first [`begin_frame`](Self::begin_frame)
/// moves to slot 0, so frame `n` always records into slot `n mod K`.
///
/// # Thread Safety
///
/// `FrameRing` is **not** meant to be shared. It belongs to the render
/// thread, which is what makes the unlocked slot contents sound.
#[derive(Debug)]
pub struct FrameRing {
    frames: Vec<FrameResource>,
    current_slot: usize,
    frame_count: u64,
}

impl FrameRing {
    /// Create `frames_in_flight` frame resources.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is 0.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        frames_in_flight: usize,
        linear_allocator_size: u64,
        frame_constants_size: u64,
    ) -> Result<Self, GraphicsError> {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");

        let frames = (0..frames_in_flight)
            .map(|index| {
                FrameResource::new(
                    backend.clone(),
                    index,
                    linear_allocator_size,
                    frame_constants_size,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Created frame ring ({} frames in flight, {} byte arenas)",
            frames_in_flight,
            linear_allocator_size
        );

        Ok(Self {
            frames,
            current_slot: frames_in_flight - 1,
            frame_count: 0,
        })
    }

    /// Begin a new frame.
    ///
    /// Advances to the next slot, blocks until the GPU has finished the
    /// slot's previous occupant, then resets its command list and arena.
    /// Call exactly once per frame, before touching the frame resource.
    ///
    /// Fails without advancing if the current frame was never ended.
    pub fn begin_frame(&mut self, queue: &CommandQueue) -> Result<FrameBegin, GraphicsError> {
        profile_scope!("begin_frame");

        if self.frame().state() == FrameState::Recording {
            return Err(GraphicsError::InvalidParameter(format!(
                "begin_frame called while frame {} is still recording",
                self.frame_count.saturating_sub(1)
            )));
        }

        let slot = (self.current_slot + 1) % self.frames.len();
        let frame = &mut self.frames[slot];
        let waited_fence = frame.fence_value();

        let completed_at_reset = {
            profile_scope!("wait_for_frame_slot");
            frame.begin(queue)?
        };

        self.current_slot = slot;
        let frame_index = self.frame_count;
        self.frame_count += 1;

        log::trace!(
            "Begin frame {} (slot {}, waited on fence {}, completed {})",
            frame_index,
            slot,
            waited_fence,
            completed_at_reset
        );

        Ok(FrameBegin {
            frame_index,
            slot,
            waited_fence,
            completed_at_reset,
        })
    }

    /// End the current frame.
    ///
    /// Closes and submits the slot's command list, signals the queue and
    /// stores the new fence value in the slot. Returns that fence value.
    pub fn end_frame(&mut self, queue: &CommandQueue) -> Result<u64, GraphicsError> {
        profile_scope!("end_frame");

        let slot = self.current_slot;
        let frame = &mut self.frames[slot];
        if frame.state() != FrameState::Recording {
            return Err(GraphicsError::InvalidParameter(format!(
                "end_frame called on slot {} while {:?}",
                slot,
                frame.state()
            )));
        }

        let fence = frame.submit(queue)?;
        profile_plot!("arena bytes", frame.linear_allocator.used() as f64);
        frame_mark!();

        log::trace!(
            "End frame {} (slot {}, fence {})",
            self.frame_count - 1,
            slot,
            fence
        );
        Ok(fence)
    }

    /// Wait for every submitted frame to complete.
    ///
    /// Call before destroying resources the frames may reference.
    pub fn wait_idle(&self, queue: &CommandQueue) -> Result<(), GraphicsError> {
        let newest = self
            .frames
            .iter()
            .map(FrameResource::fence_value)
            .max()
            .unwrap_or(0);

        log::trace!("Waiting for GPU idle (fence {})", newest);
        queue.wait_for_fence(newest)?;
        log::trace!("GPU idle");
        Ok(())
    }

    /// The current slot's frame resource.
    pub fn frame(&self) -> &FrameResource {
        &self.frames[self.current_slot]
    }

    pub fn frame_mut(&mut self) -> &mut FrameResource {
        &mut self.frames[self.current_slot]
    }

    /// All slots, in ring order.
    pub fn frames(&self) -> &[FrameResource] {
        &self.frames
    }

    pub(crate) fn frames_mut(&mut self) -> &mut [FrameResource] {
        &mut self.frames
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Slot of the frame most recently begun. Before the first frame this is
    /// the last slot.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Total frames begun.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Check if a slot can be reused without blocking.
    pub fn is_slot_ready(&self, slot: usize, queue: &CommandQueue) -> bool {
        assert!(slot < self.frames.len(), "Invalid slot index");
        queue.is_complete(self.frames[slot].fence_value())
    }

    /// Check if [`wait_idle`](Self::wait_idle) would return immediately.
    pub fn is_idle(&self, queue: &CommandQueue) -> bool {
        self.frames
            .iter()
            .all(|frame| queue.is_complete(frame.fence_value()))
    }
}
