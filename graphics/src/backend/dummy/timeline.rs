//! The simulated GPU timeline.
//!
//! A worker thread drains a channel of submissions and signals in the order
//! they were queued. Fence progress is published through a mutex and
//! condition variable, so CPU waits block for real until the worker catches
//! up.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::backend::{GpuBuffer, GpuTexture};
use crate::command::Command;
use crate::descriptor::ViewDescriptor;
use crate::error::GraphicsError;
use crate::profiling::{profile_scope, set_thread_name};
use crate::types::ResourceStates;

use super::memory::{self, DummyResource};
use super::{DummyCommandAllocator, DummyShared};

/// Work queued for the worker thread.
pub(super) enum TimelineOp {
    Execute {
        allocator: Arc<DummyCommandAllocator>,
        commands: Vec<Command>,
    },
    Signal(u64),
    Shutdown,
}

#[derive(Debug, Default)]
struct TimelineState {
    completed: u64,
    paused: bool,
    lost: bool,
}

/// Fence progress shared between the API thread and the worker.
#[derive(Debug, Default)]
pub(super) struct Timeline {
    state: Mutex<TimelineState>,
    progress: Condvar,
}

impl Timeline {
    pub(super) fn completed(&self) -> u64 {
        self.state.lock().completed
    }

    pub(super) fn is_lost(&self) -> bool {
        self.state.lock().lost
    }

    pub(super) fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub(super) fn resume(&self) {
        self.state.lock().paused = false;
        self.progress.notify_all();
    }

    pub(super) fn lose(&self) {
        self.state.lock().lost = true;
        self.progress.notify_all();
    }

    /// Block until the fence reaches `value` or the device is lost.
    pub(super) fn wait_for(&self, value: u64) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        loop {
            if state.lost {
                return Err(GraphicsError::DeviceLost);
            }
            if state.completed >= value {
                return Ok(());
            }
            self.progress.wait(&mut state);
        }
    }

    /// Worker side: hold while paused. Returns false once the device is lost.
    fn wait_until_running(&self) -> bool {
        let mut state = self.state.lock();
        while state.paused && !state.lost {
            self.progress.wait(&mut state);
        }
        !state.lost
    }

    fn complete(&self, value: u64) {
        let mut state = self.state.lock();
        state.completed = state.completed.max(value);
        drop(state);
        self.progress.notify_all();
    }
}

/// Body of the worker thread.
pub(super) fn run(receiver: Receiver<TimelineOp>, shared: Arc<DummyShared>, latency: Duration) {
    set_thread_name!("Dummy GPU");
    log::trace!("DummyBackend: timeline started");

    // A lost device makes no progress, but the channel keeps draining.
    while let Ok(op) = receiver.recv() {
        match op {
            TimelineOp::Shutdown => break,
            TimelineOp::Execute {
                allocator,
                commands,
            } => {
                if shared.timeline.wait_until_running() {
                    if !latency.is_zero() {
                        std::thread::sleep(latency);
                    }
                    Executor::new(&shared).execute(&commands);
                }
                allocator.finish_one();
            }
            TimelineOp::Signal(value) => {
                if shared.timeline.wait_until_running() {
                    log::trace!("DummyBackend: fence reached {}", value);
                    shared.timeline.complete(value);
                }
            }
        }
    }

    log::trace!("DummyBackend: timeline stopped");
}

/// Executes one command list against host memory.
///
/// Binding state is per list, as on hardware: a list starts with nothing
/// bound.
struct Executor<'a> {
    shared: &'a DummyShared,
    pipeline_bound: bool,
    root_signature_bound: bool,
}

impl<'a> Executor<'a> {
    fn new(shared: &'a DummyShared) -> Self {
        Self {
            shared,
            pipeline_bound: false,
            root_signature_bound: false,
        }
    }

    fn execute(&mut self, commands: &[Command]) {
        profile_scope!("dummy_execute");
        for command in commands {
            self.execute_one(command);
        }
        self.shared.stats.lock().submissions += 1;
    }

    fn validation_error(&self, message: String) {
        log::warn!("DummyBackend: validation error: {}", message);
        self.shared.stats.lock().validation_errors += 1;
    }

    fn execute_one(&mut self, command: &Command) {
        match command {
            Command::ResourceBarrier(barriers) => {
                for barrier in barriers {
                    let resource = resource_of(&barrier.resource);
                    let actual = resource.transition(barrier.after);
                    if actual != barrier.before {
                        self.validation_error(format!(
                            "barrier on '{}' expected {:?}, resource is in {:?}",
                            resource.label(),
                            barrier.before,
                            actual
                        ));
                    }
                }
                let mut stats = self.shared.stats.lock();
                stats.barrier_batches += 1;
                stats.barriers += barriers.len() as u64;
            }
            Command::ClearRenderTarget { view, color } => {
                match self.shared.resolve_view(view.0) {
                    Some(ViewDescriptor::RenderTarget { texture, format }) => {
                        let resource = texture_resource(&texture);
                        self.expect_state(resource, ResourceStates::RENDER_TARGET);
                        match memory::encode_color(format, *color) {
                            Some(texel) => memory::fill_texture(resource, &texel),
                            None => log::trace!("DummyBackend: {:?} clears are not simulated", format),
                        }
                        self.shared.stats.lock().clears += 1;
                    }
                    _ => self.validation_error(format!(
                        "clear through {:#x}, which is not a render target view",
                        view.0
                    )),
                }
            }
            Command::ClearDepthStencil {
                view,
                depth,
                stencil,
            } => match self.shared.resolve_view(view.0) {
                Some(ViewDescriptor::DepthStencil { texture, format }) => {
                    let resource = texture_resource(&texture);
                    self.expect_state(resource, ResourceStates::DEPTH_WRITE);
                    if let Some(texel) = memory::encode_depth_stencil(format, *depth, *stencil) {
                        memory::fill_texture(resource, &texel);
                    }
                    self.shared.stats.lock().clears += 1;
                }
                _ => self.validation_error(format!(
                    "clear through {:#x}, which is not a depth-stencil view",
                    view.0
                )),
            },
            Command::CopyBufferRegion {
                dst,
                dst_offset,
                src,
                src_offset,
                size,
            } => {
                let result = memory::copy_buffer_region(
                    buffer_resource(dst),
                    *dst_offset,
                    buffer_resource(src),
                    *src_offset,
                    *size,
                );
                self.finish_copy(result);
            }
            Command::CopyBufferToTexture {
                src,
                footprint,
                dst,
            } => {
                let result =
                    memory::copy_buffer_to_texture(buffer_resource(src), footprint, texture_resource(dst));
                self.finish_copy(result);
            }
            Command::CopyTextureToBuffer {
                src,
                dst,
                footprint,
            } => {
                let result =
                    memory::copy_texture_to_buffer(texture_resource(src), buffer_resource(dst), footprint);
                self.finish_copy(result);
            }
            Command::SetPipelineState(_) => self.pipeline_bound = true,
            Command::SetGraphicsRootSignature(_) => self.root_signature_bound = true,
            Command::DrawIndexedInstanced { .. } => {
                if !self.pipeline_bound || !self.root_signature_bound {
                    self.validation_error(format!(
                        "draw without {}",
                        if self.pipeline_bound {
                            "a root signature"
                        } else {
                            "a pipeline state"
                        }
                    ));
                }
                self.shared.stats.lock().draws += 1;
            }
            other => log::trace!("DummyBackend: {}", other.name()),
        }
    }

    fn expect_state(&self, resource: &DummyResource, required: ResourceStates) {
        let state = resource.state();
        if !state.contains(required) {
            self.validation_error(format!(
                "'{}' used as {:?} while in {:?}",
                resource.label(),
                required,
                state
            ));
        }
    }

    fn finish_copy(&self, result: Result<(), memory::CopyError>) {
        match result {
            Ok(()) => self.shared.stats.lock().copies += 1,
            Err(memory::CopyError(message)) => self.validation_error(message),
        }
    }
}

fn buffer_resource(buffer: &GpuBuffer) -> &DummyResource {
    match buffer {
        GpuBuffer::Dummy(resource) => resource,
    }
}

fn texture_resource(texture: &GpuTexture) -> &DummyResource {
    match texture {
        GpuTexture::Dummy(resource) => resource,
    }
}

fn resource_of(resource: &crate::backend::GpuResource) -> &DummyResource {
    match resource {
        crate::backend::GpuResource::Buffer(buffer) => buffer_resource(buffer),
        crate::backend::GpuResource::Texture(texture) => texture_resource(texture),
    }
}
