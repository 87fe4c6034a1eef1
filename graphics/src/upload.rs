//! Blocking one-shot uploads for asset loading.

use std::sync::Arc;

use crate::backend::{GpuBackend, GpuBuffer};
use crate::command::CommandList;
use crate::device::Device;
use crate::error::GraphicsError;
use crate::profiling::profile_scope;
use crate::queue::CommandQueue;
use crate::resources::{Buffer, Texture};
use crate::types::{BufferDescriptor, ImageData, ResourceStates};

/// A throwaway command list for copying data into device-local resources.
///
/// Each call stages its bytes in a fresh upload buffer and records the copy
/// together with the transitions around it. [`finish`](Self::finish)
/// submits, then blocks until the GPU is done, after which the staging
/// buffers are released.
///
/// This is independent of the frame ring and meant for rare, latency
/// insensitive work like loading a mesh or a texture.
///
/// # Example
///
/// ```ignore
/// let mut upload = ResourceUpload::new(&device)?;
/// upload.upload_buffer(bytemuck::cast_slice(&vertices), &vertex_buffer, 0, ResourceStates::COMMON)?;
/// upload.finish()?;
/// ```
pub struct ResourceUpload<'a> {
    backend: Arc<dyn GpuBackend>,
    queue: &'a CommandQueue,
    command_list: CommandList,
    staging: Vec<GpuBuffer>,
    staged_bytes: u64,
}

impl<'a> ResourceUpload<'a> {
    /// Start an upload on the device's queue.
    pub fn new(device: &'a Device) -> Result<Self, GraphicsError> {
        Self::with_queue(device.backend().clone(), device.queue())
    }

    /// Start an upload on an explicit queue.
    pub fn with_queue(
        backend: Arc<dyn GpuBackend>,
        queue: &'a CommandQueue,
    ) -> Result<Self, GraphicsError> {
        let mut command_list = CommandList::new(backend.clone(), "resource upload")?;
        command_list.reset(queue)?;
        Ok(Self {
            backend,
            queue,
            command_list,
            staging: Vec::new(),
            staged_bytes: 0,
        })
    }

    /// The list the copies are recorded into, for extra commands.
    pub fn command_list_mut(&mut self) -> &mut CommandList {
        &mut self.command_list
    }

    fn stage(&mut self, data: &[u8]) -> Result<GpuBuffer, GraphicsError> {
        let staging = self.backend.create_buffer(
            &BufferDescriptor::upload(data.len() as u64).with_label("upload staging"),
        )?;
        self.backend.write_buffer(&staging, 0, data)?;
        self.staging.push(staging.clone());
        self.staged_bytes += data.len() as u64;
        Ok(staging)
    }

    /// Copy `data` into `dst` at `dst_offset`.
    ///
    /// `state` is the buffer's current state. The buffer goes through
    /// `COPY_DEST` for the copy and is returned to `state` afterwards.
    pub fn upload_buffer(
        &mut self,
        data: &[u8],
        dst: &Buffer,
        dst_offset: u64,
        state: ResourceStates,
    ) -> Result<(), GraphicsError> {
        if data.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "upload data cannot be empty".to_string(),
            ));
        }
        if dst_offset
            .checked_add(data.len() as u64)
            .is_none_or(|end| end > dst.size())
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "upload of {} bytes at offset {} overruns '{}' ({} bytes)",
                data.len(),
                dst_offset,
                dst.label().unwrap_or("buffer"),
                dst.size()
            )));
        }

        let staging = self.stage(data)?;
        let needs_transition = state != ResourceStates::COPY_DEST;

        if needs_transition {
            self.command_list
                .add_barrier(dst, state, ResourceStates::COPY_DEST);
            self.command_list.dispatch_barriers();
        }
        self.command_list
            .copy_buffer_region(dst, dst_offset, &staging, 0, data.len() as u64);
        if needs_transition {
            self.command_list
                .add_barrier(dst, ResourceStates::COPY_DEST, state);
        }
        Ok(())
    }

    /// Copy pixel rows laid out as `footprint` into `dst`.
    ///
    /// `pixels` must cover `footprint` exactly. The texture moves from
    /// `before` to `COPY_DEST` for the copy and ends in `after`.
    pub fn upload_texture(
        &mut self,
        pixels: &[u8],
        footprint: ImageData,
        dst: &Texture,
        before: ResourceStates,
        after: ResourceStates,
    ) -> Result<(), GraphicsError> {
        let footprint = footprint.with_offset(0);
        if footprint.format.block_size() != dst.format().block_size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{:?} footprint cannot be copied into a {:?} texture",
                footprint.format,
                dst.format()
            )));
        }
        if footprint.row_pitch < footprint.unpadded_row_size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "row pitch {} is smaller than a {} byte row",
                footprint.row_pitch,
                footprint.unpadded_row_size()
            )));
        }
        if pixels.len() as u64 != footprint.size_in_bytes() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} bytes of pixels do not match a {}x{} {:?} footprint ({} bytes)",
                pixels.len(),
                footprint.width,
                footprint.height,
                footprint.format,
                footprint.size_in_bytes()
            )));
        }
        if footprint.width > dst.width() || footprint.height > dst.height() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{}x{} footprint does not fit in a {}x{} texture",
                footprint.width,
                footprint.height,
                dst.width(),
                dst.height()
            )));
        }

        let staging = self.stage(pixels)?;

        if before != ResourceStates::COPY_DEST {
            self.command_list
                .add_barrier(dst, before, ResourceStates::COPY_DEST);
            self.command_list.dispatch_barriers();
        }
        self.command_list
            .copy_texture_region(&staging, dst, footprint);
        if after != ResourceStates::COPY_DEST {
            self.command_list
                .add_barrier(dst, ResourceStates::COPY_DEST, after);
        }
        Ok(())
    }

    /// Bytes staged so far.
    pub fn staged_bytes(&self) -> u64 {
        self.staged_bytes
    }

    /// Submit and block until the GPU has executed every copy.
    ///
    /// Returns the fence value that covered the upload. The staging buffers
    /// are released only after that fence completed.
    pub fn finish(mut self) -> Result<u64, GraphicsError> {
        profile_scope!("resource_upload_finish");

        self.queue
            .execute_command_lists(&mut [&mut self.command_list])?;
        let fence = self.queue.flush()?;

        log::debug!(
            "Upload finished: {} bytes in {} staging buffers (fence {})",
            self.staged_bytes,
            self.staging.len(),
            fence
        );
        Ok(fence)
    }
}

impl std::fmt::Debug for ResourceUpload<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceUpload")
            .field("staging_buffers", &self.staging.len())
            .field("staged_bytes", &self.staged_bytes)
            .field("commands", &self.command_list.commands().len())
            .finish()
    }
}
