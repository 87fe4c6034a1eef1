//! Graphics device.
//!
//! The [`Device`] is the composition root of the frame pipeline. It owns the
//! command queue, the descriptor tables, the frame ring and the back
//! buffers, and creates every long-lived GPU resource.

use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::Mutex;

use crate::backend::{BackendType, GpuBackend, GpuDescriptorHeap, create_backend};
use crate::config::DeviceConfig;
use crate::descriptor::{
    AllocationPolicy, CpuDescriptorHandle, Descriptor, DescriptorKind, DescriptorTable,
    ViewDescriptor,
};
use crate::error::GraphicsError;
use crate::pipeline::{FrameBegin, FrameResource, FrameRing};
use crate::profiling::profile_scope;
use crate::queue::CommandQueue;
use crate::render_state::{
    GraphicsPipelineDescriptor, PipelineState, Registry, RootParameters, RootSignature,
};
use crate::resources::{Buffer, Texture};
use crate::types::{
    BufferDescriptor, BufferSrvDescriptor, ImageData, ResourceFlags, ResourceStates,
    ScissorRect, TextureDescriptor, TextureFormat, Viewport, constant_buffer_size,
};
use crate::upload::ResourceUpload;

/// The GPU device: queue, descriptor tables, frame ring and resource
/// factories.
///
/// Everything that renders takes a `&Device` or `&mut Device`; there is no
/// global instance.
///
/// # Frame Loop
///
/// ```ignore
/// let mut device = Device::new(DeviceConfig::default())?;
///
/// loop {
///     device.begin_frame()?;
///     let rtv = device.render_target_view();
///     let back_buffer = device.render_target().gpu().clone();
///     let frame = device.frame_resource_mut();
///     frame.command_list.add_barrier(&back_buffer, ResourceStates::PRESENT, ResourceStates::RENDER_TARGET);
///     frame.command_list.dispatch_barriers();
///     frame.command_list.clear_render_target(rtv, [0.0, 0.0, 0.0, 1.0]);
///     frame.command_list.add_barrier(&back_buffer, ResourceStates::RENDER_TARGET, ResourceStates::PRESENT);
///     device.end_frame()?;
///     device.present();
/// }
/// ```
///
/// # Thread Safety
///
/// `Device` is `Send + Sync`. Factory methods take `&self` and lock the
/// descriptor tables and registries internally. Frame methods take
/// `&mut self`, so only one thread drives the frame loop.
pub struct Device {
    config: DeviceConfig,
    backend: Arc<dyn GpuBackend>,
    queue: CommandQueue,
    rtv_table: Mutex<DescriptorTable>,
    dsv_table: Mutex<DescriptorTable>,
    cbv_srv_uav_table: Mutex<DescriptorTable>,
    frames: FrameRing,
    back_buffers: Vec<Texture>,
    back_buffer_index: usize,
    depth_buffer: Texture,
    viewport: Viewport,
    scissor: ScissorRect,
    root_signatures: Mutex<Registry<RootSignature>>,
    pipeline_states: Mutex<Registry<PipelineState>>,
}

impl Device {
    /// Create a device on the best available backend.
    pub fn new(config: DeviceConfig) -> Result<Self, GraphicsError> {
        let backend = create_backend(BackendType::Auto)?;
        Self::with_backend(backend, config)
    }

    /// Create a device on an explicit backend.
    ///
    /// Fails with [`GraphicsError::InvalidParameter`] before allocating
    /// anything if `config` does not validate.
    pub fn with_backend(
        backend: Arc<dyn GpuBackend>,
        config: DeviceConfig,
    ) -> Result<Self, GraphicsError> {
        config.validate()?;

        let queue = CommandQueue::new(backend.clone());
        let mut rtv_table = DescriptorTable::new(
            backend.clone(),
            DescriptorKind::Rtv,
            config.rtv_capacity,
            false,
            AllocationPolicy::Monotonic,
        )?;
        let mut dsv_table = DescriptorTable::new(
            backend.clone(),
            DescriptorKind::Dsv,
            config.dsv_capacity,
            false,
            AllocationPolicy::Monotonic,
        )?;
        let mut cbv_srv_uav_table = DescriptorTable::new(
            backend.clone(),
            DescriptorKind::CbvSrvUav,
            config.cbv_srv_uav_capacity,
            true,
            AllocationPolicy::Monotonic,
        )?;

        let mut frames = FrameRing::new(
            backend.clone(),
            config.frames_in_flight,
            config.linear_allocator_size,
            config.frame_constants_size,
        )?;
        for frame in frames.frames_mut() {
            let constants = frame.constants_mut();
            constants.cbv = cbv_srv_uav_table.allocate_view(&ViewDescriptor::ConstantBuffer {
                address: constants.gpu_address(),
                size: constants.size(),
            })?;
        }

        let mut back_buffers = Vec::with_capacity(config.frames_in_flight);
        for index in 0..config.frames_in_flight {
            let mut texture = create_back_buffer(&backend, &config, index, config.width, config.height)?;
            texture.rtv = rtv_table.allocate_view(&ViewDescriptor::RenderTarget {
                texture: texture.gpu().clone(),
                format: texture.format(),
            })?;
            back_buffers.push(texture);
        }

        let mut depth_buffer = create_depth_buffer(&backend, &config, config.width, config.height)?;
        depth_buffer.dsv = dsv_table.allocate_view(&ViewDescriptor::DepthStencil {
            texture: depth_buffer.gpu().clone(),
            format: depth_buffer.format(),
        })?;

        log::info!(
            "Created device '{}' on {} backend ({}x{}, {} frames in flight)",
            config.label,
            backend.name(),
            config.width,
            config.height,
            config.frames_in_flight
        );

        Ok(Self {
            viewport: Viewport::new(config.width, config.height),
            scissor: ScissorRect::new(config.width, config.height),
            backend,
            queue,
            rtv_table: Mutex::new(rtv_table),
            dsv_table: Mutex::new(dsv_table),
            cbv_srv_uav_table: Mutex::new(cbv_srv_uav_table),
            frames,
            back_buffers,
            back_buffer_index: 0,
            depth_buffer,
            root_signatures: Mutex::new(Registry::new("root signature")),
            pipeline_states: Mutex::new(Registry::new("pipeline state")),
            config,
        })
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    /// Move to the next frame resource and make it safe to record into.
    ///
    /// Must be called exactly once per visual frame, before any other
    /// per-frame call. Blocks while the GPU still uses the slot.
    pub fn begin_frame(&mut self) -> Result<FrameBegin, GraphicsError> {
        self.frames.begin_frame(&self.queue)
    }

    /// Submit the current frame resource. Returns the fence covering it.
    pub fn end_frame(&mut self) -> Result<u64, GraphicsError> {
        self.frames.end_frame(&self.queue)
    }

    /// Advance to the next back buffer.
    ///
    /// Handing the image to a window system is the caller's job.
    pub fn present(&mut self) {
        self.back_buffer_index = (self.back_buffer_index + 1) % self.back_buffers.len();
        log::trace!("Present, next back buffer {}", self.back_buffer_index);
    }

    /// The frame resource of the current frame.
    pub fn frame_resource(&self) -> &FrameResource {
        self.frames.frame()
    }

    pub fn frame_resource_mut(&mut self) -> &mut FrameResource {
        self.frames.frame_mut()
    }

    pub fn frame_ring(&self) -> &FrameRing {
        &self.frames
    }

    /// Drain the queue: signal and wait for the GPU to catch up.
    pub fn flush(&self) -> Result<u64, GraphicsError> {
        profile_scope!("device_flush");
        self.queue.flush()
    }

    /// Wait until no submitted work remains. Call before dropping resources
    /// that frames may still reference.
    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        self.flush().map(|_| ())
    }

    /// Recreate the back buffers and depth buffer at a new size.
    ///
    /// The queue is flushed first. The new textures are written into the
    /// same descriptor slots, so views held by callers stay valid.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        if width == self.config.width && height == self.config.height {
            return Ok(());
        }

        self.flush()?;

        // Create everything before touching a slot, so a failed creation
        // leaves the old buffers, views and sizes in place.
        let mut back_buffers = (0..self.back_buffers.len())
            .map(|index| create_back_buffer(&self.backend, &self.config, index, width, height))
            .collect::<Result<Vec<_>, _>>()?;
        let mut depth_buffer = create_depth_buffer(&self.backend, &self.config, width, height)?;

        {
            let rtv_table = self.rtv_table.lock();
            for (texture, old) in back_buffers.iter_mut().zip(&self.back_buffers) {
                rtv_table.write(
                    &old.rtv,
                    &ViewDescriptor::RenderTarget {
                        texture: texture.gpu().clone(),
                        format: texture.format(),
                    },
                )?;
                texture.rtv = old.rtv;
            }
        }
        self.dsv_table.lock().write(
            &self.depth_buffer.dsv,
            &ViewDescriptor::DepthStencil {
                texture: depth_buffer.gpu().clone(),
                format: depth_buffer.format(),
            },
        )?;
        depth_buffer.dsv = self.depth_buffer.dsv;

        self.back_buffers = back_buffers;
        self.depth_buffer = depth_buffer;

        self.config.width = width;
        self.config.height = height;
        self.viewport = Viewport::new(width, height);
        self.scissor = ScissorRect::new(width, height);
        self.back_buffer_index = 0;

        log::info!("Resized device '{}' to {}x{}", self.config.label, width, height);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    /// Create a committed buffer. Views are created separately.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<Buffer, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let gpu = self.backend.create_buffer(descriptor)?;
        log::debug!(
            "Device: created buffer '{}' ({} bytes, {:?} heap)",
            descriptor.display_label(),
            descriptor.size,
            descriptor.heap
        );
        Ok(Buffer::new(gpu, descriptor.clone()))
    }

    /// Create a host-visible buffer, optionally filled with `initial_data`.
    pub fn create_upload_buffer(
        &self,
        size: u64,
        initial_data: Option<&[u8]>,
    ) -> Result<Buffer, GraphicsError> {
        if let Some(data) = initial_data
            && data.len() as u64 > size
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} bytes of initial data do not fit a {} byte upload buffer",
                data.len(),
                size
            )));
        }

        let buffer = self.create_buffer(&BufferDescriptor::upload(size).with_label("upload buffer"))?;
        if let Some(data) = initial_data
            && !data.is_empty()
        {
            self.backend.write_buffer(buffer.gpu(), 0, data)?;
        }
        Ok(buffer)
    }

    /// Create an upload buffer holding `data`.
    pub fn create_upload_buffer_from_slice<T: Pod>(&self, data: &[T]) -> Result<Buffer, GraphicsError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.create_upload_buffer(bytes.len() as u64, Some(bytes))
    }

    /// Create a buffer the CPU can read after the GPU copies into it.
    pub fn create_readback_buffer(&self, size: u64) -> Result<Buffer, GraphicsError> {
        self.create_buffer(&BufferDescriptor::readback(size).with_label("readback buffer"))
    }

    /// Write into a host-visible buffer.
    pub fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        self.backend.write_buffer(buffer.gpu(), offset, data)
    }

    /// Read the whole contents of a host-visible buffer.
    ///
    /// Only meaningful once the GPU work writing the buffer has completed.
    pub fn read_buffer(&self, buffer: &Buffer) -> Result<Vec<u8>, GraphicsError> {
        self.backend.read_buffer(buffer.gpu(), 0, buffer.size())
    }

    /// Create (or rewrite) the buffer's shader resource view in the
    /// shader-visible table. Returns the descriptor, whose index is the
    /// bindless handle.
    pub fn create_shader_resource_view(
        &self,
        buffer: &mut Buffer,
        desc: BufferSrvDescriptor,
    ) -> Result<Descriptor, GraphicsError> {
        check_buffer_range(buffer, &desc)?;
        let view = ViewDescriptor::BufferSrv {
            buffer: buffer.gpu().clone(),
            desc,
        };
        buffer.srv = self.write_shader_visible(buffer.srv, &view)?;
        Ok(buffer.srv)
    }

    /// Create (or rewrite) the buffer's unordered access view.
    pub fn create_unordered_access_view(
        &self,
        buffer: &mut Buffer,
        desc: BufferSrvDescriptor,
    ) -> Result<Descriptor, GraphicsError> {
        check_buffer_range(buffer, &desc)?;
        let view = ViewDescriptor::BufferUav {
            buffer: buffer.gpu().clone(),
            desc,
        };
        buffer.uav = self.write_shader_visible(buffer.uav, &view)?;
        Ok(buffer.uav)
    }

    /// Create (or rewrite) a constant buffer view over the whole buffer.
    ///
    /// The buffer size must be a multiple of 256 bytes.
    pub fn create_constant_buffer_view(&self, buffer: &mut Buffer) -> Result<Descriptor, GraphicsError> {
        if constant_buffer_size(buffer.size()) != buffer.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "constant buffer views need a multiple of 256 bytes, '{}' has {}",
                buffer.label().unwrap_or("buffer"),
                buffer.size()
            )));
        }
        let view = ViewDescriptor::ConstantBuffer {
            address: buffer.gpu_address(),
            size: buffer.size(),
        };
        buffer.cbv = self.write_shader_visible(buffer.cbv, &view)?;
        Ok(buffer.cbv)
    }

    fn write_shader_visible(
        &self,
        existing: Descriptor,
        view: &ViewDescriptor,
    ) -> Result<Descriptor, GraphicsError> {
        let mut table = self.cbv_srv_uav_table.lock();
        if existing.is_valid() {
            table.write(&existing, view)?;
            Ok(existing)
        } else {
            table.allocate_view(view)
        }
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    /// Create a committed 2D texture.
    ///
    /// Depth formats start in `DEPTH_WRITE`, everything else in `COMMON`.
    /// Render-target and depth-stencil views are allocated when `flags`
    /// allow them.
    pub fn create_texture_2d(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        flags: ResourceFlags,
    ) -> Result<Texture, GraphicsError> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }
        if format.is_depth_stencil() != flags.contains(ResourceFlags::ALLOW_DEPTH_STENCIL) {
            return Err(GraphicsError::InvalidParameter(format!(
                "{format:?} textures {} ALLOW_DEPTH_STENCIL",
                if format.is_depth_stencil() {
                    "require"
                } else {
                    "cannot use"
                }
            )));
        }

        let descriptor = TextureDescriptor::new_2d(width, height, format).with_flags(flags);
        let initial_state = if format.is_depth_stencil() {
            ResourceStates::DEPTH_WRITE
        } else {
            ResourceStates::COMMON
        };
        let gpu = self.backend.create_texture(&descriptor, initial_state)?;
        let mut texture = Texture::new(gpu, descriptor, initial_state);

        if flags.contains(ResourceFlags::ALLOW_RENDER_TARGET) {
            texture.rtv = self.rtv_table.lock().allocate_view(&ViewDescriptor::RenderTarget {
                texture: texture.gpu().clone(),
                format,
            })?;
        }
        if flags.contains(ResourceFlags::ALLOW_DEPTH_STENCIL) {
            texture.dsv = self.dsv_table.lock().allocate_view(&ViewDescriptor::DepthStencil {
                texture: texture.gpu().clone(),
                format,
            })?;
        }

        log::debug!(
            "Device: created texture {}x{} {:?} ({:?})",
            width,
            height,
            format,
            flags
        );
        Ok(texture)
    }

    /// Create (or rewrite) the texture's shader resource view.
    pub fn create_texture_srv(&self, texture: &mut Texture) -> Result<Descriptor, GraphicsError> {
        if texture.descriptor().flags.contains(ResourceFlags::DENY_SHADER_RESOURCE) {
            return Err(GraphicsError::InvalidParameter(
                "texture was created with DENY_SHADER_RESOURCE".to_string(),
            ));
        }
        let view = ViewDescriptor::TextureSrv {
            texture: texture.gpu().clone(),
            format: texture.format(),
        };
        texture.srv = self.write_shader_visible(texture.srv, &view)?;
        Ok(texture.srv)
    }

    /// Create (or rewrite) the texture's unordered access view.
    pub fn create_texture_uav(&self, texture: &mut Texture) -> Result<Descriptor, GraphicsError> {
        if !texture.descriptor().flags.contains(ResourceFlags::ALLOW_UNORDERED_ACCESS) {
            return Err(GraphicsError::InvalidParameter(
                "texture was created without ALLOW_UNORDERED_ACCESS".to_string(),
            ));
        }
        let view = ViewDescriptor::TextureUav {
            texture: texture.gpu().clone(),
            format: texture.format(),
        };
        texture.uav = self.write_shader_visible(texture.uav, &view)?;
        Ok(texture.uav)
    }

    /// Upload pixels into `texture` and block until the copy completed.
    ///
    /// The texture must be in its initial state and ends in
    /// `PIXEL_SHADER_RESOURCE`. Returns the fence covering the upload.
    pub fn copy_to_texture(
        &self,
        pixels: &[u8],
        footprint: ImageData,
        texture: &Texture,
    ) -> Result<u64, GraphicsError> {
        let mut upload = ResourceUpload::new(self)?;
        upload.upload_texture(
            pixels,
            footprint,
            texture,
            texture.initial_state(),
            ResourceStates::PIXEL_SHADER_RESOURCE,
        )?;
        upload.finish()
    }

    /// Create a shader-readable `Rgba8Unorm` texture from tightly packed
    /// pixels.
    ///
    /// Textures loaded this way are shared between the materials that use
    /// them.
    pub fn create_texture_from_pixels(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Arc<Texture>, GraphicsError> {
        let footprint = ImageData::new(width, height, TextureFormat::Rgba8Unorm);
        let mut texture =
            self.create_texture_2d(width, height, TextureFormat::Rgba8Unorm, ResourceFlags::empty())?;
        self.copy_to_texture(pixels, footprint, &texture)?;
        self.create_texture_srv(&mut texture)?;
        Ok(Arc::new(texture))
    }

    /// Copy a texture into a readback buffer and return its tightly packed
    /// texels.
    ///
    /// `state` is the texture's current state, restored afterwards. Blocks
    /// until the copy completed.
    pub fn read_back_texture(
        &self,
        texture: &Texture,
        state: ResourceStates,
    ) -> Result<Vec<u8>, GraphicsError> {
        let footprint = texture.footprint();
        let readback = self.create_readback_buffer(footprint.size_in_bytes())?;

        let mut upload = ResourceUpload::new(self)?;
        let list = upload.command_list_mut();
        if state != ResourceStates::COPY_SOURCE {
            list.add_barrier(texture, state, ResourceStates::COPY_SOURCE);
            list.dispatch_barriers();
        }
        list.copy_texture_to_buffer(texture, &readback, footprint);
        if state != ResourceStates::COPY_SOURCE {
            list.add_barrier(texture, ResourceStates::COPY_SOURCE, state);
        }
        upload.finish()?;

        self.read_buffer(&readback)
    }

    // ------------------------------------------------------------------
    // Descriptor tables
    // ------------------------------------------------------------------

    /// Create an extra descriptor table, for callers with their own
    /// allocation pattern such as a debug overlay.
    pub fn create_descriptor_table(
        &self,
        kind: DescriptorKind,
        capacity: u32,
        shader_visible: bool,
        policy: AllocationPolicy,
    ) -> Result<DescriptorTable, GraphicsError> {
        DescriptorTable::new(self.backend.clone(), kind, capacity, shader_visible, policy)
    }

    /// Heap of the shared shader-visible table, for
    /// [`CommandList::set_descriptor_heaps`](crate::CommandList::set_descriptor_heaps).
    pub fn shader_visible_heap(&self) -> GpuDescriptorHeap {
        self.cbv_srv_uav_table.lock().heap().clone()
    }

    /// Slots in use in the shared shader-visible table.
    pub fn shader_visible_descriptors_used(&self) -> usize {
        self.cbv_srv_uav_table.lock().len()
    }

    // ------------------------------------------------------------------
    // Root signatures and pipeline states
    // ------------------------------------------------------------------

    /// Create a root signature and register it under `name`.
    pub fn add_root_signature(
        &self,
        name: &str,
        parameters: RootParameters,
    ) -> Result<Arc<RootSignature>, GraphicsError> {
        let root_signature = Arc::new(RootSignature::new(&self.backend, name, parameters)?);
        self.root_signatures
            .lock()
            .insert(name, root_signature.clone());
        Ok(root_signature)
    }

    /// Look up a root signature. Logs a warning on a miss.
    pub fn root_signature(&self, name: &str) -> Option<Arc<RootSignature>> {
        self.root_signatures.lock().get(name)
    }

    /// Look up a root signature, failing with [`GraphicsError::NotFound`].
    pub fn require_root_signature(&self, name: &str) -> Result<Arc<RootSignature>, GraphicsError> {
        self.root_signatures.lock().get_required(name)
    }

    /// Create a graphics pipeline state and register it under `name`.
    pub fn add_graphics_pipeline_state(
        &self,
        name: &str,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<Arc<PipelineState>, GraphicsError> {
        let pipeline = Arc::new(PipelineState::new(&self.backend, name, descriptor)?);
        self.pipeline_states.lock().insert(name, pipeline.clone());
        Ok(pipeline)
    }

    /// Look up a pipeline state. Logs a warning on a miss.
    pub fn pipeline_state(&self, name: &str) -> Option<Arc<PipelineState>> {
        self.pipeline_states.lock().get(name)
    }

    /// Look up a pipeline state, failing with [`GraphicsError::NotFound`].
    pub fn require_pipeline_state(&self, name: &str) -> Result<Arc<PipelineState>, GraphicsError> {
        self.pipeline_states.lock().get_required(name)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The back buffer the current frame renders into.
    pub fn render_target(&self) -> &Texture {
        &self.back_buffers[self.back_buffer_index]
    }

    pub fn render_target_view(&self) -> CpuDescriptorHandle {
        self.render_target().rtv().cpu
    }

    pub fn back_buffer_index(&self) -> usize {
        self.back_buffer_index
    }

    pub fn depth_stencil_buffer(&self) -> &Texture {
        &self.depth_buffer
    }

    pub fn depth_stencil_view(&self) -> CpuDescriptorHandle {
        self.depth_buffer.dsv().cpu
    }

    /// Viewport covering the whole back buffer.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Scissor covering the whole back buffer.
    pub fn scissor(&self) -> ScissorRect {
        self.scissor
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }
}

fn create_back_buffer(
    backend: &Arc<dyn GpuBackend>,
    config: &DeviceConfig,
    index: usize,
    width: u32,
    height: u32,
) -> Result<Texture, GraphicsError> {
    let descriptor = TextureDescriptor::new_2d(width, height, config.back_buffer_format)
        .with_label(format!("back buffer {index}"))
        .with_flags(ResourceFlags::ALLOW_RENDER_TARGET);
    let gpu = backend.create_texture(&descriptor, ResourceStates::PRESENT)?;
    Ok(Texture::new(gpu, descriptor, ResourceStates::PRESENT))
}

fn create_depth_buffer(
    backend: &Arc<dyn GpuBackend>,
    config: &DeviceConfig,
    width: u32,
    height: u32,
) -> Result<Texture, GraphicsError> {
    let descriptor = TextureDescriptor::new_2d(width, height, config.depth_format)
        .with_label("depth buffer")
        .with_flags(ResourceFlags::ALLOW_DEPTH_STENCIL | ResourceFlags::DENY_SHADER_RESOURCE);
    let gpu = backend.create_texture(&descriptor, ResourceStates::DEPTH_WRITE)?;
    Ok(Texture::new(gpu, descriptor, ResourceStates::DEPTH_WRITE))
}

fn check_buffer_range(buffer: &Buffer, desc: &BufferSrvDescriptor) -> Result<(), GraphicsError> {
    if desc.byte_range_end() > buffer.size() {
        return Err(GraphicsError::InvalidParameter(format!(
            "view ends at byte {} of a {} byte buffer",
            desc.byte_range_end(),
            buffer.size()
        )));
    }
    Ok(())
}

impl Drop for Device {
    fn drop(&mut self) {
        match self.queue.flush() {
            Ok(fence) => log::info!(
                "Device '{}' shut down after fence {}",
                self.config.label,
                fence
            ),
            Err(err) => log::error!(
                "Device '{}' could not drain the queue on shutdown: {}",
                self.config.label,
                err
            ),
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("label", &self.config.label)
            .field("backend", &self.backend.name())
            .field("size", &(self.config.width, self.config.height))
            .field("frames", &self.frames)
            .field("back_buffer_index", &self.back_buffer_index)
            .finish_non_exhaustive()
    }
}

// Ensure Device is Send + Sync
static_assertions::assert_impl_all!(Device: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, DummyConfig};
    use crate::types::{BufferUsage, ShaderVisibility};

    fn create_test_device() -> Device {
        Device::with_backend(
            Arc::new(DummyBackend::new()),
            DeviceConfig::default().with_size(64, 32),
        )
        .unwrap()
    }

    #[test]
    fn test_startup_descriptors() {
        let device = create_test_device();
        assert_eq!(device.rtv_table.lock().len(), 3);
        assert_eq!(device.dsv_table.lock().len(), 1);
        assert_eq!(device.shader_visible_descriptors_used(), 3);
        assert!(device.frame_resource().constants().cbv().is_valid());
        assert!(device.render_target().rtv().is_valid());
        assert!(device.depth_stencil_buffer().dsv().is_valid());
    }

    #[test]
    fn test_viewport_and_scissor() {
        let device = create_test_device();
        assert_eq!(device.viewport(), Viewport::new(64, 32));
        assert_eq!(device.scissor(), ScissorRect::new(64, 32));
    }

    #[test]
    fn test_present_cycles_back_buffers() {
        let mut device = create_test_device();
        let first = device.render_target_view();
        device.present();
        assert_eq!(device.back_buffer_index(), 1);
        assert_ne!(device.render_target_view(), first);
        device.present();
        device.present();
        assert_eq!(device.back_buffer_index(), 0);
        assert_eq!(device.render_target_view(), first);
    }

    #[test]
    fn test_create_buffer_zero_size() {
        let device = create_test_device();
        let result = device.create_buffer(&BufferDescriptor::new(0, BufferUsage::VERTEX));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_upload_buffer_initial_data() {
        let device = create_test_device();
        let values = [1.0f32, 2.0, 3.0, 4.0];
        let buffer = device.create_upload_buffer_from_slice(&values).unwrap();
        assert_eq!(buffer.size(), 16);
        let bytes = device.read_buffer(&buffer).unwrap();
        assert_eq!(bytemuck::cast_slice::<u8, f32>(&bytes), &values);
    }

    #[test]
    fn test_upload_buffer_data_too_large() {
        let device = create_test_device();
        assert!(device.create_upload_buffer(4, Some(&[0; 8])).is_err());
    }

    #[test]
    fn test_views_keep_their_slot() {
        let device = create_test_device();
        let mut buffer = device
            .create_buffer(&BufferDescriptor::new(
                1024,
                BufferUsage::SHADER_RESOURCE | BufferUsage::UNORDERED_ACCESS,
            ))
            .unwrap();
        let first = device
            .create_shader_resource_view(&mut buffer, BufferSrvDescriptor::structured(16, 64))
            .unwrap();
        let second = device
            .create_shader_resource_view(&mut buffer, BufferSrvDescriptor::structured(32, 32))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(buffer.srv().index_or_none(), 3);

        let uav = device
            .create_unordered_access_view(&mut buffer, BufferSrvDescriptor::raw(256))
            .unwrap();
        assert_eq!(uav.index, 4);
    }

    #[test]
    fn test_view_past_end_rejected() {
        let device = create_test_device();
        let mut buffer = device
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::SHADER_RESOURCE))
            .unwrap();
        let result =
            device.create_shader_resource_view(&mut buffer, BufferSrvDescriptor::structured(16, 16));
        assert!(result.is_err());
        assert!(!buffer.srv().is_valid());
    }

    #[test]
    fn test_constant_buffer_view_size() {
        let device = create_test_device();
        let mut odd = device.create_upload_buffer(100, None).unwrap();
        assert!(device.create_constant_buffer_view(&mut odd).is_err());

        let mut aligned = device.create_upload_buffer(512, None).unwrap();
        let cbv = device.create_constant_buffer_view(&mut aligned).unwrap();
        assert!(cbv.gpu.0 != 0);
    }

    #[test]
    fn test_texture_flags_and_views() {
        let device = create_test_device();
        let target = device
            .create_texture_2d(
                16,
                16,
                TextureFormat::Rgba8Unorm,
                ResourceFlags::ALLOW_RENDER_TARGET,
            )
            .unwrap();
        assert!(target.rtv().is_valid());
        assert_eq!(target.initial_state(), ResourceStates::COMMON);

        let depth = device.create_texture_2d(
            16,
            16,
            TextureFormat::Depth32Float,
            ResourceFlags::ALLOW_DEPTH_STENCIL,
        );
        // The only depth slot is taken by the device's own depth buffer.
        assert!(matches!(depth, Err(GraphicsError::CapacityExceeded { .. })));

        let wrong = device.create_texture_2d(
            16,
            16,
            TextureFormat::Depth32Float,
            ResourceFlags::empty(),
        );
        assert!(matches!(wrong, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_texture_uav() {
        let device = create_test_device();
        let mut storage = device
            .create_texture_2d(
                8,
                8,
                TextureFormat::Rgba16Float,
                ResourceFlags::ALLOW_UNORDERED_ACCESS,
            )
            .unwrap();
        let srv = device.create_texture_srv(&mut storage).unwrap();
        let uav = device.create_texture_uav(&mut storage).unwrap();
        assert_eq!(storage.uav(), uav);
        assert_eq!(uav.index, srv.index + 1);

        // Rewriting keeps the slot
        assert_eq!(device.create_texture_uav(&mut storage).unwrap(), uav);
        assert_eq!(device.shader_visible_descriptors_used(), 5);

        let mut sampled = device
            .create_texture_2d(8, 8, TextureFormat::Rgba8Unorm, ResourceFlags::empty())
            .unwrap();
        assert!(matches!(
            device.create_texture_uav(&mut sampled),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(!sampled.uav().is_valid());
    }

    #[test]
    fn test_texture_from_pixels() {
        let device = create_test_device();
        let pixels: Vec<u8> = (0..4 * 4 * 4).map(|i| i as u8).collect();
        let texture = device.create_texture_from_pixels(&pixels, 4, 4).unwrap();
        assert!(texture.srv().is_valid());

        let texels = device
            .read_back_texture(&texture, ResourceStates::PIXEL_SHADER_RESOURCE)
            .unwrap();
        assert_eq!(texels, pixels);
    }

    #[test]
    fn test_registries() {
        let device = create_test_device();
        let root_signature = device
            .add_root_signature(
                "opaque",
                RootParameters::new().add_32bit_constants(0, 0, 4, ShaderVisibility::All),
            )
            .unwrap();
        assert_eq!(device.root_signature("opaque").unwrap().name(), "opaque");
        assert!(device.root_signature("missing").is_none());
        assert!(matches!(
            device.require_pipeline_state("missing"),
            Err(GraphicsError::NotFound { .. })
        ));

        let desc = GraphicsPipelineDescriptor::new(
            root_signature,
            crate::render_state::ShaderModule::vertex(vec![1, 2, 3], "vs_main"),
            crate::render_state::ShaderModule::pixel(vec![4, 5, 6], "ps_main"),
        );
        device.add_graphics_pipeline_state("opaque", &desc).unwrap();
        assert!(device.pipeline_state("opaque").is_some());
    }

    #[test]
    fn test_resize_keeps_descriptor_slots() {
        let mut device = create_test_device();
        let rtv = device.render_target_view();
        let dsv = device.depth_stencil_view();

        device.resize(128, 96).unwrap();
        assert_eq!(device.render_target().width(), 128);
        assert_eq!(device.depth_stencil_buffer().height(), 96);
        assert_eq!(device.render_target_view(), rtv);
        assert_eq!(device.depth_stencil_view(), dsv);
        assert_eq!(device.viewport(), Viewport::new(128, 96));

        assert!(device.resize(0, 10).is_err());
    }

    #[test]
    fn test_failed_resize_keeps_old_buffers() {
        let backend = Arc::new(DummyBackend::with_config(
            DummyConfig::default().with_memory_budget(64 * 1024),
        ));
        let mut device = Device::with_backend(
            backend.clone(),
            DeviceConfig::default().with_size(32, 32).with_linear_allocator_size(4096),
        )
        .unwrap();
        let used = backend.memory_used();
        let rtv = device.render_target_view();

        // Three 16 KiB back buffers cannot fit next to the old ones
        let result = device.resize(64, 64);
        assert!(matches!(result, Err(GraphicsError::ResourceCreation { .. })));
        assert_eq!(backend.memory_used(), used);
        assert_eq!((device.config().width, device.config().height), (32, 32));
        assert_eq!(device.viewport(), Viewport::new(32, 32));
        assert_eq!(device.scissor(), ScissorRect::new(32, 32));
        for _ in 0..device.config().frames_in_flight {
            assert_eq!(device.render_target().width(), 32);
            device.present();
        }
        assert_eq!(device.depth_stencil_buffer().width(), 32);
        assert_eq!(device.render_target_view(), rtv);

        device.resize(40, 40).unwrap();
        assert_eq!(device.render_target().width(), 40);
        assert_eq!(device.depth_stencil_buffer().height(), 40);
    }

    #[test]
    fn test_zero_frames_in_flight_rejected() {
        let result = Device::with_backend(
            Arc::new(DummyBackend::new()),
            DeviceConfig::default().with_frames_in_flight(0),
        );
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_frame_loop_through_device() {
        let mut device = create_test_device();
        for expected in 1..=5 {
            device.begin_frame().unwrap();
            device
                .frame_resource()
                .write_constants(&crate::types::SceneConstants::default())
                .unwrap();
            assert_eq!(device.end_frame().unwrap(), expected);
            device.present();
        }
        device.wait_idle().unwrap();
        assert!(device.frame_ring().is_idle(device.queue()));
    }

    #[test]
    fn test_budget_overrun_at_startup() {
        let backend = Arc::new(DummyBackend::with_config(
            DummyConfig::default().with_memory_budget(1024),
        ));
        let result = Device::with_backend(backend, DeviceConfig::default());
        assert!(matches!(
            result,
            Err(GraphicsError::ResourceCreation { .. })
        ));
    }
}
