//! Host memory standing in for GPU resources.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::types::{HeapType, ImageData, ResourceStates, TextureFormat};

/// GPU virtual addresses of buffers start here.
pub(super) const GPU_ADDRESS_BASE: u64 = 0x1_0000_0000;

/// Buffer placement alignment. Every buffer address is a multiple of this.
pub(super) const RESOURCE_PLACEMENT_ALIGNMENT: u64 = 64 * 1024;

/// Bytes of simulated video memory in use, against a fixed limit.
#[derive(Debug)]
pub(super) struct MemoryBudget {
    limit: u64,
    used: AtomicU64,
}

impl MemoryBudget {
    pub(super) fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
        }
    }

    /// Reserve `size` bytes. Returns false, reserving nothing, if that would
    /// exceed the limit.
    pub(super) fn reserve(&self, size: u64) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(size).filter(|total| *total <= self.limit)
            })
            .is_ok()
    }

    pub(super) fn release(&self, size: u64) {
        self.used.fetch_sub(size, Ordering::AcqRel);
    }

    pub(super) fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    pub(super) fn limit(&self) -> u64 {
        self.limit
    }
}

/// What a [`DummyResource`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummyResourceKind {
    Buffer { heap: HeapType },
    Texture {
        width: u32,
        height: u32,
        format: TextureFormat,
    },
}

/// A buffer or texture living in host memory.
///
/// Textures are stored tightly packed, row after row. The tracked state is
/// what the simulated GPU believes after the barriers it has executed.
pub struct DummyResource {
    id: u64,
    label: String,
    kind: DummyResourceKind,
    gpu_address: u64,
    data: Mutex<Vec<u8>>,
    state: Mutex<ResourceStates>,
    budget: Arc<MemoryBudget>,
}

impl DummyResource {
    pub(super) fn new(
        id: u64,
        label: String,
        kind: DummyResourceKind,
        gpu_address: u64,
        size: u64,
        initial_state: ResourceStates,
        budget: Arc<MemoryBudget>,
    ) -> Self {
        Self {
            id,
            label,
            kind,
            gpu_address,
            data: Mutex::new(vec![0u8; size as usize]),
            state: Mutex::new(initial_state),
            budget,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> DummyResourceKind {
        self.kind
    }

    /// Zero for textures.
    pub fn gpu_address(&self) -> u64 {
        self.gpu_address
    }

    pub fn size(&self) -> u64 {
        self.data.lock().len() as u64
    }

    /// Resource state as of the last executed barrier.
    pub fn state(&self) -> ResourceStates {
        *self.state.lock()
    }

    /// Move to `after`, returning the state the resource was really in.
    pub(super) fn transition(&self, after: ResourceStates) -> ResourceStates {
        std::mem::replace(&mut *self.state.lock(), after)
    }

    pub(super) fn data(&self) -> parking_lot::MutexGuard<'_, Vec<u8>> {
        self.data.lock()
    }

    fn texture_layout(&self) -> Option<(u32, u32, TextureFormat)> {
        match self.kind {
            DummyResourceKind::Texture {
                width,
                height,
                format,
            } => Some((width, height, format)),
            DummyResourceKind::Buffer { .. } => None,
        }
    }
}

impl Drop for DummyResource {
    fn drop(&mut self) {
        self.budget.release(self.data.get_mut().len() as u64);
    }
}

impl std::fmt::Debug for DummyResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyResource")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("gpu_address", &format_args!("{:#x}", self.gpu_address))
            .finish()
    }
}

/// Why a simulated copy was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CopyError(pub String);

pub(super) fn copy_buffer_region(
    dst: &DummyResource,
    dst_offset: u64,
    src: &DummyResource,
    src_offset: u64,
    size: u64,
) -> Result<(), CopyError> {
    let src_end = src_offset.checked_add(size);
    let dst_end = dst_offset.checked_add(size);

    if dst.id == src.id {
        let mut data = dst.data();
        let len = data.len() as u64;
        match (src_end, dst_end) {
            (Some(s), Some(d)) if s <= len && d <= len => {}
            _ => return Err(CopyError(format!("copy of {size} bytes out of bounds"))),
        }
        data.copy_within(
            src_offset as usize..(src_offset + size) as usize,
            dst_offset as usize,
        );
        return Ok(());
    }

    let src_data = src.data();
    let mut dst_data = dst.data();
    match (src_end, dst_end) {
        (Some(s), Some(d)) if s <= src_data.len() as u64 && d <= dst_data.len() as u64 => {}
        _ => {
            return Err(CopyError(format!(
                "copy of {size} bytes from '{}'+{src_offset} to '{}'+{dst_offset} out of bounds",
                src.label, dst.label
            )));
        }
    }
    dst_data[dst_offset as usize..(dst_offset + size) as usize]
        .copy_from_slice(&src_data[src_offset as usize..(src_offset + size) as usize]);
    Ok(())
}

fn check_footprint(
    buffer: &DummyResource,
    footprint: &ImageData,
    texture: &DummyResource,
) -> Result<(u32, u32, TextureFormat), CopyError> {
    let (width, height, format) = texture
        .texture_layout()
        .ok_or_else(|| CopyError(format!("'{}' is not a texture", texture.label)))?;
    if footprint.format.block_size() != format.block_size() {
        return Err(CopyError(format!(
            "footprint format {:?} does not match texture format {:?}",
            footprint.format, format
        )));
    }
    if footprint.width > width || footprint.height > height {
        return Err(CopyError(format!(
            "{}x{} footprint larger than {}x{} texture '{}'",
            footprint.width, footprint.height, width, height, texture.label
        )));
    }
    if footprint.row_pitch < footprint.unpadded_row_size() {
        return Err(CopyError(format!(
            "row pitch {} smaller than a row of {} bytes",
            footprint.row_pitch,
            footprint.unpadded_row_size()
        )));
    }
    if footprint.offset + footprint.size_in_bytes() > buffer.size() {
        return Err(CopyError(format!(
            "footprint spans {} bytes at offset {} past the end of '{}'",
            footprint.size_in_bytes(),
            footprint.offset,
            buffer.label
        )));
    }
    Ok((width, height, format))
}

/// Copy rows laid out as `footprint` in `src` into the top-left corner of `dst`.
pub(super) fn copy_buffer_to_texture(
    src: &DummyResource,
    footprint: &ImageData,
    dst: &DummyResource,
) -> Result<(), CopyError> {
    let (width, _, format) = check_footprint(src, footprint, dst)?;
    let texture_pitch = (width * format.block_size()) as usize;
    let row = footprint.unpadded_row_size() as usize;

    let src_data = src.data();
    let mut dst_data = dst.data();
    for y in 0..footprint.height as usize {
        let from = footprint.offset as usize + y * footprint.row_pitch as usize;
        let to = y * texture_pitch;
        dst_data[to..to + row].copy_from_slice(&src_data[from..from + row]);
    }
    Ok(())
}

/// Copy the top-left corner of `src` into `dst` with the layout of `footprint`.
pub(super) fn copy_texture_to_buffer(
    src: &DummyResource,
    dst: &DummyResource,
    footprint: &ImageData,
) -> Result<(), CopyError> {
    let (width, _, format) = check_footprint(dst, footprint, src)?;
    let texture_pitch = (width * format.block_size()) as usize;
    let row = footprint.unpadded_row_size() as usize;

    let src_data = src.data();
    let mut dst_data = dst.data();
    for y in 0..footprint.height as usize {
        let from = y * texture_pitch;
        let to = footprint.offset as usize + y * footprint.row_pitch as usize;
        dst_data[to..to + row].copy_from_slice(&src_data[from..from + row]);
    }
    Ok(())
}

/// Bytes of one texel cleared to `color`, or `None` if the format is not
/// simulated.
pub(super) fn encode_color(format: TextureFormat, color: [f32; 4]) -> Option<Vec<u8>> {
    let unorm = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    match format {
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => {
            Some(color.iter().map(|c| unorm(*c)).collect())
        }
        TextureFormat::Bgra8Unorm => Some(vec![
            unorm(color[2]),
            unorm(color[1]),
            unorm(color[0]),
            unorm(color[3]),
        ]),
        TextureFormat::R32Float => Some(color[0].to_le_bytes().to_vec()),
        TextureFormat::Rgba32Float => Some(color.iter().flat_map(|c| c.to_le_bytes()).collect()),
        TextureFormat::Rgba16Float
        | TextureFormat::Depth32Float
        | TextureFormat::Depth24PlusStencil8 => None,
    }
}

/// Bytes of one texel cleared to `depth` and `stencil`.
pub(super) fn encode_depth_stencil(format: TextureFormat, depth: f32, stencil: u8) -> Option<Vec<u8>> {
    match format {
        TextureFormat::Depth32Float => Some(depth.to_le_bytes().to_vec()),
        TextureFormat::Depth24PlusStencil8 => {
            let depth = (depth.clamp(0.0, 1.0) * 0x00FF_FFFF as f32).round() as u32;
            Some((depth | ((stencil as u32) << 24)).to_le_bytes().to_vec())
        }
        _ => None,
    }
}

/// Fill every texel of a texture with `texel`.
pub(super) fn fill_texture(texture: &DummyResource, texel: &[u8]) {
    let mut data = texture.data();
    for chunk in data.chunks_exact_mut(texel.len()) {
        chunk.copy_from_slice(texel);
    }
}
