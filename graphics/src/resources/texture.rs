//! GPU texture resource.

use crate::backend::{GpuResource, GpuTexture};
use crate::command::BarrierTarget;
use crate::descriptor::Descriptor;
use crate::types::{ImageData, ResourceStates, TextureDescriptor, TextureFormat};

/// A committed 2D texture together with the views created for it.
///
/// Textures are created by [`Device::create_texture_2d`](crate::Device::create_texture_2d).
/// Textures loaded from pixels are shared as `Arc<Texture>`, since several
/// materials may sample the same image.
///
/// # Example
///
/// ```ignore
/// let texture = device.create_texture_from_pixels(&pixels, 256, 256)?;
/// let index = texture.srv().index_or_none();
/// ```
pub struct Texture {
    gpu: GpuTexture,
    descriptor: TextureDescriptor,
    initial_state: ResourceStates,
    pub(crate) srv: Descriptor,
    pub(crate) uav: Descriptor,
    pub(crate) rtv: Descriptor,
    pub(crate) dsv: Descriptor,
}

impl Texture {
    pub(crate) fn new(
        gpu: GpuTexture,
        descriptor: TextureDescriptor,
        initial_state: ResourceStates,
    ) -> Self {
        Self {
            gpu,
            descriptor,
            initial_state,
            srv: Descriptor::NONE,
            uav: Descriptor::NONE,
            rtv: Descriptor::NONE,
            dsv: Descriptor::NONE,
        }
    }

    pub fn gpu(&self) -> &GpuTexture {
        &self.gpu
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// State the texture was created in.
    pub fn initial_state(&self) -> ResourceStates {
        self.initial_state
    }

    /// Tightly packed footprint of the whole texture, for copies.
    pub fn footprint(&self) -> ImageData {
        ImageData::new(self.width(), self.height(), self.format())
    }

    pub fn srv(&self) -> Descriptor {
        self.srv
    }

    pub fn uav(&self) -> Descriptor {
        self.uav
    }

    pub fn rtv(&self) -> Descriptor {
        self.rtv
    }

    pub fn dsv(&self) -> Descriptor {
        self.dsv
    }
}

impl AsRef<GpuTexture> for Texture {
    fn as_ref(&self) -> &GpuTexture {
        &self.gpu
    }
}

impl BarrierTarget for Texture {
    fn barrier_resource(&self) -> GpuResource {
        GpuResource::Texture(self.gpu.clone())
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.descriptor.width)
            .field("height", &self.descriptor.height)
            .field("format", &self.descriptor.format)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);
