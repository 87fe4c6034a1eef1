//! Texture types and descriptors.

use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// 32-bit red channel, float.
    R32Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 32-bit depth, float.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24PlusStencil8)
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    /// Returns the size in bytes of one texel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R32Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Depth32Float
            | Self::Depth24PlusStencil8 => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Extra capabilities a texture is created with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        /// Texture can be bound as a render target.
        const ALLOW_RENDER_TARGET = 1 << 0;
        /// Texture can be bound as a depth-stencil target.
        const ALLOW_DEPTH_STENCIL = 1 << 1;
        /// Texture can be viewed for unordered access.
        const ALLOW_UNORDERED_ACCESS = 1 << 2;
        /// Texture is never read through a shader resource view.
        const DENY_SHADER_RESOURCE = 1 << 3;
    }
}

impl Default for ResourceFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Optimized clear value for depth targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilClear {
    /// Depth clear value.
    pub depth: f32,
    /// Stencil clear value.
    pub stencil: u8,
}

impl Default for DepthStencilClear {
    fn default() -> Self {
        Self {
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Descriptor for creating a 2D texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Capability flags.
    pub flags: ResourceFlags,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            format,
            flags: ResourceFlags::empty(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the capability flags.
    pub fn with_flags(mut self, flags: ResourceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Bytes in one tightly packed row.
    pub fn row_pitch(&self) -> u64 {
        self.width as u64 * self.format.block_size() as u64
    }

    /// Bytes in the tightly packed image.
    pub fn size_in_bytes(&self) -> u64 {
        self.row_pitch() * self.height as u64
    }

    /// Label used in logs and errors.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed texture>")
    }
}

/// Layout of pixel data stored in a buffer, used as the source or
/// destination of a buffer/texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageData {
    /// Byte offset of the first row within the buffer.
    pub offset: u64,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Bytes between the starts of consecutive rows.
    pub row_pitch: u32,
}

impl ImageData {
    /// Tightly packed image starting at offset zero.
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            offset: 0,
            width,
            height,
            format,
            row_pitch: width * format.block_size(),
        }
    }

    /// Set the row pitch.
    pub fn with_row_pitch(mut self, row_pitch: u32) -> Self {
        self.row_pitch = row_pitch;
        self
    }

    /// Set the starting offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Bytes in one row of texels, without padding.
    pub fn unpadded_row_size(&self) -> u32 {
        self.width * self.format.block_size()
    }

    /// Bytes the footprint spans in its buffer, starting at `offset`.
    pub fn size_in_bytes(&self) -> u64 {
        if self.height == 0 {
            return 0;
        }
        (self.height as u64 - 1) * self.row_pitch as u64 + self.unpadded_row_size() as u64
    }
}
