//! Construction-time configuration for [`Device`](crate::Device).

use crate::error::GraphicsError;
use crate::types::{SceneConstants, TextureFormat, constant_buffer_size};

/// Default number of frames the CPU may record ahead of the GPU.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;

/// Default size of each frame's linear allocator.
pub const DEFAULT_LINEAR_ALLOCATOR_SIZE: u64 = 64 * 1024;

/// Sizes and formats fixed for the lifetime of a device.
///
/// ```
/// use emberlight_graphics::DeviceConfig;
///
/// let config = DeviceConfig::default()
///     .with_frames_in_flight(2)
///     .with_size(800, 600);
/// assert_eq!(config.frames_in_flight, 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Debug label used in logs.
    pub label: String,
    /// Number of frame resources in the ring.
    pub frames_in_flight: usize,
    /// Capacity of the render-target view table.
    pub rtv_capacity: u32,
    /// Capacity of the depth-stencil view table.
    pub dsv_capacity: u32,
    /// Capacity of the shader-visible CBV/SRV/UAV table.
    pub cbv_srv_uav_capacity: u32,
    /// Size in bytes of each frame's linear allocator.
    pub linear_allocator_size: u64,
    /// Size in bytes of each frame's scene constant buffer.
    pub frame_constants_size: u64,
    /// Back buffer format.
    pub back_buffer_format: TextureFormat,
    /// Depth buffer format.
    pub depth_format: TextureFormat,
    /// Initial back buffer width.
    pub width: u32,
    /// Initial back buffer height.
    pub height: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            label: "device".to_string(),
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            rtv_capacity: 64,
            dsv_capacity: 1,
            cbv_srv_uav_capacity: 4096,
            linear_allocator_size: DEFAULT_LINEAR_ALLOCATOR_SIZE,
            frame_constants_size: 256,
            back_buffer_format: TextureFormat::Rgba8Unorm,
            depth_format: TextureFormat::Depth24PlusStencil8,
            width: 1280,
            height: 720,
        }
    }
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_frames_in_flight(mut self, frames_in_flight: usize) -> Self {
        self.frames_in_flight = frames_in_flight;
        self
    }

    pub fn with_rtv_capacity(mut self, capacity: u32) -> Self {
        self.rtv_capacity = capacity;
        self
    }

    pub fn with_dsv_capacity(mut self, capacity: u32) -> Self {
        self.dsv_capacity = capacity;
        self
    }

    pub fn with_cbv_srv_uav_capacity(mut self, capacity: u32) -> Self {
        self.cbv_srv_uav_capacity = capacity;
        self
    }

    pub fn with_linear_allocator_size(mut self, size: u64) -> Self {
        self.linear_allocator_size = size;
        self
    }

    /// Set the scene constant buffer size. Rounded up to 256 bytes.
    pub fn with_frame_constants_size(mut self, size: u64) -> Self {
        self.frame_constants_size = constant_buffer_size(size);
        self
    }

    pub fn with_back_buffer_format(mut self, format: TextureFormat) -> Self {
        self.back_buffer_format = format;
        self
    }

    pub fn with_depth_format(mut self, format: TextureFormat) -> Self {
        self.depth_format = format;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Check that the ring and the startup descriptors and buffers fit.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.frames_in_flight == 0 {
            return Err(GraphicsError::InvalidParameter(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        let frames = self.frames_in_flight as u32;
        if self.rtv_capacity < frames {
            return Err(GraphicsError::InvalidParameter(format!(
                "rtv_capacity {} cannot hold {} back buffers",
                self.rtv_capacity, frames
            )));
        }
        if self.dsv_capacity < 1 {
            return Err(GraphicsError::InvalidParameter(
                "dsv_capacity must be at least 1".to_string(),
            ));
        }
        if self.cbv_srv_uav_capacity < frames {
            return Err(GraphicsError::InvalidParameter(format!(
                "cbv_srv_uav_capacity {} cannot hold {} frame constant views",
                self.cbv_srv_uav_capacity, frames
            )));
        }
        if self.linear_allocator_size == 0 || self.frame_constants_size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "per-frame buffer sizes cannot be zero".to_string(),
            ));
        }
        let scene_size = std::mem::size_of::<SceneConstants>() as u64;
        if self.frame_constants_size < scene_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "frame_constants_size {} cannot hold {} bytes of scene constants",
                self.frame_constants_size, scene_size
            )));
        }
        if self.back_buffer_format.is_depth_stencil() {
            return Err(GraphicsError::InvalidParameter(format!(
                "back buffer format {:?} is a depth format",
                self.back_buffer_format
            )));
        }
        if !self.depth_format.is_depth_stencil() {
            return Err(GraphicsError::InvalidParameter(format!(
                "depth format {:?} is not a depth format",
                self.depth_format
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "back buffer size cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}
