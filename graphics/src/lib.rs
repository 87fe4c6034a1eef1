//! # Emberlight Graphics
//!
//! GPU frame pipeline and resource lifetime management for the Emberlight
//! engine.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Device`] - Composition root: queue, descriptor tables, frame ring, factories
//! - [`CommandQueue`] - The direct queue and its monotonic fence
//! - [`CommandList`] - Command recording with batched state transitions
//! - [`FrameRing`] / [`FrameResource`] - Frames in flight, reused behind fence waits
//! - [`LinearAllocator`] - Per-frame bump allocator for transient constants
//! - [`DescriptorTable`] - Fixed-capacity descriptor slots for bindless indexing
//! - [`ResourceUpload`] - Blocking one-shot uploads for asset loading
//! - [`backend`] - The [`GpuBackend`] seam and a software GPU for testing
//!
//! ## Example
//!
//! ```
//! use emberlight_graphics::{Device, DeviceConfig};
//!
//! let mut device = Device::new(DeviceConfig::default().with_size(64, 64))?;
//! for _ in 0..4 {
//!     device.begin_frame()?;
//!     let rtv = device.render_target_view();
//!     device.frame_resource_mut().command_list.set_render_targets(&[rtv], None);
//!     device.end_frame()?;
//!     device.present();
//! }
//! device.flush()?;
//! # Ok::<(), emberlight_graphics::GraphicsError>(())
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod profiling;
pub mod queue;
pub mod render_state;
pub mod resources;
pub mod types;
pub mod upload;

// Re-export main types for convenience
pub use backend::{BackendType, DummyBackend, DummyConfig, DummyStats, GpuBackend, create_backend};
pub use command::{BarrierTarget, CommandList, CommandListState, ResourceBarrier};
pub use config::DeviceConfig;
pub use descriptor::{AllocationPolicy, Descriptor, DescriptorKind, DescriptorTable};
pub use device::Device;
pub use error::GraphicsError;
pub use memory::{Allocation, LinearAllocator};
pub use pipeline::{FrameBegin, FrameResource, FrameRing, FrameState};
pub use queue::CommandQueue;
pub use render_state::{GraphicsPipelineDescriptor, PipelineState, RootParameters, RootSignature};
pub use resources::{Buffer, Texture};
pub use types::{
    BufferDescriptor, BufferUsage, ImageData, ResourceFlags, ResourceStates, SceneConstants,
    TextureDescriptor, TextureFormat,
};
pub use upload::ResourceUpload;

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Logs the versions of this crate and of `emberlight-core`.
pub fn init() {
    emberlight_core::init();
    log::info!("Emberlight Graphics v{} initialized", VERSION);
}
