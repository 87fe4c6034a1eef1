//! Plain data types shared by the frame pipeline.
//!
//! Formats, usage flags, resource states and the descriptor structs used to
//! create buffers and textures. Nothing in here talks to a backend.

mod buffer;
mod common;
mod constants;
mod sampler;
mod state;
mod texture;
mod views;

pub use buffer::{BufferDescriptor, BufferUsage, HeapType};
pub use common::{PrimitiveTopology, ScissorRect, Viewport};
pub use constants::{
    CONSTANT_BUFFER_ALIGNMENT, MaterialIndices, ObjectConstants, RenderResourceIndices,
    SceneConstants, constant_buffer_size,
};
pub use sampler::{AddressMode, CompareFunction, FilterMode, ShaderVisibility, StaticSampler};
pub use state::ResourceStates;
pub use texture::{DepthStencilClear, ImageData, ResourceFlags, TextureDescriptor, TextureFormat};
pub use views::{BufferSrvDescriptor, IndexBufferView, IndexFormat, VertexBufferView};
