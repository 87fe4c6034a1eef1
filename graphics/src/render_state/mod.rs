//! Root signatures, pipeline state objects and the registries that own them.

mod pipeline_state;
mod registry;
mod root_signature;

pub use pipeline_state::{
    CullMode, FrontFace, GraphicsPipelineDescriptor, InputElement, MAX_RENDER_TARGETS,
    PipelineState, PrimitiveTopologyType, ShaderModule, ShaderStage, VertexFormat,
};
pub use registry::Registry;
pub use root_signature::{
    MAX_ROOT_SIGNATURE_DWORDS, RootDescriptorType, RootParameter, RootParameters, RootSignature,
    RootSignatureFlags,
};
