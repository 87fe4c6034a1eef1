//! Graphics pipeline state objects.
//!
//! A [`PipelineState`] bakes shaders, input layout, rasterizer and depth
//! state together with the formats of the targets it renders into. It is
//! created against one [`RootSignature`] and must be bound together with it.

use std::sync::Arc;

use crate::backend::{GpuBackend, GpuPipelineState};
use crate::error::GraphicsError;
use crate::types::{CompareFunction, TextureFormat};

use super::RootSignature;

/// Maximum number of simultaneous render targets.
pub const MAX_RENDER_TARGETS: usize = 8;

/// Shader stage in the graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

/// Compiled shader bytecode for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderModule {
    pub stage: ShaderStage,
    /// Bytecode. Compilation happens offline, outside this crate.
    pub bytecode: Vec<u8>,
    pub entry_point: String,
}

impl ShaderModule {
    pub fn vertex(bytecode: impl Into<Vec<u8>>, entry_point: impl Into<String>) -> Self {
        Self {
            stage: ShaderStage::Vertex,
            bytecode: bytecode.into(),
            entry_point: entry_point.into(),
        }
    }

    pub fn pixel(bytecode: impl Into<Vec<u8>>, entry_point: impl Into<String>) -> Self {
        Self {
            stage: ShaderStage::Pixel,
            bytecode: bytecode.into(),
            entry_point: entry_point.into(),
        }
    }
}

/// Format of one vertex input element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
}

impl VertexFormat {
    pub fn size(&self) -> u32 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
            Self::Uint32 => 4,
        }
    }
}

/// One element of the input assembler layout.
///
/// Bindless pipelines pull vertices from a structured buffer and leave the
/// layout empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputElement {
    pub semantic: String,
    pub semantic_index: u32,
    pub format: VertexFormat,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    Clockwise,
    CounterClockwise,
}

/// How the rasterizer interprets the bound topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopologyType {
    Point,
    Line,
    #[default]
    Triangle,
}

/// Everything needed to build a [`PipelineState`].
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDescriptor {
    pub root_signature: Arc<RootSignature>,
    pub vertex_shader: ShaderModule,
    pub pixel_shader: ShaderModule,
    pub input_layout: Vec<InputElement>,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub topology_type: PrimitiveTopologyType,
    pub render_target_formats: Vec<TextureFormat>,
    /// Depth testing is enabled exactly when a depth format is set.
    pub depth_format: Option<TextureFormat>,
    pub depth_func: CompareFunction,
    pub depth_write: bool,
}

impl GraphicsPipelineDescriptor {
    /// A triangle pipeline rendering into one `Rgba8Unorm` target without depth.
    pub fn new(
        root_signature: Arc<RootSignature>,
        vertex_shader: ShaderModule,
        pixel_shader: ShaderModule,
    ) -> Self {
        Self {
            root_signature,
            vertex_shader,
            pixel_shader,
            input_layout: Vec::new(),
            cull_mode: CullMode::default(),
            front_face: FrontFace::default(),
            topology_type: PrimitiveTopologyType::default(),
            render_target_formats: vec![TextureFormat::Rgba8Unorm],
            depth_format: None,
            depth_func: CompareFunction::Less,
            depth_write: true,
        }
    }

    pub fn with_input_element(mut self, element: InputElement) -> Self {
        self.input_layout.push(element);
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn with_front_face(mut self, front_face: FrontFace) -> Self {
        self.front_face = front_face;
        self
    }

    pub fn with_topology_type(mut self, topology_type: PrimitiveTopologyType) -> Self {
        self.topology_type = topology_type;
        self
    }

    pub fn with_render_target_formats(mut self, formats: &[TextureFormat]) -> Self {
        self.render_target_formats = formats.to_vec();
        self
    }

    pub fn with_depth(mut self, format: TextureFormat, func: CompareFunction) -> Self {
        self.depth_format = Some(format);
        self.depth_func = func;
        self
    }

    pub fn with_depth_write(mut self, enabled: bool) -> Self {
        self.depth_write = enabled;
        self
    }

    pub fn depth_test_enabled(&self) -> bool {
        self.depth_format.is_some()
    }

    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.vertex_shader.stage != ShaderStage::Vertex
            || self.pixel_shader.stage != ShaderStage::Pixel
        {
            return Err(GraphicsError::InvalidParameter(
                "shader modules bound to the wrong stages".to_string(),
            ));
        }
        if self.render_target_formats.len() > MAX_RENDER_TARGETS {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} render targets, at most {} are supported",
                self.render_target_formats.len(),
                MAX_RENDER_TARGETS
            )));
        }
        if let Some(format) = self
            .render_target_formats
            .iter()
            .find(|format| format.is_depth_stencil())
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "depth format {format:?} used as a render target"
            )));
        }
        if let Some(format) = self.depth_format
            && !format.is_depth_stencil()
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "{format:?} is not a depth format"
            )));
        }
        Ok(())
    }
}

/// A compiled graphics pipeline.
#[derive(Debug)]
pub struct PipelineState {
    name: String,
    root_signature: Arc<RootSignature>,
    render_target_formats: Vec<TextureFormat>,
    depth_format: Option<TextureFormat>,
    gpu: GpuPipelineState,
}

impl PipelineState {
    pub fn new(
        backend: &Arc<dyn GpuBackend>,
        name: impl Into<String>,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<Self, GraphicsError> {
        let name = name.into();
        descriptor.validate()?;
        let gpu = backend.create_pipeline_state(descriptor)?;
        log::debug!(
            "Created pipeline state '{}' (root signature '{}', {} render targets)",
            name,
            descriptor.root_signature.name(),
            descriptor.render_target_formats.len()
        );
        Ok(Self {
            name,
            root_signature: descriptor.root_signature.clone(),
            render_target_formats: descriptor.render_target_formats.clone(),
            depth_format: descriptor.depth_format,
            gpu,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root signature the pipeline was compiled against.
    pub fn root_signature(&self) -> &Arc<RootSignature> {
        &self.root_signature
    }

    pub fn render_target_formats(&self) -> &[TextureFormat] {
        &self.render_target_formats
    }

    pub fn depth_format(&self) -> Option<TextureFormat> {
        self.depth_format
    }

    pub fn gpu(&self) -> &GpuPipelineState {
        &self.gpu
    }
}
