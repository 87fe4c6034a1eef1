//! Root signatures: the layout of the arguments a pipeline reads.

use std::sync::Arc;

use bitflags::bitflags;

use crate::backend::{GpuBackend, GpuRootSignature};
use crate::error::GraphicsError;
use crate::types::{ShaderVisibility, StaticSampler};

/// Hardware limit on the size of a root signature, in 32-bit words.
pub const MAX_ROOT_SIGNATURE_DWORDS: u32 = 64;

bitflags! {
    /// Root signature creation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RootSignatureFlags: u32 {
        const ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT = 1 << 0;
        /// Shaders may index the bound CBV/SRV/UAV heap directly.
        const CBV_SRV_UAV_HEAP_DIRECTLY_INDEXED = 1 << 1;
        const SAMPLER_HEAP_DIRECTLY_INDEXED = 1 << 2;
    }
}

impl Default for RootSignatureFlags {
    fn default() -> Self {
        Self::CBV_SRV_UAV_HEAP_DIRECTLY_INDEXED
    }
}

/// Kind of a root descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootDescriptorType {
    ConstantBufferView,
    ShaderResourceView,
    UnorderedAccessView,
}

/// One slot of a root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootParameter {
    /// Inline 32-bit values, set with `set_graphics_root_constants`.
    Constants {
        shader_register: u32,
        register_space: u32,
        num_values: u32,
        visibility: ShaderVisibility,
    },
    /// A GPU virtual address, set with `set_graphics_root_cbv`.
    Descriptor {
        descriptor_type: RootDescriptorType,
        shader_register: u32,
        register_space: u32,
        visibility: ShaderVisibility,
    },
}

impl RootParameter {
    /// Cost of the parameter in 32-bit words.
    pub fn size_in_dwords(&self) -> u32 {
        match self {
            Self::Constants { num_values, .. } => *num_values,
            // Root descriptors are 64-bit addresses.
            Self::Descriptor { .. } => 2,
        }
    }
}

/// Builder for the parameters and static samplers of a root signature.
///
/// Parameters keep the order they were added in; a parameter's position is
/// its root index.
///
/// ```
/// use emberlight_graphics::render_state::RootParameters;
/// use emberlight_graphics::types::{ShaderVisibility, StaticSampler};
///
/// let params = RootParameters::new()
///     .add_32bit_constants(0, 0, 4, ShaderVisibility::All)
///     .add_static_sampler(StaticSampler::anisotropic_wrap(0));
/// assert_eq!(params.parameters().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootParameters {
    parameters: Vec<RootParameter>,
    static_samplers: Vec<StaticSampler>,
    flags: RootSignatureFlags,
}

impl RootParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_32bit_constants(
        mut self,
        shader_register: u32,
        register_space: u32,
        num_values: u32,
        visibility: ShaderVisibility,
    ) -> Self {
        self.parameters.push(RootParameter::Constants {
            shader_register,
            register_space,
            num_values,
            visibility,
        });
        self
    }

    pub fn add_descriptor(
        mut self,
        descriptor_type: RootDescriptorType,
        shader_register: u32,
        register_space: u32,
        visibility: ShaderVisibility,
    ) -> Self {
        self.parameters.push(RootParameter::Descriptor {
            descriptor_type,
            shader_register,
            register_space,
            visibility,
        });
        self
    }

    /// Shorthand for a root CBV in `b{shader_register}`, space 0.
    pub fn add_cbv(self, shader_register: u32, visibility: ShaderVisibility) -> Self {
        self.add_descriptor(
            RootDescriptorType::ConstantBufferView,
            shader_register,
            0,
            visibility,
        )
    }

    pub fn add_static_sampler(mut self, sampler: StaticSampler) -> Self {
        self.static_samplers.push(sampler);
        self
    }

    pub fn with_flags(mut self, flags: RootSignatureFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn parameters(&self) -> &[RootParameter] {
        &self.parameters
    }

    pub fn static_samplers(&self) -> &[StaticSampler] {
        &self.static_samplers
    }

    pub fn flags(&self) -> RootSignatureFlags {
        self.flags
    }

    pub fn size_in_dwords(&self) -> u32 {
        self.parameters.iter().map(RootParameter::size_in_dwords).sum()
    }

    /// Check the layout against hardware limits.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        let size = self.size_in_dwords();
        if size > MAX_ROOT_SIGNATURE_DWORDS {
            return Err(GraphicsError::InvalidParameter(format!(
                "root signature uses {size} dwords, the limit is {MAX_ROOT_SIGNATURE_DWORDS}"
            )));
        }
        if self
            .parameters
            .iter()
            .any(|p| matches!(p, RootParameter::Constants { num_values: 0, .. }))
        {
            return Err(GraphicsError::InvalidParameter(
                "root constants parameter with zero values".to_string(),
            ));
        }
        Ok(())
    }
}

/// A compiled root signature.
#[derive(Debug)]
pub struct RootSignature {
    name: String,
    parameters: RootParameters,
    gpu: GpuRootSignature,
}

impl RootSignature {
    pub fn new(
        backend: &Arc<dyn GpuBackend>,
        name: impl Into<String>,
        parameters: RootParameters,
    ) -> Result<Self, GraphicsError> {
        let name = name.into();
        parameters.validate()?;
        let gpu = backend.create_root_signature(&parameters)?;
        log::debug!(
            "Created root signature '{}' ({} parameters, {} static samplers)",
            name,
            parameters.parameters().len(),
            parameters.static_samplers().len()
        );
        Ok(Self {
            name,
            parameters,
            gpu,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &RootParameters {
        &self.parameters
    }

    /// Number of root parameters, one past the highest valid root index.
    pub fn len(&self) -> usize {
        self.parameters.parameters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn gpu(&self) -> &GpuRootSignature {
        &self.gpu
    }
}
