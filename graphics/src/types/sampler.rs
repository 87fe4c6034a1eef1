//! Sampler and comparison types.

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
    /// Anisotropic filtering, clamped by `max_anisotropy`.
    Anisotropic,
}

/// Texture address mode (wrapping behavior).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Wrap,
    Mirror,
    Clamp,
    Border,
}

/// Comparison function for depth testing and shadow sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Which shader stages can see a root parameter or static sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderVisibility {
    #[default]
    All,
    Vertex,
    Pixel,
}

/// A sampler baked into a root signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticSampler {
    pub filter: FilterMode,
    pub address_mode: AddressMode,
    pub compare: Option<CompareFunction>,
    pub max_anisotropy: u32,
    pub shader_register: u32,
    pub register_space: u32,
    pub visibility: ShaderVisibility,
}

impl StaticSampler {
    /// A sampler in register `s{shader_register}`, space 0.
    pub fn new(shader_register: u32, filter: FilterMode, address_mode: AddressMode) -> Self {
        Self {
            filter,
            address_mode,
            compare: None,
            max_anisotropy: if filter == FilterMode::Anisotropic { 16 } else { 1 },
            shader_register,
            register_space: 0,
            visibility: ShaderVisibility::Pixel,
        }
    }

    /// Linear filtering, wrapping addressing.
    pub fn linear_wrap(shader_register: u32) -> Self {
        Self::new(shader_register, FilterMode::Linear, AddressMode::Wrap)
    }

    /// Anisotropic filtering, wrapping addressing.
    pub fn anisotropic_wrap(shader_register: u32) -> Self {
        Self::new(shader_register, FilterMode::Anisotropic, AddressMode::Wrap)
    }

    pub fn with_compare(mut self, compare: CompareFunction) -> Self {
        self.compare = Some(compare);
        self
    }

    pub fn with_register_space(mut self, space: u32) -> Self {
        self.register_space = space;
        self
    }

    pub fn with_visibility(mut self, visibility: ShaderVisibility) -> Self {
        self.visibility = visibility;
        self
    }
}
