//! Input-assembler views and buffer view descriptions.

/// Binds a range of a buffer as vertex input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferView {
    /// GPU virtual address of the first vertex.
    pub buffer_location: u64,
    /// Size of the range in bytes.
    pub size_in_bytes: u32,
    /// Bytes between consecutive vertices.
    pub stride_in_bytes: u32,
}

/// Index element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    Uint16,
    #[default]
    Uint32,
}

impl IndexFormat {
    pub fn size(self) -> u32 {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Binds a range of a buffer as index input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBufferView {
    /// GPU virtual address of the first index.
    pub buffer_location: u64,
    /// Size of the range in bytes.
    pub size_in_bytes: u32,
    /// Index element width.
    pub format: IndexFormat,
}

impl IndexBufferView {
    /// Number of indices covered by the view.
    pub fn index_count(&self) -> u32 {
        self.size_in_bytes / self.format.size()
    }
}

/// Describes a shader resource view over a buffer.
///
/// Structured views are how vertex data is pulled bindlessly: the shader
/// receives the view's table index and reads elements by `SV_VertexID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSrvDescriptor {
    /// First element visible through the view.
    pub first_element: u64,
    /// Number of visible elements.
    pub num_elements: u32,
    /// Element size for structured views. Zero for raw (byte address) views.
    pub structure_byte_stride: u32,
}

impl BufferSrvDescriptor {
    /// Structured view of `num_elements` elements of `stride` bytes.
    pub fn structured(num_elements: u32, stride: u32) -> Self {
        Self {
            first_element: 0,
            num_elements,
            structure_byte_stride: stride,
        }
    }

    /// Raw view over `num_words` 32-bit words.
    pub fn raw(num_words: u32) -> Self {
        Self {
            first_element: 0,
            num_elements: num_words,
            structure_byte_stride: 0,
        }
    }

    /// Bytes spanned by the view, measured from the start of the buffer.
    pub fn byte_range_end(&self) -> u64 {
        let element_size = if self.structure_byte_stride == 0 {
            4
        } else {
            self.structure_byte_stride as u64
        };
        (self.first_element + self.num_elements as u64) * element_size
    }
}
