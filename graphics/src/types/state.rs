//! Resource usage states for transition barriers.

use bitflags::bitflags;

bitflags! {
    /// The usage mode a resource is in from the GPU's point of view.
    ///
    /// A resource must be transitioned with a barrier before it is used in a
    /// different mode. Read-only states may be combined; write states may not.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceStates: u32 {
        const VERTEX_AND_CONSTANT_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const UNORDERED_ACCESS = 1 << 3;
        const DEPTH_WRITE = 1 << 4;
        const DEPTH_READ = 1 << 5;
        const NON_PIXEL_SHADER_RESOURCE = 1 << 6;
        const PIXEL_SHADER_RESOURCE = 1 << 7;
        const COPY_DEST = 1 << 8;
        const COPY_SOURCE = 1 << 9;
    }
}

impl ResourceStates {
    /// Initial state of default-heap resources. Also the presentable state.
    pub const COMMON: Self = Self::empty();
    /// Presentable state of a back buffer.
    pub const PRESENT: Self = Self::empty();
    /// Readable by every shader stage.
    pub const ALL_SHADER_RESOURCE: Self =
        Self::NON_PIXEL_SHADER_RESOURCE.union(Self::PIXEL_SHADER_RESOURCE);
    /// Required state of upload-heap resources.
    pub const GENERIC_READ: Self = Self::VERTEX_AND_CONSTANT_BUFFER
        .union(Self::INDEX_BUFFER)
        .union(Self::ALL_SHADER_RESOURCE)
        .union(Self::COPY_SOURCE);

    /// Returns true if the state contains a write usage.
    pub fn is_write(self) -> bool {
        self.intersects(
            Self::RENDER_TARGET | Self::UNORDERED_ACCESS | Self::DEPTH_WRITE | Self::COPY_DEST,
        )
    }
}

impl Default for ResourceStates {
    fn default() -> Self {
        Self::COMMON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_read_is_read_only() {
        assert!(!ResourceStates::GENERIC_READ.is_write());
        assert!(ResourceStates::GENERIC_READ.contains(ResourceStates::COPY_SOURCE));
    }

    #[test]
    fn test_common_and_present_alias() {
        assert_eq!(ResourceStates::COMMON, ResourceStates::PRESENT);
        assert!(ResourceStates::default().is_empty());
    }
}
