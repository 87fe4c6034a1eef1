//! Linear ("arena") allocator over a mapped upload buffer.
//!
//! Each frame resource owns one. Render passes carve per-draw constants out
//! of it while recording, and the whole arena is reset once the frame's
//! previous submission has completed on the GPU.
//!
//! ```ignore
//! let frame = device.frame_resource_mut();
//! let alloc = frame.linear_allocator.allocate_pod(&object_constants)?;
//! frame
//!     .command_list
//!     .set_graphics_root_cbv(1, alloc.gpu_address);
//! ```
//!
//! Allocations are only valid until the next [`LinearAllocator::reset`].
//! Writing through a stale allocation is rejected.

use std::sync::Arc;

use bytemuck::Pod;

use crate::backend::{GpuBackend, GpuBuffer};
use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, CONSTANT_BUFFER_ALIGNMENT};

/// A byte range handed out by a [`LinearAllocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// The arena's backing buffer.
    pub buffer: GpuBuffer,
    /// GPU virtual address of the first byte.
    pub gpu_address: u64,
    /// Byte offset within the backing buffer.
    pub offset: u64,
    /// Bytes reserved for this allocation.
    pub size: u64,
    /// Reset count of the arena when this allocation was made.
    epoch: u64,
}

impl Allocation {
    /// One past the last reserved byte.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Bump allocator over a fixed-size upload buffer.
///
/// # Thread Safety
///
/// Owned and mutated by the thread recording the frame it belongs to.
pub struct LinearAllocator {
    backend: Arc<dyn GpuBackend>,
    buffer: GpuBuffer,
    label: String,
    capacity: u64,
    at: u64,
    epoch: u64,
    high_water_mark: u64,
}

impl LinearAllocator {
    /// Default alignment for allocations, the constant buffer placement
    /// alignment.
    pub const DEFAULT_ALIGNMENT: u64 = CONSTANT_BUFFER_ALIGNMENT;

    /// Create an arena of `capacity` bytes.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        capacity: u64,
        label: impl Into<String>,
    ) -> Result<Self, GraphicsError> {
        let label = label.into();
        if capacity == 0 {
            return Err(GraphicsError::InvalidParameter(
                "linear allocator capacity cannot be zero".to_string(),
            ));
        }

        let buffer =
            backend.create_buffer(&BufferDescriptor::upload(capacity).with_label(label.clone()))?;

        Ok(Self {
            backend,
            buffer,
            label,
            capacity,
            at: 0,
            epoch: 0,
            high_water_mark: 0,
        })
    }

    /// Reserve `size` bytes aligned to [`Self::DEFAULT_ALIGNMENT`].
    pub fn allocate(&mut self, size: u64) -> Result<Allocation, GraphicsError> {
        self.allocate_aligned(size, Self::DEFAULT_ALIGNMENT)
    }

    /// Reserve `size` bytes whose offset is a multiple of `alignment`.
    ///
    /// The cursor moves to the end of the reserved range, so the next call
    /// pays its own alignment padding. Fails with
    /// [`GraphicsError::CapacityExceeded`] instead of overrunning the arena.
    pub fn allocate_aligned(
        &mut self,
        size: u64,
        alignment: u64,
    ) -> Result<Allocation, GraphicsError> {
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(GraphicsError::InvalidParameter(format!(
                "alignment must be a power of 2, got {alignment}"
            )));
        }
        if size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "allocation size cannot be zero".to_string(),
            ));
        }

        let offset = align_up(self.at, alignment);
        let end = offset.checked_add(size).filter(|end| *end <= self.capacity);
        let Some(end) = end else {
            return Err(GraphicsError::CapacityExceeded {
                resource: "linear allocator",
                requested: size,
                used: self.at,
                capacity: self.capacity,
            });
        };

        self.at = end;
        self.high_water_mark = self.high_water_mark.max(end);

        Ok(Allocation {
            buffer: self.buffer.clone(),
            gpu_address: self.buffer.gpu_address() + offset,
            offset,
            size,
            epoch: self.epoch,
        })
    }

    /// Reserve space for `value` and copy it in.
    pub fn allocate_pod<T: Pod>(&mut self, value: &T) -> Result<Allocation, GraphicsError> {
        let bytes = bytemuck::bytes_of(value);
        let allocation = self.allocate(bytes.len() as u64)?;
        self.write(&allocation, 0, bytes)?;
        Ok(allocation)
    }

    /// Copy `data` into an allocation starting `offset` bytes in.
    pub fn write(
        &self,
        allocation: &Allocation,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        if allocation.buffer != self.buffer {
            return Err(GraphicsError::InvalidParameter(format!(
                "allocation does not belong to '{}'",
                self.label
            )));
        }
        if allocation.epoch != self.epoch {
            return Err(GraphicsError::InvalidParameter(format!(
                "allocation from '{}' used after reset",
                self.label
            )));
        }
        if offset
            .checked_add(data.len() as u64)
            .is_none_or(|end| end > allocation.size)
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at {} overruns a {}-byte allocation",
                data.len(),
                offset,
                allocation.size
            )));
        }
        self.backend
            .write_buffer(&self.buffer, allocation.offset + offset, data)
    }

    /// Copy a [`Pod`] value to the start of an allocation.
    pub fn write_pod<T: Pod>(&self, allocation: &Allocation, value: &T) -> Result<(), GraphicsError> {
        self.write(allocation, 0, bytemuck::bytes_of(value))
    }

    /// Make the whole arena available again. Memory is not cleared.
    ///
    /// Only call once the GPU has finished with every allocation made since
    /// the last reset.
    pub fn reset(&mut self) {
        self.at = 0;
        self.epoch += 1;
    }

    /// Returns true if `allocate_aligned(size, alignment)` would succeed.
    pub fn can_allocate(&self, size: u64, alignment: u64) -> bool {
        alignment.is_power_of_two()
            && align_up(self.at, alignment)
                .checked_add(size)
                .is_some_and(|end| end <= self.capacity)
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes consumed since the last reset, including alignment padding.
    pub fn used(&self) -> u64 {
        self.at
    }

    pub fn remaining(&self) -> u64 {
        self.capacity - self.at
    }

    /// Largest `used()` ever observed. Useful for sizing the arena.
    pub fn high_water_mark(&self) -> u64 {
        self.high_water_mark
    }

    /// Number of resets so far.
    pub fn reset_count(&self) -> u64 {
        self.epoch
    }

    pub fn buffer(&self) -> &GpuBuffer {
        &self.buffer
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for LinearAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearAllocator")
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .field("used", &self.at)
            .field("reset_count", &self.epoch)
            .finish()
    }
}

/// Round `value` up to a multiple of `alignment` (a power of two).
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn arena(capacity: u64) -> (Arc<dyn GpuBackend>, LinearAllocator) {
        let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
        let arena = LinearAllocator::new(backend.clone(), capacity, "test_arena").unwrap();
        (backend, arena)
    }

    #[test]
    fn test_creation() {
        let (_, arena) = arena(4096);
        assert_eq!(arena.capacity(), 4096);
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.remaining(), 4096);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let backend: Arc<dyn GpuBackend> = Arc::new(DummyBackend::new());
        assert!(LinearAllocator::new(backend, 0, "empty").is_err());
    }

    #[test]
    fn test_cursor_advances_by_requested_size() {
        let (_, mut arena) = arena(1024);

        let first = arena.allocate_aligned(100, 64).unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.size, 100);
        assert_eq!(arena.used(), 100);

        let second = arena.allocate_aligned(100, 64).unwrap();
        assert_eq!(second.offset, 128);
        assert_eq!(arena.used(), 228);
        assert_eq!(second.gpu_address, arena.buffer().gpu_address() + 128);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let (_, mut arena) = arena(256);
        arena.allocate_aligned(100, 64).unwrap();
        arena.allocate_aligned(100, 64).unwrap();

        let err = arena.allocate_aligned(100, 64).unwrap_err();
        assert_eq!(
            err,
            GraphicsError::CapacityExceeded {
                resource: "linear allocator",
                requested: 100,
                used: 228,
                capacity: 256,
            }
        );
        // A failed allocation leaves the cursor alone.
        assert_eq!(arena.used(), 228);
        assert!(arena.allocate_aligned(28, 1).is_ok());
    }

    #[test]
    fn test_reset_returns_to_zero() {
        let (_, mut arena) = arena(512);
        for _ in 0..10 {
            arena.allocate_aligned(17, 16).unwrap();
            arena.allocate_aligned(33, 64).unwrap();
            arena.reset();
            let first = arena.allocate_aligned(8, 8).unwrap();
            assert_eq!(first.offset, 0);
            assert_eq!(arena.capacity(), 512);
            arena.reset();
        }
        assert_eq!(arena.reset_count(), 20);
    }

    #[test]
    fn test_allocations_do_not_overlap() {
        let (_, mut arena) = arena(64 * 1024);
        let requests = [(3u64, 1u64), (100, 64), (7, 4), (256, 256), (1, 128), (40, 8)];
        let allocations: Vec<_> = requests
            .iter()
            .cycle()
            .take(60)
            .map(|(size, align)| {
                let alloc = arena.allocate_aligned(*size, *align).unwrap();
                assert_eq!(alloc.offset % align, 0);
                alloc
            })
            .collect();

        for (i, a) in allocations.iter().enumerate() {
            for b in &allocations[i + 1..] {
                assert!(a.end() <= b.offset || b.end() <= a.offset);
            }
        }
    }

    #[test]
    fn test_invalid_alignment() {
        let (_, mut arena) = arena(256);
        assert!(matches!(
            arena.allocate_aligned(16, 3),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(arena.allocate_aligned(16, 0).is_err());
        assert!(arena.allocate(0).is_err());
    }

    #[test]
    fn test_write_and_read_back() {
        let (backend, mut arena) = arena(1024);
        let value: [u32; 4] = [1, 2, 3, 4];
        let alloc = arena.allocate_pod(&value).unwrap();

        let bytes = backend.read_buffer(arena.buffer(), alloc.offset, 16).unwrap();
        assert_eq!(bytes, bytemuck::bytes_of(&value));
    }

    #[test]
    fn test_stale_allocation_rejected() {
        let (_, mut arena) = arena(1024);
        let alloc = arena.allocate(64).unwrap();
        arena.reset();
        assert!(arena.write(&alloc, 0, &[0u8; 4]).is_err());
    }

    #[test]
    fn test_write_overrun_rejected() {
        let (_, mut arena) = arena(1024);
        let alloc = arena.allocate(8).unwrap();
        assert!(arena.write(&alloc, 4, &[0u8; 8]).is_err());
    }

    #[test]
    fn test_write_at_huge_offset_rejected() {
        let (_, mut arena) = arena(1024);
        let alloc = arena.allocate(8).unwrap();
        assert!(matches!(
            arena.write(&alloc, u64::MAX, &[1]),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(matches!(
            arena.write(&alloc, u64::MAX - 3, &[0u8; 8]),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_reset_keeps_stale_bytes() {
        let (backend, mut arena) = arena(256);
        let alloc = arena.allocate_pod(&0xDEAD_BEEFu32).unwrap();
        arena.reset();
        let bytes = backend.read_buffer(arena.buffer(), alloc.offset, 4).unwrap();
        assert_eq!(bytes, 0xDEAD_BEEFu32.to_ne_bytes());
    }

    #[test]
    fn test_can_allocate_and_high_water() {
        let (_, mut arena) = arena(256);
        assert!(arena.can_allocate(256, 1));
        arena.allocate_aligned(200, 1).unwrap();
        assert!(!arena.can_allocate(100, 64));
        arena.reset();
        assert_eq!(arena.high_water_mark(), 200);
    }
}
