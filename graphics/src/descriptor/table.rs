//! Fixed-capacity descriptor tables.

use std::sync::Arc;

use fixedbitset::FixedBitSet;

use crate::backend::{GpuBackend, GpuDescriptorHeap};
use crate::error::GraphicsError;

use super::{CpuDescriptorHandle, Descriptor, DescriptorKind, GpuDescriptorHandle, ViewDescriptor};

/// How a [`DescriptorTable`] hands out slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllocationPolicy {
    /// Slots are handed out in increasing order and never returned. Used for
    /// the engine's static budget of back buffers, depth buffer and assets.
    #[default]
    Monotonic,
    /// Freed slots go on a free list and are reused most-recent first. Used
    /// by callers whose demand changes over the process lifetime, such as a
    /// debug overlay.
    FreeList,
}

/// A fixed-capacity table of descriptor slots of one [`DescriptorKind`].
///
/// Slot `i` always has the handles `start + i * stride`, so a descriptor's
/// index and handles never change while the table lives.
///
/// # Thread Safety
///
/// The table is single-writer: allocation and free take `&mut self`. Share
/// it behind a lock if more than one thread allocates.
pub struct DescriptorTable {
    backend: Arc<dyn GpuBackend>,
    heap: GpuDescriptorHeap,
    kind: DescriptorKind,
    capacity: u32,
    shader_visible: bool,
    policy: AllocationPolicy,
    /// Next never-allocated slot.
    cursor: u32,
    free_list: Vec<u32>,
    live: FixedBitSet,
}

impl std::fmt::Debug for DescriptorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorTable")
            .field("kind", &self.kind)
            .field("capacity", &self.capacity)
            .field("allocated", &self.len())
            .field("shader_visible", &self.shader_visible)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DescriptorTable {
    /// Create a table backed by a new descriptor heap.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        kind: DescriptorKind,
        capacity: u32,
        shader_visible: bool,
        policy: AllocationPolicy,
    ) -> Result<Self, GraphicsError> {
        if capacity == 0 {
            return Err(GraphicsError::InvalidParameter(
                "descriptor table capacity cannot be zero".to_string(),
            ));
        }
        if shader_visible && !kind.can_be_shader_visible() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{kind:?} descriptor tables cannot be shader visible"
            )));
        }

        let heap = backend.create_descriptor_heap(kind, capacity, shader_visible)?;
        log::debug!(
            "Created {:?} descriptor table ({} slots, {:?}, shader visible: {})",
            kind,
            capacity,
            policy,
            shader_visible
        );

        Ok(Self {
            backend,
            heap,
            kind,
            capacity,
            shader_visible,
            policy,
            cursor: 0,
            free_list: Vec::new(),
            live: FixedBitSet::with_capacity(capacity as usize),
        })
    }

    /// Allocate a slot.
    ///
    /// Returns [`GraphicsError::CapacityExceeded`] when every slot is taken.
    pub fn allocate(&mut self) -> Result<Descriptor, GraphicsError> {
        let recycled = match self.policy {
            AllocationPolicy::FreeList => self.free_list.pop(),
            AllocationPolicy::Monotonic => None,
        };

        let index = match recycled {
            Some(index) => index,
            None => {
                if self.cursor >= self.capacity {
                    return Err(GraphicsError::CapacityExceeded {
                        resource: "descriptor table",
                        requested: 1,
                        used: self.len() as u64,
                        capacity: self.capacity as u64,
                    });
                }
                let index = self.cursor;
                self.cursor += 1;
                index
            }
        };

        self.live.insert(index as usize);
        Ok(self.descriptor_at(index))
    }

    /// Allocate a slot and write `view` into it.
    pub fn allocate_view(&mut self, view: &ViewDescriptor) -> Result<Descriptor, GraphicsError> {
        let descriptor = self.allocate()?;
        if let Err(err) = self.write(&descriptor, view) {
            // Free-list tables take the slot back on a failed write.
            if self.policy == AllocationPolicy::FreeList {
                self.free(descriptor)?;
            }
            return Err(err);
        }
        Ok(descriptor)
    }

    /// Return a slot to a [`AllocationPolicy::FreeList`] table.
    pub fn free(&mut self, descriptor: Descriptor) -> Result<(), GraphicsError> {
        if self.policy == AllocationPolicy::Monotonic {
            return Err(GraphicsError::InvalidParameter(
                "monotonic descriptor tables cannot free slots".to_string(),
            ));
        }
        let index = self.owned_index(&descriptor)?;
        if !self.live.contains(index as usize) {
            return Err(GraphicsError::InvalidParameter(format!(
                "descriptor {index} freed twice"
            )));
        }

        self.live.set(index as usize, false);
        self.free_list.push(index);
        Ok(())
    }

    /// Write a view into an allocated slot.
    pub fn write(
        &self,
        descriptor: &Descriptor,
        view: &ViewDescriptor,
    ) -> Result<(), GraphicsError> {
        if view.kind() != self.kind {
            return Err(GraphicsError::InvalidParameter(format!(
                "{:?} view written into a {:?} table",
                view.kind(),
                self.kind
            )));
        }
        let index = self.owned_index(descriptor)?;
        if !self.live.contains(index as usize) {
            return Err(GraphicsError::InvalidParameter(format!(
                "descriptor {index} is not allocated"
            )));
        }
        self.backend.write_descriptor(&self.heap, index, view)
    }

    /// The descriptor for slot `index`, allocated or not.
    pub fn descriptor_at(&self, index: u32) -> Descriptor {
        debug_assert!(index < self.capacity, "descriptor index out of range");
        let offset = index as u64 * self.heap.stride();
        let gpu = if self.shader_visible {
            GpuDescriptorHandle(self.heap.gpu_start() + offset)
        } else {
            GpuDescriptorHandle(0)
        };
        Descriptor {
            cpu: CpuDescriptorHandle(self.heap.cpu_start() + offset),
            gpu,
            index: index as i32,
        }
    }

    fn owned_index(&self, descriptor: &Descriptor) -> Result<u32, GraphicsError> {
        if !descriptor.is_valid() || descriptor.index as u32 >= self.capacity {
            return Err(GraphicsError::InvalidParameter(format!(
                "descriptor index {} is outside this table",
                descriptor.index
            )));
        }
        let index = descriptor.index as u32;
        if self.descriptor_at(index) != *descriptor {
            return Err(GraphicsError::InvalidParameter(format!(
                "descriptor {index} belongs to another table"
            )));
        }
        Ok(index)
    }

    pub fn is_allocated(&self, index: u32) -> bool {
        self.live.contains(index as usize)
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.live.count_ones(..)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() as u32 >= self.capacity
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    pub fn is_shader_visible(&self) -> bool {
        self.shader_visible
    }

    /// The heap to bind when recording.
    pub fn heap(&self) -> &GpuDescriptorHeap {
        &self.heap
    }
}
