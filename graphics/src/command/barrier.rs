//! Resource-state transition batching.
//!
//! Transitions are collected while recording and emitted as a single
//! barrier command, so the GPU pays the synchronization cost once per batch
//! instead of once per resource.

use crate::backend::{GpuBuffer, GpuResource, GpuTexture};
use crate::types::ResourceStates;

/// One state transition of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBarrier {
    pub resource: GpuResource,
    pub before: ResourceStates,
    pub after: ResourceStates,
}

/// Anything that can be named in a [`ResourceBarrier`].
pub trait BarrierTarget {
    fn barrier_resource(&self) -> GpuResource;
}

impl BarrierTarget for GpuBuffer {
    fn barrier_resource(&self) -> GpuResource {
        GpuResource::Buffer(self.clone())
    }
}

impl BarrierTarget for GpuTexture {
    fn barrier_resource(&self) -> GpuResource {
        GpuResource::Texture(self.clone())
    }
}

impl BarrierTarget for GpuResource {
    fn barrier_resource(&self) -> GpuResource {
        self.clone()
    }
}

/// Pending transitions, kept in the order they were added.
///
/// Every added transition is emitted exactly once. Transitions of the same
/// resource are not merged: the caller states the exact sequence it needs.
#[derive(Debug, Default)]
pub struct BarrierBatch {
    barriers: Vec<ResourceBarrier>,
}

impl BarrierBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transition. Nothing reaches the GPU until [`take`](Self::take).
    pub fn add(&mut self, resource: GpuResource, before: ResourceStates, after: ResourceStates) {
        self.barriers.push(ResourceBarrier {
            resource,
            before,
            after,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    pub fn pending(&self) -> &[ResourceBarrier] {
        &self.barriers
    }

    /// Remove and return every pending transition, in call order.
    pub fn take(&mut self) -> Vec<ResourceBarrier> {
        std::mem::take(&mut self.barriers)
    }

    /// Drop every pending transition.
    pub fn clear(&mut self) {
        self.barriers.clear();
    }
}
