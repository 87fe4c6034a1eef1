//! Transient GPU-visible memory.

mod linear_allocator;

pub use linear_allocator::{Allocation, LinearAllocator, align_up};
