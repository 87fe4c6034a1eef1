//! GPU resources.
//!
//! This module contains the resource types created by [`Device`]:
//! - [`Buffer`] - committed GPU buffer
//! - [`Texture`] - committed 2D texture
//!
//! Each wraps a backend handle plus the descriptor slots of the views made
//! for it. The backend memory is released when the last handle drops, so a
//! resource must outlive every submission that references it.
//!
//! [`Device`]: crate::Device

mod buffer;
mod texture;

pub use buffer::Buffer;
pub use texture::Texture;
