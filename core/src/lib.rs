//! # Emberlight Core
//!
//! Utilities shared by every Emberlight engine crate.

pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core crate version.
pub fn init() {
    log::info!("Emberlight Core v{} initialized", VERSION);
}
