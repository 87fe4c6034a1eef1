//! Profiling support via Tracy.
//!
//! Re-exports the CPU instrumentation macros from
//! [`emberlight_core::profiling`]. Enable them with the `profiling` feature:
//!
//! ```toml
//! [dependencies]
//! emberlight-graphics = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! The frame pipeline instruments itself: every `begin_frame` and
//! `end_frame` opens a span, the fence wait at the top of a frame opens its
//! own span so stalls on the GPU stand out, and the queue plots its signaled
//! and completed fence values after each signal.

pub use emberlight_core::profiling::{
    frame_mark, profile_fence, profile_function, profile_plot, profile_scope, set_thread_name,
};
