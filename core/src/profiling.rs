//! Profiling support via Tracy.
//!
//! Instrumentation is enabled with the `profiling` Cargo feature. Without it
//! every macro in this module expands to nothing (or to a discarded
//! expression), so instrumented code carries no runtime cost.
//!
//! ```ignore
//! use emberlight_core::profiling::{frame_mark, profile_scope};
//!
//! loop {
//!     {
//!         profile_scope!("record_frame");
//!         // ... record commands ...
//!     }
//!     frame_mark!();
//! }
//! ```
//!
//! Connect the Tracy UI (<https://github.com/wolfpld/tracy/releases>) to the
//! running process to see spans, frame boundaries and plotted fence values.

#[cfg(feature = "profiling")]
pub use tracy_client::{
    self, Client, Span, frame_mark as tracy_frame_mark, plot as tracy_plot, span,
};

/// Mark the end of a visual frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a visual frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Open a span that lasts until the end of the enclosing scope.
///
/// The name must be a string literal.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Open a span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Open a span named after the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Open a function span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Plot a numeric value over time.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

/// Plot the signaled and completed values of a fence side by side.
///
/// The gap between the two lines is the number of submissions the GPU has
/// not finished yet.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_fence {
    ($signaled:expr, $completed:expr) => {
        $crate::profiling::tracy_plot!("Fence: signaled", $signaled as f64);
        $crate::profiling::tracy_plot!("Fence: completed", $completed as f64);
    };
}

/// Plot fence values (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_fence {
    ($signaled:expr, $completed:expr) => {
        let _ = ($signaled, $completed);
    };
}

/// Name the current thread in the profiler.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! set_thread_name {
    ($name:expr) => {
        $crate::profiling::tracy_client::set_thread_name!($name)
    };
}

/// Name the current thread (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! set_thread_name {
    ($name:expr) => {};
}

pub use frame_mark;
pub use profile_fence;
pub use profile_function;
pub use profile_plot;
pub use profile_scope;
pub use set_thread_name;
