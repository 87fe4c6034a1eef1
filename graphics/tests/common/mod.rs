//! Common utilities for frame pipeline integration tests.
//!
//! This module provides shared test infrastructure that can be reused
//! across backend implementations.

use std::sync::Arc;
use std::time::Duration;

use emberlight_graphics::{
    Device, DeviceConfig, DummyBackend, DummyConfig, DummyStats, GpuBackend, ResourceStates,
};

/// Initialise logging once per test binary. Repeated calls are harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init();
}

/// Deterministic byte pattern for upload and readback checks.
#[allow(dead_code)]
pub fn generate_test_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

// ============================================================================
// Backend Enumeration
// ============================================================================

/// GPU backends the tests can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Software GPU on a worker thread.
    Dummy,
}

impl Backend {
    /// Check if this backend is currently available.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
        }
    }

    /// Get the backend name for display.
    #[allow(dead_code)]
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Dummy => "dummy",
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// A device plus direct access to the simulated GPU behind it.
pub struct TestContext {
    #[allow(dead_code)]
    pub backend: Backend,
    pub gpu: Arc<DummyBackend>,
    pub device: Device,
}

impl TestContext {
    /// Create a context with a small default device.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_config(backend, DummyConfig::default(), small_config())
    }

    /// Create a context with explicit backend and device configuration.
    pub fn with_config(
        backend: Backend,
        gpu_config: DummyConfig,
        config: DeviceConfig,
    ) -> Option<Self> {
        if !backend.is_available() {
            return None;
        }
        init_logging();

        let gpu = match backend {
            Backend::Dummy => Arc::new(DummyBackend::with_config(gpu_config)),
        };
        let device = Device::with_backend(gpu.clone() as Arc<dyn GpuBackend>, config).ok()?;
        Some(Self {
            backend,
            gpu,
            device,
        })
    }

    /// Create a context whose GPU takes `latency` per submission.
    #[allow(dead_code)]
    pub fn with_latency(backend: Backend, latency: Duration, frames_in_flight: usize) -> Option<Self> {
        Self::with_config(
            backend,
            DummyConfig::default().with_latency(latency),
            small_config().with_frames_in_flight(frames_in_flight),
        )
    }

    pub fn stats(&self) -> DummyStats {
        self.gpu.stats()
    }

    /// Record a frame that clears the current back buffer to `color`, with
    /// the transitions a presentable back buffer needs.
    #[allow(dead_code)]
    pub fn record_clear(&mut self, color: [f32; 4]) {
        let rtv = self.device.render_target_view();
        let back_buffer = self.device.render_target().gpu().clone();
        let viewport = self.device.viewport();
        let scissor = self.device.scissor();

        let list = &mut self.device.frame_resource_mut().command_list;
        list.add_barrier(&back_buffer, ResourceStates::PRESENT, ResourceStates::RENDER_TARGET);
        list.dispatch_barriers();
        list.set_viewport(viewport);
        list.set_scissor(scissor);
        list.set_render_targets(&[rtv], None);
        list.clear_render_target(rtv, color);
        list.add_barrier(&back_buffer, ResourceStates::RENDER_TARGET, ResourceStates::PRESENT);
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        // The device flushes on drop, which would hang on a paused GPU.
        self.gpu.resume();
    }
}

/// A 32x32 device with small tables, enough for every test.
pub fn small_config() -> DeviceConfig {
    DeviceConfig::default()
        .with_label("test device")
        .with_size(32, 32)
        .with_cbv_srv_uav_capacity(64)
        .with_linear_allocator_size(4096)
}
