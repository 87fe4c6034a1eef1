//! Frame pipeline integration tests.
//!
//! These tests drive a [`Device`](emberlight_graphics::Device) the way an
//! application does and check the synchronization it promises against the
//! simulated GPU.
//!
//! # Test Categories
//!
//! - **Ring Tests**: Slot rotation and the fence each slot waits on
//! - **Latency Tests**: Frame resources are never reused while the GPU reads them
//! - **Failure Tests**: A stalled or lost GPU surfaces through the frame loop
//! - **Clear Tests**: Recorded clears land in the back buffer
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test frame_pipeline_tests
//! ```

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rstest::rstest;

use common::{Backend, TestContext, small_config};
use emberlight_graphics::{DummyConfig, FrameState, GraphicsError, ResourceStates};

// ============================================================================
// Ring Tests
// ============================================================================

/// Ten frames through a ring of three.
///
/// This test verifies that:
/// 1. Frame `n` records into slot `n mod 3`
/// 2. The first three frames wait on nothing
/// 3. Later frames wait on the fence of the frame three before them
/// 4. Fences are handed out 1, 2, 3, ... in submission order
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_ten_frames_three_in_flight(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    for i in 0..10u64 {
        let begin = ctx.device.begin_frame().unwrap();
        assert_eq!(begin.frame_index, i);
        assert_eq!(begin.slot, (i % 3) as usize);

        let expected_wait = if i < 3 { 0 } else { i - 2 };
        assert_eq!(begin.waited_fence, expected_wait, "frame {i}");
        assert!(begin.completed_at_reset >= begin.waited_fence);

        let fence = ctx.device.end_frame().unwrap();
        assert_eq!(fence, i + 1);
        ctx.device.present();
    }

    ctx.device.wait_idle().unwrap();
    assert_eq!(ctx.device.queue().completed_value(), ctx.device.queue().last_signaled());
    assert_eq!(ctx.stats().validation_errors, 0);
}

/// Slot fences always come from the frame that last used the slot.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_slot_fences_track_their_frame(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    for _ in 0..7 {
        ctx.device.begin_frame().unwrap();
        ctx.device.end_frame().unwrap();
    }

    let fences: Vec<u64> = ctx
        .device
        .frame_ring()
        .frames()
        .iter()
        .map(|frame| frame.fence_value())
        .collect();
    // Frames 0..7 land in slots 0,1,2,0,1,2,0
    assert_eq!(fences, vec![7, 5, 6]);
    assert!(
        ctx.device
            .frame_ring()
            .frames()
            .iter()
            .all(|frame| frame.state() == FrameState::Submitted)
    );
}

/// A single frame in flight serializes CPU and GPU.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_single_frame_in_flight(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::with_config(
        backend,
        DummyConfig::default(),
        small_config().with_frames_in_flight(1),
    ) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    for i in 0..4u64 {
        let begin = ctx.device.begin_frame().unwrap();
        assert_eq!(begin.slot, 0);
        assert_eq!(begin.waited_fence, i);
        assert_eq!(ctx.device.queue().completed_value(), i);
        ctx.device.end_frame().unwrap();
    }
}

// ============================================================================
// Latency Tests
// ============================================================================

/// With a slow GPU the CPU runs ahead by at most the ring size, and every
/// reset happens after the slot's previous fence completed.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_slow_gpu_never_aliases_frame_memory(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::with_latency(backend, Duration::from_millis(5), 2) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    for i in 0..8u64 {
        let begin = ctx.device.begin_frame().unwrap();
        assert!(begin.completed_at_reset >= begin.waited_fence);

        let queue = ctx.device.queue();
        assert!(queue.last_signaled() - queue.completed_value() <= 2);

        let frame = ctx.device.frame_resource_mut();
        let allocation = frame.linear_allocator.allocate(64).unwrap();
        assert_eq!(allocation.offset, 0, "arena not reset for frame {i}");
        frame
            .linear_allocator
            .write(&allocation, 0, &i.to_le_bytes())
            .unwrap();

        ctx.device.end_frame().unwrap();
    }

    ctx.device.wait_idle().unwrap();
    assert_eq!(ctx.stats().submissions, 8);
}

/// A stalled GPU blocks `begin_frame` once every slot is in flight, and
/// releases it as soon as the GPU catches up.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_paused_gpu_blocks_begin_frame(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    ctx.gpu.pause();
    for _ in 0..3 {
        ctx.device.begin_frame().unwrap();
        ctx.device.end_frame().unwrap();
    }
    assert_eq!(ctx.device.queue().completed_value(), 0);

    let began = AtomicBool::new(false);
    let gpu = ctx.gpu.clone();
    let device = &mut ctx.device;
    std::thread::scope(|scope| {
        let waiter = scope.spawn(|| {
            let begin = device.begin_frame();
            began.store(true, Ordering::SeqCst);
            begin
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!began.load(Ordering::SeqCst), "begin_frame did not block");

        gpu.resume();
        let begin = waiter.join().unwrap().unwrap();
        assert_eq!(begin.waited_fence, 1);
        assert!(begin.completed_at_reset >= 1);
    });

    ctx.device.end_frame().unwrap();
    ctx.device.wait_idle().unwrap();
}

// ============================================================================
// Failure Tests
// ============================================================================

/// Losing the device fails frame setup, submission and waits with
/// `DeviceLost`.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_device_lost_surfaces_from_frame_loop(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    ctx.device.begin_frame().unwrap();
    ctx.device.end_frame().unwrap();
    ctx.device.wait_idle().unwrap();

    ctx.gpu.lose_device();

    // Resetting the slot's command allocator already needs a live device
    assert_eq!(ctx.device.begin_frame().map(|_| ()), Err(GraphicsError::DeviceLost));
    assert_eq!(ctx.device.flush(), Err(GraphicsError::DeviceLost));
    assert_eq!(ctx.device.queue().signal(), Err(GraphicsError::DeviceLost));
}

/// Beginning a frame twice without ending it is rejected and leaves the
/// ring where it was.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_unbalanced_frame_calls(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    assert!(matches!(
        ctx.device.end_frame(),
        Err(GraphicsError::InvalidParameter(_))
    ));

    let first = ctx.device.begin_frame().unwrap();
    assert!(matches!(
        ctx.device.begin_frame(),
        Err(GraphicsError::InvalidParameter(_))
    ));
    assert_eq!(ctx.device.frame_ring().current_slot(), first.slot);
    assert_eq!(ctx.device.frame_ring().frame_count(), 1);

    ctx.device.end_frame().unwrap();
}

/// The per-frame arena rejects the allocation that does not fit and keeps
/// the earlier ones.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_frame_arena_overflow(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::with_config(
        backend,
        DummyConfig::default(),
        small_config().with_linear_allocator_size(256),
    ) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    ctx.device.begin_frame().unwrap();
    let arena = &mut ctx.device.frame_resource_mut().linear_allocator;
    let first = arena.allocate_aligned(100, 64).unwrap();
    let second = arena.allocate_aligned(100, 64).unwrap();
    assert_eq!((first.offset, second.offset), (0, 128));

    let err = arena.allocate_aligned(100, 64).unwrap_err();
    assert!(matches!(err, GraphicsError::CapacityExceeded { .. }));
    assert_eq!(arena.used(), 228);

    ctx.device.end_frame().unwrap();
}

// ============================================================================
// Clear Tests
// ============================================================================

/// Clear each back buffer to a different colour and read the texels back.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_clear_back_buffers(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let colors = [
        ([1.0, 0.0, 0.0, 1.0], [255u8, 0, 0, 255]),
        ([0.0, 1.0, 0.0, 1.0], [0, 255, 0, 255]),
        ([0.0, 0.0, 1.0, 0.5], [0, 0, 255, 128]),
    ];

    for (color, _) in &colors {
        ctx.device.begin_frame().unwrap();
        ctx.record_clear(*color);
        ctx.device.end_frame().unwrap();
        ctx.device.present();
    }
    ctx.device.wait_idle().unwrap();

    // After three presents the index is back at the first back buffer
    for (_, expected) in &colors {
        let texels = ctx
            .device
            .read_back_texture(ctx.device.render_target(), ResourceStates::PRESENT)
            .unwrap();
        assert_eq!(texels.len(), 32 * 32 * 4);
        for pixel in texels.chunks_exact(4) {
            assert_eq!(pixel, expected);
        }
        ctx.device.present();
    }

    let stats = ctx.stats();
    assert_eq!(stats.clears, 3);
    assert_eq!(stats.validation_errors, 0);
}

/// Recording a clear without the transition into `RENDER_TARGET` is caught
/// by the simulated GPU.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_clear_without_transition_is_flagged(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    ctx.device.begin_frame().unwrap();
    let rtv = ctx.device.render_target_view();
    ctx.device
        .frame_resource_mut()
        .command_list
        .clear_render_target(rtv, [1.0; 4]);
    ctx.device.end_frame().unwrap();
    ctx.device.wait_idle().unwrap();

    assert_eq!(ctx.stats().validation_errors, 1);
}
