//! Resource lifetime integration tests.
//!
//! # Test Categories
//!
//! - **Upload Tests**: Data reaches device-local buffers and textures
//! - **Budget Tests**: Running out of video memory fails resource creation
//! - **Failure Path Tests**: A step failing halfway leaves earlier state intact
//! - **Descriptor Tests**: Bindless indices stay stable for the device lifetime

mod common;

use rstest::rstest;

use common::{Backend, TestContext, generate_test_pattern, small_config};
use emberlight_graphics::types::{ScissorRect, Viewport};
use emberlight_graphics::{
    BufferDescriptor, BufferUsage, DummyConfig, GraphicsError, ImageData, ResourceFlags,
    ResourceStates, ResourceUpload, TextureFormat,
};

// ============================================================================
// Upload Tests
// ============================================================================

/// Upload into a default-heap buffer, copy it to a readback buffer and
/// compare.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_buffer_upload_readback(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    const SIZE: u64 = 1024;
    let data = generate_test_pattern(SIZE as usize);
    let device = &ctx.device;

    let target = device
        .create_buffer(
            &BufferDescriptor::new(SIZE, BufferUsage::UNORDERED_ACCESS | BufferUsage::COPY_DST)
                .with_label("target"),
        )
        .unwrap();
    let readback = device.create_readback_buffer(SIZE).unwrap();

    let mut upload = ResourceUpload::new(device).unwrap();
    upload
        .upload_buffer(&data, &target, 0, ResourceStates::COMMON)
        .unwrap();
    let list = upload.command_list_mut();
    list.add_barrier(&target, ResourceStates::COMMON, ResourceStates::COPY_SOURCE);
    list.dispatch_barriers();
    list.copy_buffer_region(&readback, 0, &target, 0, SIZE);
    list.add_barrier(&target, ResourceStates::COPY_SOURCE, ResourceStates::COMMON);
    let fence = upload.finish().unwrap();

    assert!(device.queue().is_complete(fence));
    assert_eq!(device.read_buffer(&readback).unwrap(), data);
    assert_eq!(ctx.stats().validation_errors, 0);
}

/// Partial uploads at an offset leave the rest of the buffer alone.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_buffer_upload_at_offset(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let device = &ctx.device;

    let target = device
        .create_buffer(&BufferDescriptor::new(64, BufferUsage::COPY_DST | BufferUsage::COPY_SRC))
        .unwrap();
    let readback = device.create_readback_buffer(64).unwrap();

    let mut upload = ResourceUpload::new(device).unwrap();
    upload
        .upload_buffer(&[0xAA; 16], &target, 32, ResourceStates::COMMON)
        .unwrap();
    let list = upload.command_list_mut();
    list.add_barrier(&target, ResourceStates::COMMON, ResourceStates::COPY_SOURCE);
    list.dispatch_barriers();
    list.copy_buffer_region(&readback, 0, &target, 0, 64);
    list.add_barrier(&target, ResourceStates::COPY_SOURCE, ResourceStates::COMMON);
    upload.finish().unwrap();

    let bytes = device.read_buffer(&readback).unwrap();
    assert!(bytes[..32].iter().all(|&b| b == 0));
    assert!(bytes[32..48].iter().all(|&b| b == 0xAA));
    assert!(bytes[48..].iter().all(|&b| b == 0));
}

/// Pixels uploaded into a texture come back unchanged.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_texture_round_trip(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let device = &ctx.device;

    let pixels = generate_test_pattern(8 * 4 * 4);
    let texture = device.create_texture_from_pixels(&pixels, 8, 4).unwrap();
    assert!(texture.srv().is_valid());

    let texels = device
        .read_back_texture(&texture, ResourceStates::PIXEL_SHADER_RESOURCE)
        .unwrap();
    assert_eq!(texels, pixels);
    assert_eq!(ctx.stats().validation_errors, 0);
}

/// A padded footprint uploads only the texels, not the padding.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_texture_upload_with_row_pitch(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let device = &ctx.device;

    let texture = device
        .create_texture_2d(2, 2, TextureFormat::Rgba8Unorm, ResourceFlags::empty())
        .unwrap();
    // Two rows of 8 bytes, each padded to 16
    let mut padded = vec![0xEEu8; 24];
    padded[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    padded[16..24].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

    let footprint = ImageData::new(2, 2, TextureFormat::Rgba8Unorm).with_row_pitch(16);
    device.copy_to_texture(&padded, footprint, &texture).unwrap();

    let texels = device
        .read_back_texture(&texture, ResourceStates::PIXEL_SHADER_RESOURCE)
        .unwrap();
    assert_eq!(texels, (1..=16).collect::<Vec<u8>>());
}

// ============================================================================
// Budget Tests
// ============================================================================

/// Buffers and textures past the memory budget fail with the size and
/// format that did not fit.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_budget_overrun(#[case] backend: Backend) {
    let Some(ctx) = TestContext::with_config(
        backend,
        DummyConfig::default().with_memory_budget(64 * 1024),
        small_config(),
    ) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let device = &ctx.device;
    let used = ctx.gpu.memory_used();
    assert!(used > 0 && used < 64 * 1024);

    let err = device
        .create_buffer(&BufferDescriptor::new(64 * 1024, BufferUsage::UNORDERED_ACCESS).with_label("huge"))
        .unwrap_err();
    match err {
        GraphicsError::ResourceCreation {
            label, size, format, ..
        } => {
            assert_eq!(label, "huge");
            assert_eq!(size, 64 * 1024);
            assert_eq!(format, None);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = device
        .create_texture_2d(256, 256, TextureFormat::Rgba8Unorm, ResourceFlags::empty())
        .unwrap_err();
    assert!(matches!(
        err,
        GraphicsError::ResourceCreation {
            size: 262_144,
            format: Some(TextureFormat::Rgba8Unorm),
            ..
        }
    ));

    // Failed creations reserve nothing
    assert_eq!(ctx.gpu.memory_used(), used);
}

/// Dropping a resource returns its memory to the budget.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_dropped_buffer_frees_budget(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let before = ctx.gpu.memory_used();

    let buffer = ctx.device.create_upload_buffer(4096, None).unwrap();
    assert_eq!(ctx.gpu.memory_used(), before + 4096);
    drop(buffer);
    assert_eq!(ctx.gpu.memory_used(), before);
}

// ============================================================================
// Failure Path Tests
// ============================================================================

/// A resize that runs out of memory halfway keeps the old back buffers,
/// views and viewport, and the device keeps rendering at the old size.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_failed_resize_keeps_device_usable(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::with_config(
        backend,
        DummyConfig::default().with_memory_budget(64 * 1024),
        small_config(),
    ) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let used = ctx.gpu.memory_used();
    let rtv = ctx.device.render_target_view();
    let dsv = ctx.device.depth_stencil_view();

    // The third 64x64 back buffer no longer fits next to the old set
    let err = ctx.device.resize(64, 64).unwrap_err();
    match err {
        GraphicsError::ResourceCreation { label, size, .. } => {
            assert_eq!(label, "back buffer 2");
            assert_eq!(size, 64 * 64 * 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ctx.gpu.memory_used(), used);
    assert_eq!((ctx.device.config().width, ctx.device.config().height), (32, 32));
    assert_eq!(ctx.device.viewport(), Viewport::new(32, 32));
    assert_eq!(ctx.device.scissor(), ScissorRect::new(32, 32));
    assert_eq!(ctx.device.render_target_view(), rtv);
    assert_eq!(ctx.device.depth_stencil_view(), dsv);
    assert_eq!(ctx.device.depth_stencil_buffer().width(), 32);

    for frame in 0..3 {
        assert_eq!(ctx.device.render_target().width(), 32);
        ctx.device.begin_frame().unwrap();
        ctx.record_clear([frame as f32 / 3.0, 0.0, 0.0, 1.0]);
        ctx.device.end_frame().unwrap();
        ctx.device.present();
    }
    ctx.device.wait_idle().unwrap();
    let stats = ctx.stats();
    assert_eq!(stats.clears, 3);
    assert_eq!(stats.validation_errors, 0);

    // A size that fits still works afterwards
    ctx.device.resize(40, 40).unwrap();
    assert_eq!(ctx.device.render_target().width(), 40);
    assert_eq!(ctx.device.render_target_view(), rtv);
    assert_eq!(ctx.device.viewport(), Viewport::new(40, 40));
}

/// A texture copy rejected in the middle of a batch records nothing, and
/// the copies before it still land.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_rejected_copy_keeps_earlier_uploads(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let device = &ctx.device;

    let data = generate_test_pattern(64);
    let target = device
        .create_buffer(&BufferDescriptor::new(64, BufferUsage::COPY_DST | BufferUsage::COPY_SRC))
        .unwrap();
    let readback = device.create_readback_buffer(64).unwrap();
    let texture = device
        .create_texture_2d(4, 2, TextureFormat::Rgba8Unorm, ResourceFlags::empty())
        .unwrap();

    let mut upload = ResourceUpload::new(device).unwrap();
    upload
        .upload_buffer(&data, &target, 0, ResourceStates::COMMON)
        .unwrap();
    let recorded = upload.command_list_mut().commands().len();
    let staged = upload.staged_bytes();

    // Rows overlap when the pitch is shorter than a row
    let overlapping = ImageData::new(4, 2, TextureFormat::Rgba8Unorm).with_row_pitch(8);
    let err = upload
        .upload_texture(
            &[0xFF; 24],
            overlapping,
            &texture,
            ResourceStates::COMMON,
            ResourceStates::PIXEL_SHADER_RESOURCE,
        )
        .unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidParameter(_)));

    // 16-byte texels cannot be copied into 4-byte ones
    let wide = ImageData::new(4, 2, TextureFormat::Rgba32Float);
    let err = upload
        .upload_texture(
            &vec![0xFF; wide.size_in_bytes() as usize],
            wide,
            &texture,
            ResourceStates::COMMON,
            ResourceStates::PIXEL_SHADER_RESOURCE,
        )
        .unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidParameter(_)));
    assert_eq!(upload.command_list_mut().commands().len(), recorded);
    assert_eq!(upload.staged_bytes(), staged);

    let list = upload.command_list_mut();
    list.add_barrier(&target, ResourceStates::COMMON, ResourceStates::COPY_SOURCE);
    list.dispatch_barriers();
    list.copy_buffer_region(&readback, 0, &target, 0, 64);
    list.add_barrier(&target, ResourceStates::COPY_SOURCE, ResourceStates::COMMON);
    upload.finish().unwrap();

    assert_eq!(device.read_buffer(&readback).unwrap(), data);
    let texels = device
        .read_back_texture(&texture, ResourceStates::COMMON)
        .unwrap();
    assert!(texels.iter().all(|&b| b == 0));
    assert_eq!(ctx.stats().validation_errors, 0);
}

/// `copy_to_texture` with a mismatched footprint fails before submitting,
/// leaving the texture in its initial state.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_copy_to_texture_format_mismatch(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let device = &ctx.device;
    let texture = device
        .create_texture_2d(2, 2, TextureFormat::Rgba16Float, ResourceFlags::empty())
        .unwrap();
    let fence = device.queue().last_signaled();

    let footprint = ImageData::new(4, 2, TextureFormat::Rgba8Unorm);
    let err = device
        .copy_to_texture(&[1; 32], footprint, &texture)
        .unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidParameter(_)));
    assert_eq!(device.queue().last_signaled(), fence);
}

// ============================================================================
// Descriptor Tests
// ============================================================================

/// Views created after startup take the slots after the per-frame constant
/// buffer views, and those indices stay put across resizes.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_bindless_indices_are_stable(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let frames = ctx.device.config().frames_in_flight as i32;
    let pixels = generate_test_pattern(4 * 4 * 4);
    let first = ctx.device.create_texture_from_pixels(&pixels, 4, 4).unwrap();
    let second = ctx.device.create_texture_from_pixels(&pixels, 4, 4).unwrap();
    assert_eq!(first.srv().index, frames);
    assert_eq!(second.srv().index, frames + 1);

    ctx.device.resize(64, 48).unwrap();
    assert_eq!(first.srv().index, frames);
    assert_eq!(ctx.device.shader_visible_descriptors_used(), frames as usize + 2);
}

/// The shader-visible table rejects views past its capacity.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_descriptor_capacity(#[case] backend: Backend) {
    let Some(ctx) = TestContext::with_config(
        backend,
        DummyConfig::default(),
        small_config().with_cbv_srv_uav_capacity(4),
    ) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let pixels = generate_test_pattern(16);
    ctx.device.create_texture_from_pixels(&pixels, 2, 2).unwrap();
    let err = ctx
        .device
        .create_texture_from_pixels(&pixels, 2, 2)
        .unwrap_err();
    assert!(matches!(
        err,
        GraphicsError::CapacityExceeded {
            requested: 1,
            used: 4,
            capacity: 4,
            ..
        }
    ));
}
