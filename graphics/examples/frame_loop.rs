//! Run the frame loop against the software GPU and report what it did.
//!
//! ```bash
//! cargo run -p emberlight-graphics --example frame_loop -- --frames 120 --latency-ms 4
//! RUST_LOG=trace cargo run -p emberlight-graphics --example frame_loop -- --frames 6
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use emberlight_graphics::types::ObjectConstants;
use emberlight_graphics::{
    Device, DeviceConfig, DummyBackend, DummyConfig, GpuBackend, GraphicsError, ResourceStates,
    SceneConstants,
};

/// Frame loop driver for the Emberlight frame pipeline.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Number of frames to record.
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Frames the CPU may record ahead of the GPU.
    #[arg(long, default_value_t = 3)]
    frames_in_flight: usize,

    /// Simulated GPU time per submission, in milliseconds.
    #[arg(long, default_value_t = 2)]
    latency_ms: u64,

    /// Objects drawn per frame, each with its own constants.
    #[arg(long, default_value_t = 16)]
    objects: u32,

    #[arg(long, default_value_t = 320)]
    width: u32,

    #[arg(long, default_value_t = 240)]
    height: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    emberlight_graphics::init();

    let args = Args::parse();
    let gpu = Arc::new(DummyBackend::with_config(
        DummyConfig::default().with_latency(Duration::from_millis(args.latency_ms)),
    ));
    let config = DeviceConfig::default()
        .with_label("frame loop")
        .with_frames_in_flight(args.frames_in_flight)
        .with_size(args.width, args.height);
    let mut device = Device::with_backend(gpu.clone() as Arc<dyn GpuBackend>, config)?;

    let start = Instant::now();
    let mut stalled_frames = 0u64;
    for frame in 0..args.frames {
        let begin = device.begin_frame()?;
        if begin.waited_fence > 0 && begin.completed_at_reset == begin.waited_fence {
            stalled_frames += 1;
        }
        record_frame(&mut device, frame, args.objects)?;
        device.end_frame()?;
        device.present();
    }
    device.wait_idle()?;
    let elapsed = start.elapsed();

    let stats = gpu.stats();
    log::info!(
        "{} frames in {:.1?} ({:.1} fps), {} waited on the GPU",
        args.frames,
        elapsed,
        args.frames as f64 / elapsed.as_secs_f64(),
        stalled_frames
    );
    log::info!(
        "GPU: {} submissions, {} signals, {} barriers in {} batches, {} clears, {} validation errors",
        stats.submissions,
        stats.signals,
        stats.barriers,
        stats.barrier_batches,
        stats.clears,
        stats.validation_errors
    );
    log::info!("Video memory in use: {} bytes", gpu.memory_used());
    Ok(())
}

fn record_frame(device: &mut Device, frame: u64, objects: u32) -> Result<(), GraphicsError> {
    let rtv = device.render_target_view();
    let dsv = device.depth_stencil_view();
    let back_buffer = device.render_target().gpu().clone();
    let viewport = device.viewport();
    let scissor = device.scissor();

    let t = frame as f32 / 60.0;
    let frame_resource = device.frame_resource_mut();
    frame_resource.write_constants(&SceneConstants::default())?;

    for object in 0..objects {
        let mut constants = ObjectConstants::default();
        constants.world[3][0] = object as f32;
        constants.world[3][1] = t.sin();
        let allocation = frame_resource.linear_allocator.allocate_pod(&constants)?;
        frame_resource
            .command_list
            .set_graphics_root_cbv(1, allocation.gpu_address);
    }

    let list = &mut frame_resource.command_list;
    list.add_barrier(&back_buffer, ResourceStates::PRESENT, ResourceStates::RENDER_TARGET);
    list.dispatch_barriers();
    list.set_viewport(viewport);
    list.set_scissor(scissor);
    list.set_render_targets(&[rtv], Some(dsv));
    list.clear_render_target(rtv, [0.1, 0.1 + 0.1 * t.sin().abs(), 0.2, 1.0]);
    list.clear_depth_stencil(dsv, 1.0, 0);
    list.add_barrier(&back_buffer, ResourceStates::RENDER_TARGET, ResourceStates::PRESENT);
    Ok(())
}
