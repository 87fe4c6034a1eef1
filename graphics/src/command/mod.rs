//! Command recording.
//!
//! A [`CommandList`] records [`Command`]s in order. Closing the list hands
//! the stream to the backend, which executes it exactly in recording order.

mod barrier;
mod list;

pub use barrier::{BarrierBatch, BarrierTarget, ResourceBarrier};
pub use list::{CommandList, CommandListState};

use crate::backend::{GpuBuffer, GpuDescriptorHeap, GpuPipelineState, GpuRootSignature, GpuTexture};
use crate::descriptor::CpuDescriptorHandle;
use crate::types::{
    ImageData, IndexBufferView, PrimitiveTopology, ScissorRect, VertexBufferView, Viewport,
};

/// One recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A batch of state transitions, executed together.
    ResourceBarrier(Vec<ResourceBarrier>),
    ClearRenderTarget {
        view: CpuDescriptorHandle,
        color: [f32; 4],
    },
    ClearDepthStencil {
        view: CpuDescriptorHandle,
        depth: f32,
        stencil: u8,
    },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    SetRenderTargets {
        render_targets: Vec<CpuDescriptorHandle>,
        depth_stencil: Option<CpuDescriptorHandle>,
    },
    CopyBufferRegion {
        dst: GpuBuffer,
        dst_offset: u64,
        src: GpuBuffer,
        src_offset: u64,
        size: u64,
    },
    /// Copy pixel rows laid out as `footprint` in `src` into `dst`.
    CopyBufferToTexture {
        src: GpuBuffer,
        footprint: ImageData,
        dst: GpuTexture,
    },
    /// Copy `src` into `dst` with the row layout of `footprint`.
    CopyTextureToBuffer {
        src: GpuTexture,
        dst: GpuBuffer,
        footprint: ImageData,
    },
    SetDescriptorHeaps(Vec<GpuDescriptorHeap>),
    SetPipelineState(GpuPipelineState),
    SetGraphicsRootSignature(GpuRootSignature),
    SetVertexBuffers {
        start_slot: u32,
        views: Vec<VertexBufferView>,
    },
    SetIndexBuffer(IndexBufferView),
    SetPrimitiveTopology(PrimitiveTopology),
    DrawIndexedInstanced {
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },
    SetGraphicsRootConstantBufferView {
        root_index: u32,
        address: u64,
    },
    SetGraphicsRoot32BitConstants {
        root_index: u32,
        values: Vec<u32>,
        dest_offset: u32,
    },
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ResourceBarrier(_) => "ResourceBarrier",
            Self::ClearRenderTarget { .. } => "ClearRenderTarget",
            Self::ClearDepthStencil { .. } => "ClearDepthStencil",
            Self::SetViewport(_) => "SetViewport",
            Self::SetScissor(_) => "SetScissor",
            Self::SetRenderTargets { .. } => "SetRenderTargets",
            Self::CopyBufferRegion { .. } => "CopyBufferRegion",
            Self::CopyBufferToTexture { .. } => "CopyBufferToTexture",
            Self::CopyTextureToBuffer { .. } => "CopyTextureToBuffer",
            Self::SetDescriptorHeaps(_) => "SetDescriptorHeaps",
            Self::SetPipelineState(_) => "SetPipelineState",
            Self::SetGraphicsRootSignature(_) => "SetGraphicsRootSignature",
            Self::SetVertexBuffers { .. } => "SetVertexBuffers",
            Self::SetIndexBuffer(_) => "SetIndexBuffer",
            Self::SetPrimitiveTopology(_) => "SetPrimitiveTopology",
            Self::DrawIndexedInstanced { .. } => "DrawIndexedInstanced",
            Self::SetGraphicsRootConstantBufferView { .. } => "SetGraphicsRootConstantBufferView",
            Self::SetGraphicsRoot32BitConstants { .. } => "SetGraphicsRoot32BitConstants",
        }
    }
}
