//! Built-in render passes.
//!
//! The canvas flushes batches into closures that encode through these
//! passes. Pipelines and shader sources live behind the backend boundary;
//! a pass only records the abstract command sequence: rendering scope,
//! viewport/scissor state, descriptor bindings, draws.

use vellum_core::{CRect, Vec2U};
use vellum_gpu::backend::{
    CommandEncoder, DescriptorSet, Filter, ImageBlit, ImageSubresourceLayers, ImageView,
    RenderingInfo, Viewport,
};
use vellum_gpu::GpuContext;

use crate::canvas::clip_to_scissor;

/// Where a frame renders: the attachments, surface extent and viewport of
/// the active framebuffer.
#[derive(Clone, Copy, Debug)]
pub struct RenderTarget {
    pub color: ImageView,
    pub depth_stencil: ImageView,
    pub extent: Vec2U,
    pub viewport: Viewport,
}

/// Registry of the built-in passes handed to every pass closure.
#[derive(Default)]
pub struct PassContext {
    pub rrect: RRectPass,
    pub ngon: NgonPass,
    pub blur: BlurPass,
}

pub struct RRectPassParams {
    pub scissor: CRect,
    pub viewport: Viewport,
    pub params_ssbo: DescriptorSet,
    pub textures: DescriptorSet,
    pub samplers: DescriptorSet,
    pub first_instance: u32,
    pub num_instances: u32,
}

/// Instanced rounded-rect pass: one 4-vertex instance per [`crate::RRectParam`].
#[derive(Default)]
pub struct RRectPass;

impl RRectPass {
    pub fn encode(&self, rt: &RenderTarget, enc: &dyn CommandEncoder, params: &RRectPassParams) {
        enc.begin_rendering(RenderingInfo {
            render_extent: rt.extent,
            color_attachments: &[rt.color],
            depth_stencil_attachment: Some(rt.depth_stencil),
        });
        enc.set_viewport(params.viewport);
        enc.set_scissor(clip_to_scissor(&params.viewport, &params.scissor, rt.extent));
        enc.bind_descriptor_sets(&[params.params_ssbo, params.textures, params.samplers]);
        enc.draw(0, 4, params.first_instance, params.num_instances);
        enc.end_rendering();
    }
}

pub struct NgonPassParams {
    pub scissor: CRect,
    pub viewport: Viewport,
    pub vertices_ssbo: DescriptorSet,
    pub indices_ssbo: DescriptorSet,
    pub params_ssbo: DescriptorSet,
    pub textures: DescriptorSet,
    pub samplers: DescriptorSet,
    pub first_instance: u32,
}

/// Indexed-triangle pass: vertex pulling from the shared vertex/index
/// SSBOs, one draw per instance with its own index count.
#[derive(Default)]
pub struct NgonPass;

impl NgonPass {
    pub fn encode(
        &self,
        rt: &RenderTarget,
        enc: &dyn CommandEncoder,
        params: &NgonPassParams,
        index_counts: &[u32],
    ) {
        enc.begin_rendering(RenderingInfo {
            render_extent: rt.extent,
            color_attachments: &[rt.color],
            depth_stencil_attachment: Some(rt.depth_stencil),
        });
        enc.set_viewport(params.viewport);
        enc.set_scissor(clip_to_scissor(&params.viewport, &params.scissor, rt.extent));
        enc.bind_descriptor_sets(&[
            params.vertices_ssbo,
            params.indices_ssbo,
            params.params_ssbo,
            params.textures,
            params.samplers,
        ]);
        for (instance, &count) in index_counts.iter().enumerate() {
            enc.draw(0, count, params.first_instance + instance as u32, 1);
        }
        enc.end_rendering();
    }
}

/// Canvas-space blur: downsample the covered screen region into a scratch
/// framebuffer, ping-pong blit between the two scratch targets, and blit
/// the result back. The linear blit filter does the smoothing; more passes
/// widen the kernel.
#[derive(Default)]
pub struct BlurPass;

impl BlurPass {
    pub fn encode(
        &self,
        gpu: &GpuContext,
        rt: &RenderTarget,
        enc: &dyn CommandEncoder,
        area: &CRect,
        num_passes: u32,
    ) {
        let region = clip_to_scissor(&rt.viewport, area, rt.extent);
        if region.extent.x == 0 || region.extent.y == 0 {
            return;
        }

        let scratch = gpu.scratch_fbs();
        let screen = gpu.screen_fb();

        let full = [
            [region.offset.x, region.offset.y, 0],
            [
                region.offset.x + region.extent.x,
                region.offset.y + region.extent.y,
                1,
            ],
        ];
        let half = [
            [region.offset.x / 2, region.offset.y / 2, 0],
            [
                region.offset.x / 2 + (region.extent.x / 2).max(1),
                region.offset.y / 2 + (region.extent.y / 2).max(1),
                1,
            ],
        ];

        enc.blit_image(
            screen.color.image,
            scratch[0].color.image,
            &[ImageBlit {
                src_layers: ImageSubresourceLayers::COLOR,
                src_offsets: full,
                dst_layers: ImageSubresourceLayers::COLOR,
                dst_offsets: half,
            }],
            Filter::Linear,
        );

        for pass in 0..num_passes {
            let src = &scratch[(pass % 2) as usize];
            let dst = &scratch[((pass + 1) % 2) as usize];
            enc.blit_image(
                src.color.image,
                dst.color.image,
                &[ImageBlit {
                    src_layers: ImageSubresourceLayers::COLOR,
                    src_offsets: half,
                    dst_layers: ImageSubresourceLayers::COLOR,
                    dst_offsets: half,
                }],
                Filter::Linear,
            );
        }

        let last = &scratch[(num_passes % 2) as usize];
        enc.blit_image(
            last.color.image,
            screen.color.image,
            &[ImageBlit {
                src_layers: ImageSubresourceLayers::COLOR,
                src_offsets: half,
                dst_layers: ImageSubresourceLayers::COLOR,
                dst_offsets: full,
            }],
            Filter::Linear,
        );
    }
}
