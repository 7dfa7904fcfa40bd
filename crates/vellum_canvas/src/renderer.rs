//! Render pipeline driver.
//!
//! Owns one set of upload buffers per frame ring slot. Per frame:
//! `begin_frame` flushes the canvas and uploads the four parameter streams
//! into this ring slot's SSBOs, then `render_frame` walks the recorded
//! passes with a [`RenderContext`] bundling everything a pass encodes
//! against. Passes being closures, custom user passes compose with the
//! built-in RRect/Ngon/Blur passes without a central switch.

use vellum_gpu::backend::Swapchain;
use vellum_gpu::{GpuContext, GpuError, Ssbo};

use crate::canvas::{Canvas, RenderContext};
use crate::passes::{PassContext, RenderTarget};

/// Upload buffers for one frame ring slot.
struct FrameResources {
    rrect_params: Ssbo,
    ngon_params: Ssbo,
    ngon_vertices: Ssbo,
    ngon_indices: Ssbo,
}

impl FrameResources {
    const fn new() -> Self {
        Self {
            rrect_params: Ssbo::new("rrect params"),
            ngon_params: Ssbo::new("ngon params"),
            ngon_vertices: Ssbo::new("ngon vertices"),
            ngon_indices: Ssbo::new("ngon indices"),
        }
    }
}

pub struct Renderer {
    resources: Vec<FrameResources>,
    passes: PassContext,
}

impl Renderer {
    pub fn new(buffering: u32) -> Self {
        tracing::debug!("renderer up with {buffering} frames in flight");
        Self {
            resources: (0..buffering).map(|_| FrameResources::new()).collect(),
            passes: PassContext::default(),
        }
    }

    pub fn pass_context(&self) -> &PassContext {
        &self.passes
    }

    /// Begin the GPU frame and upload the canvas parameter streams into
    /// this ring slot.
    pub fn begin_frame(
        &mut self,
        gpu: &mut GpuContext,
        canvas: &mut Canvas,
        swapchain: Option<Swapchain>,
    ) -> Result<(), GpuError> {
        gpu.begin_frame(swapchain)?;

        canvas.end_recording();

        let resources = &mut self.resources[gpu.ring_index() as usize];
        resources
            .ngon_vertices
            .copy(gpu, bytemuck::cast_slice(&canvas.ngon_vertices))?;
        resources
            .ngon_indices
            .copy(gpu, bytemuck::cast_slice(&canvas.ngon_indices))?;
        resources
            .ngon_params
            .copy(gpu, bytemuck::cast_slice(&canvas.ngon_params))?;
        resources
            .rrect_params
            .copy(gpu, bytemuck::cast_slice(&canvas.rrect_params))?;
        Ok(())
    }

    /// Invoke every recorded pass closure in order.
    pub fn render_frame(&self, gpu: &GpuContext, canvas: &Canvas, rt: &RenderTarget) {
        let resources = &self.resources[gpu.ring_index() as usize];
        let rc = RenderContext {
            canvas,
            gpu,
            passes: &self.passes,
            rt,
            enc: gpu.encoder(),
            rrects: resources.rrect_params.descriptor(),
            ngons: resources.ngon_params.descriptor(),
            ngon_vertices: resources.ngon_vertices.descriptor(),
            ngon_indices: resources.ngon_indices.descriptor(),
        };

        for pass in &canvas.passes {
            pass.invoke(&rc);
        }
    }

    /// Blit to the swapchain and submit.
    pub fn end_frame(
        &mut self,
        gpu: &mut GpuContext,
        swapchain: Option<Swapchain>,
    ) -> Result<(), GpuError> {
        gpu.end_frame(swapchain)
    }

    /// Defer destruction of every ring slot's buffers. Shutdown path.
    pub fn release(&mut self, gpu: &mut GpuContext) {
        for resources in &mut self.resources {
            resources.rrect_params.release(gpu);
            resources.ngon_params.release(gpu);
            resources.ngon_vertices.release(gpu);
            resources.ngon_indices.release(gpu);
        }
    }

    /// Construct the render target for the context's screen framebuffer.
    pub fn screen_target(gpu: &GpuContext) -> RenderTarget {
        let fb = gpu.screen_fb();
        RenderTarget {
            color: fb.color.view,
            depth_stencil: fb.depth_stencil.view,
            extent: fb.extent,
            viewport: vellum_gpu::backend::Viewport {
                offset: vellum_core::Vec2::ZERO,
                extent: fb.extent.as_vec2(),
                min_depth: 0.0,
                max_depth: 1.0,
            },
        }
    }
}
