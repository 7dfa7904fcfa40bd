//! Canvas recording and batching.
//!
//! A [`Canvas`] converts high-level draw calls into two homogeneous
//! instanced parameter streams — [`RRectParam`] for everything expressible
//! as a rounded rect and [`NgonParam`] for triangulated geometry — plus an
//! ordered list of [`Pass`]es. Consecutive draws sharing the same
//! `(batch type, clip rect)` coalesce into one instanced pass; any change
//! flushes the open batch.
//!
//! Pass closures are type-erased `(call fn, arena ctx, drop fn)` triples
//! whose environment lives in the canvas frame arena, so recording a frame
//! performs no per-pass heap allocation and everything is reclaimed at once
//! on `begin_recording`.
//!
//! Recording is single-threaded: exactly one thread may call drawing
//! operations between `begin_recording` and `end_recording`. The recorded
//! passes may later be invoked on a render thread.

use std::ptr::NonNull;

use vellum_core::{ColorGradient, CRect, FrameArena, Mat4, Rect, RectU, Vec2, Vec2I, Vec2U, Vec4};
use vellum_gpu::backend::{CommandEncoder, DescriptorSet, Viewport};
use vellum_gpu::GpuContext;

use crate::passes::{NgonPassParams, PassContext, RRectPassParams, RenderTarget};
use crate::path;

/// A single shape draw.
///
/// `center`/`extent` are world-space; `transform` composes on top.
/// `stroke` lerps between fill (0) and stroke (1); `thickness` is the
/// stroke width in pixels and must be positive when `stroke > 0`.
#[derive(Clone, Copy, Debug)]
pub struct ShapeDesc {
    pub center: Vec2,
    pub extent: Vec2,
    pub transform: Mat4,
    /// Corner radii if rounded, in the order x/y/z/w = bottom-right,
    /// top-right, top-left, bottom-left of the outline walk.
    pub corner_radii: Vec4,
    pub stroke: f32,
    pub thickness: f32,
    pub tint: ColorGradient,
    /// Sampler slot in the bindless sampler array.
    pub sampler: u32,
    /// Texture slot in the bindless texture array.
    pub texture: u32,
    /// UV of the upper-left and lower-right corners.
    pub uv: [Vec2; 2],
    pub tiling: f32,
    pub edge_smoothness: f32,
}

impl Default for ShapeDesc {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            extent: Vec2::ZERO,
            transform: Mat4::IDENTITY,
            corner_radii: Vec4::ZERO,
            stroke: 0.0,
            thickness: 1.0,
            tint: ColorGradient::default(),
            sampler: 0,
            texture: 0,
            uv: [Vec2::ZERO, Vec2::ONE],
            tiling: 1.0,
            edge_smoothness: 0.0015,
        }
    }
}

/// Scaling behavior of the stretched regions of a nine-slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScaleMode {
    /// Stretched regions sample their uv cell once, distorted.
    #[default]
    Stretch,
    /// Stretched regions repeat their uv cell at the corner density.
    Tile,
}

/// GPU instance record for the rounded-rect pipeline. Rect when radii are
/// zero, circle when radii are 1 with a square extent.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RRectParam {
    pub transform: Mat4,
    pub tint: ColorGradient,
    /// Radii normalized to the shortest extent.
    pub radii: Vec4,
    pub uv: [Vec2; 2],
    pub tiling: f32,
    pub aspect_ratio: f32,
    pub stroke: f32,
    /// Stroke thickness normalized like the radii.
    pub thickness: f32,
    pub edge_smoothness: f32,
    pub sampler: u32,
    pub albedo: u32,
}

/// GPU instance record for the indexed-triangle pipeline. Vertices and
/// indices are pulled from the shared SSBOs starting at `first_vertex` /
/// `first_index`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NgonParam {
    pub transform: Mat4,
    pub tint: ColorGradient,
    pub uv: [Vec2; 2],
    pub tiling: f32,
    pub sampler: u32,
    pub albedo: u32,
    pub first_index: u32,
    pub first_vertex: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchType {
    #[default]
    None,
    RRect,
    Ngon,
}

/// Contiguous range into one of the two param streams.
#[derive(Clone, Copy, Debug, Default)]
pub struct Slice32 {
    pub offset: u32,
    pub span: u32,
}

/// The open batch: primitives extend it while their type and clip match.
#[derive(Clone, Copy, Debug)]
pub struct Batch {
    pub ty: BatchType,
    pub clip: CRect,
    pub objects: Slice32,
}

impl Default for Batch {
    fn default() -> Self {
        Self {
            ty: BatchType::None,
            clip: CRect::INFINITE,
            objects: Slice32::default(),
        }
    }
}

/// Everything a recorded pass closure gets at render time.
pub struct RenderContext<'a> {
    pub canvas: &'a Canvas,
    pub gpu: &'a GpuContext,
    pub passes: &'a PassContext,
    pub rt: &'a RenderTarget,
    pub enc: &'a dyn CommandEncoder,
    /// Storage descriptors for this ring slot's uploads.
    pub rrects: DescriptorSet,
    pub ngons: DescriptorSet,
    pub ngon_vertices: DescriptorSet,
    pub ngon_indices: DescriptorSet,
}

type PassTask = unsafe fn(*mut u8, &RenderContext<'_>);
type PassUninit = unsafe fn(*mut u8);

/// A deferred render pass: a name plus a type-erased closure whose
/// environment lives in the canvas frame arena until the next reset.
pub struct Pass {
    pub name: &'static str,
    task: PassTask,
    ctx: NonNull<u8>,
    uninit: PassUninit,
}

impl Pass {
    pub fn invoke(&self, rc: &RenderContext<'_>) {
        // Safety: ctx points at the F this task shim was instantiated for,
        // alive until Canvas::reset runs our uninit.
        unsafe { (self.task)(self.ctx.as_ptr(), rc) }
    }
}

unsafe fn call_shim<F: Fn(&RenderContext<'_>)>(ctx: *mut u8, rc: &RenderContext<'_>) {
    (*(ctx as *const F))(rc)
}

unsafe fn uninit_shim<F>(ctx: *mut u8) {
    std::ptr::drop_in_place(ctx as *mut F)
}

/// Map a clip rect through the viewport into a pixel scissor clamped to
/// the surface.
pub fn clip_to_scissor(viewport: &Viewport, clip: &CRect, surface_extent: Vec2U) -> RectU {
    let rect = Rect {
        offset: viewport.offset + clip.center - clip.extent / 2.0,
        extent: clip.extent,
    };
    let offset = Vec2I::new(rect.offset.x as i32, rect.offset.y as i32);
    let extent = Vec2I::new(rect.extent.x as i32, rect.extent.y as i32);

    let mut scissor = RectU {
        offset: Vec2U::new(offset.x.max(0) as u32, offset.y.max(0) as u32),
        extent: Vec2U::new(extent.x.max(0) as u32, extent.y.max(0) as u32),
    };

    scissor.offset.x = scissor.offset.x.min(surface_extent.x);
    scissor.offset.y = scissor.offset.y.min(surface_extent.y);
    scissor.extent.x = scissor.extent.x.min(surface_extent.x - scissor.offset.x);
    scissor.extent.y = scissor.extent.y.min(surface_extent.y - scissor.offset.y);
    scissor
}

/// Compose the object-to-world matrix of a shape: caller transform, then
/// world translation, then the scale out of [-1, +1] object space.
pub fn object_to_world(transform: &Mat4, center: Vec2, extent: Vec2) -> Mat4 {
    *transform * Mat4::translate(center) * Mat4::scale(extent * 0.5)
}

pub struct Canvas {
    frame_arena: FrameArena,
    pub viewport_extent: Vec2,
    pub viewport_aspect_ratio: f32,
    current_clip: CRect,
    pub rrect_params: Vec<RRectParam>,
    pub ngon_params: Vec<NgonParam>,
    pub ngon_vertices: Vec<Vec2>,
    pub ngon_indices: Vec<u32>,
    /// Per-ngon-instance index count, parallel to `ngon_params`.
    pub ngon_index_counts: Vec<u32>,
    batch: Batch,
    pub passes: Vec<Pass>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            frame_arena: FrameArena::new(),
            viewport_extent: Vec2::ZERO,
            viewport_aspect_ratio: 1.0,
            current_clip: CRect::INFINITE,
            rrect_params: Vec::new(),
            ngon_params: Vec::new(),
            ngon_vertices: Vec::new(),
            ngon_indices: Vec::new(),
            ngon_index_counts: Vec::new(),
            batch: Batch::default(),
            passes: Vec::new(),
        }
    }

    pub fn current_clip(&self) -> CRect {
        self.current_clip
    }

    pub fn batch(&self) -> Batch {
        self.batch
    }

    /// Drop all recorded passes (running their destructors) and reclaim
    /// every frame-lifetime allocation.
    pub fn reset(&mut self) -> &mut Self {
        for pass in self.passes.drain(..) {
            // Safety: each ctx is dropped exactly once, here or in Drop.
            unsafe { (pass.uninit)(pass.ctx.as_ptr()) };
        }
        self.rrect_params.clear();
        self.ngon_params.clear();
        self.ngon_vertices.clear();
        self.ngon_indices.clear();
        self.ngon_index_counts.clear();
        self.batch = Batch::default();
        self.current_clip = CRect::INFINITE;
        self.frame_arena.reset();
        self
    }

    /// Reset all buffers and start recording a new frame.
    pub fn begin_recording(&mut self, viewport_extent: Vec2) -> &mut Self {
        self.reset();
        self.viewport_extent = viewport_extent;
        self.viewport_aspect_ratio = if viewport_extent.x == 0.0 || viewport_extent.y == 0.0 {
            1.0
        } else {
            viewport_extent.x / viewport_extent.y
        };
        self
    }

    /// Flush the open batch into the pass list.
    pub fn end_recording(&mut self) -> &mut Self {
        self.flush_batch();
        self
    }

    /// Update the clip applied to subsequent primitives. Does not flush:
    /// the batcher compares clip rects per primitive.
    pub fn clip(&mut self, area: CRect) -> &mut Self {
        self.current_clip = area;
        self
    }

    fn flush_batch(&mut self) {
        let batch = self.batch;
        match batch.ty {
            BatchType::RRect => {
                self.batch = Batch::default();
                self.push_pass("RRect", move |ctx: &RenderContext<'_>| {
                    let params = RRectPassParams {
                        scissor: batch.clip,
                        viewport: ctx.rt.viewport,
                        params_ssbo: ctx.rrects,
                        textures: ctx.gpu.texture_views,
                        samplers: ctx.gpu.samplers,
                        first_instance: batch.objects.offset,
                        num_instances: batch.objects.span,
                    };
                    ctx.passes.rrect.encode(ctx.rt, ctx.enc, &params);
                });
            }
            BatchType::Ngon => {
                self.batch = Batch::default();
                self.push_pass("Ngon", move |ctx: &RenderContext<'_>| {
                    let counts = &ctx.canvas.ngon_index_counts[batch.objects.offset as usize
                        ..(batch.objects.offset + batch.objects.span) as usize];
                    let params = NgonPassParams {
                        scissor: batch.clip,
                        viewport: ctx.rt.viewport,
                        vertices_ssbo: ctx.ngon_vertices,
                        indices_ssbo: ctx.ngon_indices,
                        params_ssbo: ctx.ngons,
                        textures: ctx.gpu.texture_views,
                        samplers: ctx.gpu.samplers,
                        first_instance: batch.objects.offset,
                    };
                    ctx.passes.ngon.encode(ctx.rt, ctx.enc, &params, counts);
                });
            }
            BatchType::None => {}
        }
    }

    fn push_pass<F>(&mut self, name: &'static str, task: F)
    where
        F: Fn(&RenderContext<'_>) + 'static,
    {
        let ctx = self
            .frame_arena
            .alloc(task)
            .expect("frame arena exhausted");
        self.passes.push(Pass {
            name,
            task: call_shim::<F>,
            ctx: ctx.cast(),
            uninit: uninit_shim::<F>,
        });
    }

    /// Flush the open batch and append a custom pass executed on the
    /// render thread. The closure environment is moved into the frame
    /// arena and dropped on the next reset.
    pub fn add_pass<F>(&mut self, name: &'static str, task: F) -> &mut Self
    where
        F: Fn(&RenderContext<'_>) + 'static,
    {
        self.flush_batch();
        self.push_pass(name, task);
        self
    }

    fn add_rrect(&mut self, param: RRectParam) {
        let index = self.rrect_params.len() as u32;
        self.rrect_params.push(param);

        if self.batch.ty != BatchType::RRect || self.batch.clip != self.current_clip {
            let clip = self.current_clip;
            self.flush_batch();
            self.batch = Batch {
                ty: BatchType::RRect,
                clip,
                objects: Slice32 {
                    offset: index,
                    span: 1,
                },
            };
            return;
        }

        self.batch.objects.span += 1;
    }

    fn add_ngon(&mut self, param: NgonParam, num_indices: u32) {
        let index = self.ngon_params.len() as u32;
        self.ngon_index_counts.push(num_indices);
        self.ngon_params.push(param);

        if self.batch.ty != BatchType::Ngon || self.batch.clip != self.current_clip {
            let clip = self.current_clip;
            self.flush_batch();
            self.batch = Batch {
                ty: BatchType::Ngon,
                clip,
                objects: Slice32 {
                    offset: index,
                    span: 1,
                },
            };
            return;
        }

        self.batch.objects.span += 1;
    }

    fn rrect_param(desc: &ShapeDesc, radii: Vec4) -> RRectParam {
        RRectParam {
            transform: object_to_world(&desc.transform, desc.center, desc.extent),
            tint: desc.tint,
            radii,
            uv: desc.uv,
            tiling: desc.tiling,
            aspect_ratio: desc.extent.x / desc.extent.y,
            stroke: desc.stroke,
            thickness: desc.thickness / desc.extent.y,
            edge_smoothness: desc.edge_smoothness,
            sampler: desc.sampler,
            albedo: desc.texture,
        }
    }

    fn ngon_param(desc: &ShapeDesc, first_index: u32, first_vertex: u32) -> NgonParam {
        NgonParam {
            transform: object_to_world(&desc.transform, desc.center, desc.extent),
            tint: desc.tint,
            uv: desc.uv,
            tiling: desc.tiling,
            sampler: desc.sampler,
            albedo: desc.texture,
            first_index,
            first_vertex,
        }
    }

    /// Draw a circle (a rounded rect with unit radii).
    pub fn circle(&mut self, desc: &ShapeDesc) -> &mut Self {
        self.add_rrect(Self::rrect_param(desc, Vec4::splat(1.0)));
        self
    }

    /// Draw a rectangle (a rounded rect with zero radii).
    pub fn rect(&mut self, desc: &ShapeDesc) -> &mut Self {
        self.add_rrect(Self::rrect_param(desc, Vec4::ZERO));
        self
    }

    /// Draw a rounded rectangle; radii normalize to the vertical extent.
    pub fn rrect(&mut self, desc: &ShapeDesc) -> &mut Self {
        self.add_rrect(Self::rrect_param(desc, desc.corner_radii / desc.extent.y));
        self
    }

    /// Draw a beveled rectangle as triangulated geometry; the bevel slants
    /// come from `desc.corner_radii`.
    pub fn brect(&mut self, desc: &ShapeDesc) -> &mut Self {
        let first_vertex = self.ngon_vertices.len() as u32;
        let first_index = self.ngon_indices.len() as u32;

        path::brect(&mut self.ngon_vertices, desc.corner_radii);
        let num_vertices = self.ngon_vertices.len() as u32 - first_vertex;
        path::triangulate_convex(&mut self.ngon_indices, first_vertex, num_vertices);
        let num_indices = self.ngon_indices.len() as u32 - first_index;

        self.add_ngon(Self::ngon_param(desc, first_index, first_vertex), num_indices);
        self
    }

    /// Draw a squircle with `segments` as an upper bound on the outline
    /// sample count.
    pub fn squircle(&mut self, desc: &ShapeDesc, elasticity: f32, segments: u32) -> &mut Self {
        let first_vertex = self.ngon_vertices.len() as u32;
        let first_index = self.ngon_indices.len() as u32;

        path::squircle(&mut self.ngon_vertices, elasticity, segments);
        let num_vertices = self.ngon_vertices.len() as u32 - first_vertex;
        if num_vertices == 0 {
            return self;
        }
        path::triangulate_convex(&mut self.ngon_indices, first_vertex, num_vertices);
        let num_indices = self.ngon_indices.len() as u32 - first_index;

        self.add_ngon(Self::ngon_param(desc, first_index, first_vertex), num_indices);
        self
    }

    /// Draw non-indexed triangles in object space. No-op below 3 points.
    pub fn triangles(&mut self, desc: &ShapeDesc, points: &[Vec2]) -> &mut Self {
        if points.len() < 3 {
            return self;
        }

        let first_vertex = self.ngon_vertices.len() as u32;
        let first_index = self.ngon_indices.len() as u32;

        self.ngon_vertices.extend_from_slice(points);
        path::triangles(&mut self.ngon_indices, first_vertex, points.len() as u32);
        let num_indices = self.ngon_indices.len() as u32 - first_index;

        self.add_ngon(Self::ngon_param(desc, first_index, first_vertex), num_indices);
        self
    }

    /// Draw indexed triangles in object space. No-op below 3 points.
    pub fn indexed_triangles(
        &mut self,
        desc: &ShapeDesc,
        points: &[Vec2],
        indices: &[u32],
    ) -> &mut Self {
        if points.len() < 3 {
            return self;
        }

        let first_vertex = self.ngon_vertices.len() as u32;
        let first_index = self.ngon_indices.len() as u32;

        self.ngon_vertices.extend_from_slice(points);
        self.ngon_indices
            .extend(indices.iter().map(|i| i + first_vertex));

        self.add_ngon(
            Self::ngon_param(desc, first_index, first_vertex),
            indices.len() as u32,
        );
        self
    }

    /// Stroke-triangulate and draw a polyline. The stroke thickness is
    /// `desc.thickness` normalized by the vertical extent. No-op below 2
    /// points.
    pub fn line(&mut self, desc: &ShapeDesc, points: &[Vec2]) -> &mut Self {
        if points.len() < 2 {
            return self;
        }

        let first_vertex = self.ngon_vertices.len() as u32;
        let first_index = self.ngon_indices.len() as u32;

        path::triangulate_stroke(
            points,
            &mut self.ngon_vertices,
            &mut self.ngon_indices,
            desc.thickness / desc.extent.y,
        );
        let num_indices = self.ngon_indices.len() as u32 - first_index;

        self.add_ngon(Self::ngon_param(desc, first_index, first_vertex), num_indices);
        self
    }

    /// Draw a nine-slice: the shape splits into a 3x3 grid whose corner
    /// cells keep their natural size while the edges stretch along one
    /// axis and the center along both.
    ///
    /// ```text
    /// 0 | 1 | 2      0 2 6 8  unscaled
    /// --+---+--      1 7      horizontal
    /// 3 | 4 | 5      3 5      vertical
    /// --+---+--      4        horizontal + vertical
    /// 6 | 7 | 8
    /// ```
    ///
    /// `uvs` holds one `(u0, v0, u1, v1)` rect per region in row-major
    /// order. Border cells are sized by their uv fraction of the shorter
    /// extent, so borders keep constant thickness as the shape stretches;
    /// the middle row/column absorbs the remainder. With
    /// [`ScaleMode::Tile`] the stretched cells raise their tiling factor
    /// by the stretch ratio instead of distorting.
    ///
    /// Panics unless exactly 9 uv rects are given.
    pub fn nine_slice(&mut self, desc: &ShapeDesc, mode: ScaleMode, uvs: &[Vec4]) -> &mut Self {
        assert_eq!(uvs.len(), 9, "a nine-slice needs one uv rect per region");

        let unit = desc.extent.x.min(desc.extent.y);
        let left = (uvs[0].z - uvs[0].x) * unit;
        let right = (uvs[2].z - uvs[2].x) * unit;
        let top = (uvs[0].w - uvs[0].y) * unit;
        let bottom = (uvs[6].w - uvs[6].y) * unit;

        let widths = [left, (desc.extent.x - left - right).max(0.0), right];
        let heights = [top, (desc.extent.y - top - bottom).max(0.0), bottom];

        let begin = desc.center - desc.extent * 0.5;
        let mut y = begin.y;
        for row in 0..3 {
            let mut x = begin.x;
            for col in 0..3 {
                let extent = Vec2::new(widths[col], heights[row]);
                let uv = uvs[row * 3 + col];

                if extent.x <= 0.0 || extent.y <= 0.0 {
                    x += extent.x;
                    continue;
                }

                let tiling = match mode {
                    ScaleMode::Stretch => desc.tiling,
                    ScaleMode::Tile => {
                        // repeat a stretched cell at the density its uv
                        // cell covers unstretched
                        let natural =
                            Vec2::new((uv.z - uv.x) * unit, (uv.w - uv.y) * unit);
                        let rx = if col == 1 && natural.x > 0.0 {
                            extent.x / natural.x
                        } else {
                            1.0
                        };
                        let ry = if row == 1 && natural.y > 0.0 {
                            extent.y / natural.y
                        } else {
                            1.0
                        };
                        desc.tiling * rx.max(ry)
                    }
                };

                self.rect(&ShapeDesc {
                    center: Vec2::new(x + extent.x * 0.5, y + extent.y * 0.5),
                    extent,
                    uv: [Vec2::new(uv.x, uv.y), Vec2::new(uv.z, uv.w)],
                    tiling,
                    ..*desc
                });

                x += extent.x;
            }
            y += heights[row];
        }
        self
    }

    /// Apply a canvas-space blur over `area`, running `num_passes > 0`
    /// iterations. Flushes the open batch.
    pub fn blur(&mut self, area: CRect, num_passes: u32) -> &mut Self {
        assert!(num_passes > 0, "blur requires at least one pass");
        self.add_pass("Blur", move |ctx: &RenderContext<'_>| {
            ctx.passes.blur.encode(ctx.gpu, ctx.rt, ctx.enc, &area, num_passes);
        })
    }
}

impl Drop for Canvas {
    fn drop(&mut self) {
        for pass in self.passes.drain(..) {
            // Safety: ctx not yet dropped; arena memory outlives this loop.
            unsafe { (pass.uninit)(pass.ctx.as_ptr()) };
        }
    }
}
