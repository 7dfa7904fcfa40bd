//! Vellum Canvas
//!
//! The recording and batching layer of the engine. Drawing calls become two
//! instanced parameter streams (rounded rects and triangulated ngons) plus
//! an ordered pass list; the render driver uploads the streams and replays
//! the passes against the abstract GPU backend.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vellum_canvas::{Canvas, Renderer, ShapeDesc};
//! use vellum_core::{ColorGradient, Vec2, Vec2U, Vec4};
//! use vellum_gpu::{headless::HeadlessDevice, GpuContext};
//!
//! let device = Arc::new(HeadlessDevice::new(2));
//! let mut gpu = GpuContext::new(device, false, 2, Vec2U::new(800, 600)).unwrap();
//! let mut canvas = Canvas::new();
//! let mut renderer = Renderer::new(2);
//!
//! canvas.begin_recording(Vec2::new(800.0, 600.0));
//! canvas.rect(&ShapeDesc {
//!     center: Vec2::new(400.0, 300.0),
//!     extent: Vec2::new(100.0, 100.0),
//!     tint: ColorGradient::uniform(Vec4::new(1.0, 0.0, 0.0, 1.0)),
//!     ..Default::default()
//! });
//!
//! renderer.begin_frame(&mut gpu, &mut canvas, None).unwrap();
//! let target = Renderer::screen_target(&gpu);
//! renderer.render_frame(&gpu, &canvas, &target);
//! renderer.end_frame(&mut gpu, None).unwrap();
//! ```

pub mod atlas;
pub mod canvas;
pub mod passes;
pub mod path;
pub mod renderer;
mod text;

pub use atlas::{AtlasGlyph, FontAtlas, TextBlockStyle, TextStyle};
pub use canvas::{
    clip_to_scissor, object_to_world, Batch, BatchType, Canvas, NgonParam, Pass, RRectParam,
    RenderContext, ScaleMode, ShapeDesc, Slice32,
};
pub use passes::{BlurPass, NgonPass, PassContext, RRectPass, RenderTarget};
pub use renderer::Renderer;
