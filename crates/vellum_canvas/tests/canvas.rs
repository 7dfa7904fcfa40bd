//! Canvas recording, batching and driver tests.
//!
//! Rendering runs against the headless device; batching assertions inspect
//! both the recorded pass list and the command log the pass closures
//! produce.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use vellum_canvas::{Canvas, Renderer, ScaleMode, ShapeDesc};
use vellum_core::{CRect, ColorGradient, Vec2, Vec2U, Vec4};
use vellum_gpu::headless::{Command, HeadlessDevice};
use vellum_gpu::GpuContext;

fn red() -> ColorGradient {
    ColorGradient::uniform(Vec4::new(1.0, 0.0, 0.0, 1.0))
}

fn blue() -> ColorGradient {
    ColorGradient::uniform(Vec4::new(0.0, 0.0, 1.0, 1.0))
}

fn shape(center: Vec2, extent: Vec2, tint: ColorGradient) -> ShapeDesc {
    ShapeDesc {
        center,
        extent,
        tint,
        ..Default::default()
    }
}

fn draws(commands: &[Command]) -> Vec<(u32, u32, u32, u32)> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Draw {
                first_vertex,
                num_vertices,
                first_instance,
                num_instances,
            } => Some((*first_vertex, *num_vertices, *first_instance, *num_instances)),
            _ => None,
        })
        .collect()
}

/// Record with `record`, then run a full headless frame and return the
/// commands the pass closures encoded.
fn render(record: impl FnOnce(&mut Canvas)) -> (Canvas, Vec<Command>) {
    let device = Arc::new(HeadlessDevice::new(2));
    let mut gpu = GpuContext::new(device.clone(), false, 2, Vec2U::new(800, 600)).unwrap();
    let mut canvas = Canvas::new();
    let mut renderer = Renderer::new(2);

    canvas.begin_recording(Vec2::new(800.0, 600.0));
    record(&mut canvas);

    renderer
        .begin_frame(&mut gpu, &mut canvas, None)
        .unwrap();
    let target = Renderer::screen_target(&gpu);
    renderer.render_frame(&gpu, &canvas, &target);
    renderer.end_frame(&mut gpu, None).unwrap();

    let commands = device.ring_commands(gpu.ring_index());
    (canvas, commands)
}

#[test]
fn test_two_rects_coalesce_into_one_pass() {
    // scenario S1
    let (canvas, commands) = render(|canvas| {
        canvas.rect(&shape(
            Vec2::new(400.0, 300.0),
            Vec2::new(100.0, 100.0),
            red(),
        ));
        canvas.rect(&shape(
            Vec2::new(400.0, 300.0),
            Vec2::new(100.0, 100.0),
            blue(),
        ));
    });

    assert_eq!(canvas.passes.len(), 1);
    assert_eq!(canvas.passes[0].name, "RRect");
    assert_eq!(canvas.rrect_params.len(), 2);

    let draws = draws(&commands);
    assert_eq!(draws, vec![(0, 4, 0, 2)]);
}

#[test]
fn test_clip_change_breaks_batch() {
    // scenario S2
    let (canvas, commands) = render(|canvas| {
        let desc = shape(Vec2::new(400.0, 300.0), Vec2::new(100.0, 100.0), red());
        canvas.rect(&desc);
        canvas.clip(CRect::new(Vec2::ZERO, Vec2::new(10.0, 10.0)));
        canvas.rect(&desc);
    });

    assert_eq!(canvas.passes.len(), 2);
    assert_eq!(canvas.rrect_params.len(), 2);

    let draws = draws(&commands);
    assert_eq!(draws, vec![(0, 4, 0, 1), (0, 4, 1, 1)]);

    // the two passes carry distinct scissors
    let scissors: Vec<_> = commands
        .iter()
        .filter_map(|c| match c {
            Command::SetScissor { scissor } => Some(*scissor),
            _ => None,
        })
        .collect();
    assert_eq!(scissors.len(), 2);
    assert_ne!(scissors[0], scissors[1]);
}

#[test]
fn test_batch_type_change_breaks_batch() {
    // scenario S3
    let (canvas, _) = render(|canvas| {
        canvas.brect(&ShapeDesc {
            corner_radii: Vec4::splat(0.2),
            extent: Vec2::new(200.0, 100.0),
            ..Default::default()
        });
        canvas.rect(&shape(Vec2::ZERO, Vec2::new(200.0, 100.0), red()));
    });

    assert_eq!(canvas.passes.len(), 2);
    assert_eq!(canvas.passes[0].name, "Ngon");
    assert_eq!(canvas.passes[1].name, "RRect");
    assert_eq!(canvas.ngon_params.len(), 1);
    assert_eq!(canvas.rrect_params.len(), 1);
}

#[test]
fn test_param_streams_count_draw_calls() {
    let (canvas, _) = render(|canvas| {
        let desc = shape(Vec2::ZERO, Vec2::new(10.0, 10.0), red());
        canvas.circle(&desc);
        canvas.rect(&desc);
        canvas.rrect(&desc);
        canvas.brect(&desc);
        canvas.line(&desc, &[Vec2::ZERO, Vec2::ONE]);
        // degenerate inputs no-op and contribute nothing
        canvas.line(&desc, &[Vec2::ZERO]);
        canvas.triangles(&desc, &[Vec2::ZERO, Vec2::ONE]);
    });

    assert_eq!(canvas.rrect_params.len() + canvas.ngon_params.len(), 5);
}

#[test]
fn test_ngon_instances_share_one_pass() {
    let (canvas, commands) = render(|canvas| {
        let desc = shape(Vec2::ZERO, Vec2::new(10.0, 10.0), red());
        canvas.brect(&desc);
        canvas.brect(&desc);
    });

    assert_eq!(canvas.passes.len(), 1);
    assert_eq!(canvas.ngon_params.len(), 2);
    assert_eq!(canvas.ngon_index_counts, vec![18, 18]);

    // one draw per instance, each with the instance's own index count
    let draws = draws(&commands);
    assert_eq!(draws, vec![(0, 18, 0, 1), (0, 18, 1, 1)]);
}

#[test]
fn test_indexed_triangles_rebase_indices() {
    let (canvas, _) = render(|canvas| {
        let desc = shape(Vec2::ZERO, Vec2::new(10.0, 10.0), red());
        let points = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        canvas.triangles(&desc, &points);
        canvas.indexed_triangles(&desc, &points, &[0, 1, 2]);
    });

    assert_eq!(canvas.ngon_vertices.len(), 6);
    // the second instance's indices were offset by its first vertex
    assert_eq!(canvas.ngon_indices, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(canvas.ngon_params[1].first_vertex, 3);
}

#[test]
fn test_circle_and_rect_radii() {
    let (canvas, _) = render(|canvas| {
        let desc = ShapeDesc {
            extent: Vec2::new(50.0, 100.0),
            corner_radii: Vec4::new(10.0, 20.0, 30.0, 40.0),
            thickness: 5.0,
            ..Default::default()
        };
        canvas.circle(&desc);
        canvas.rect(&desc);
        canvas.rrect(&desc);
    });

    let params = &canvas.rrect_params;
    assert_eq!(params[0].radii, Vec4::splat(1.0));
    assert_eq!(params[1].radii, Vec4::ZERO);
    // rrect radii and stroke thickness normalize against the vertical
    // extent
    assert_eq!(params[2].radii, Vec4::new(0.1, 0.2, 0.3, 0.4));
    assert_eq!(params[2].thickness, 0.05);
    assert_eq!(params[2].aspect_ratio, 0.5);
}

/// A 3x3 uv grid with 0.25-wide border cells.
fn nine_slice_uvs() -> Vec<Vec4> {
    let u = [0.0, 0.25, 0.75, 1.0];
    let mut uvs = Vec::with_capacity(9);
    for row in 0..3 {
        for col in 0..3 {
            uvs.push(Vec4::new(u[col], u[row], u[col + 1], u[row + 1]));
        }
    }
    uvs
}

#[test]
fn test_nine_slice_emits_nine_rects_in_one_pass() {
    let (canvas, commands) = render(|canvas| {
        canvas.nine_slice(
            &ShapeDesc {
                center: Vec2::new(150.0, 50.0),
                extent: Vec2::new(300.0, 100.0),
                tint: red(),
                ..Default::default()
            },
            ScaleMode::Stretch,
            &nine_slice_uvs(),
        );
    });

    assert_eq!(canvas.rrect_params.len(), 9);
    assert_eq!(canvas.passes.len(), 1);
    assert_eq!(draws(&commands), vec![(0, 4, 0, 9)]);

    // every region samples its own uv cell
    let uvs = nine_slice_uvs();
    for (param, uv) in canvas.rrect_params.iter().zip(&uvs) {
        assert_eq!(param.uv, [Vec2::new(uv.x, uv.y), Vec2::new(uv.z, uv.w)]);
    }
}

#[test]
fn test_nine_slice_corner_cells_keep_natural_size() {
    let (canvas, _) = render(|canvas| {
        canvas.nine_slice(
            &ShapeDesc {
                center: Vec2::new(150.0, 50.0),
                extent: Vec2::new(300.0, 100.0),
                tint: red(),
                ..Default::default()
            },
            ScaleMode::Stretch,
            &nine_slice_uvs(),
        );
    });

    // border cells size by uv fraction of the shorter extent (100):
    // corners 25x25, top edge 250x25, left edge 25x50, center 250x50.
    // cell extents show up as the x/y scale of the instance transform
    // (scaled by extent/2 into the [-1, +1] object space).
    let cell = |i: usize| {
        let cols = canvas.rrect_params[i].transform.cols;
        Vec2::new(cols[0][0] * 2.0, cols[1][1] * 2.0)
    };
    assert_eq!(cell(0), Vec2::new(25.0, 25.0));
    assert_eq!(cell(1), Vec2::new(250.0, 25.0));
    assert_eq!(cell(3), Vec2::new(25.0, 50.0));
    assert_eq!(cell(4), Vec2::new(250.0, 50.0));
    assert_eq!(cell(8), Vec2::new(25.0, 25.0));
}

#[test]
fn test_nine_slice_tile_mode_raises_tiling() {
    let (canvas, _) = render(|canvas| {
        canvas.nine_slice(
            &ShapeDesc {
                center: Vec2::new(150.0, 50.0),
                extent: Vec2::new(300.0, 100.0),
                tint: red(),
                ..Default::default()
            },
            ScaleMode::Tile,
            &nine_slice_uvs(),
        );
    });

    // corners stay at the base tiling; the horizontally stretched top
    // edge and center repeat by their 5x stretch ratio
    assert_eq!(canvas.rrect_params[0].tiling, 1.0);
    assert_eq!(canvas.rrect_params[1].tiling, 5.0);
    assert_eq!(canvas.rrect_params[4].tiling, 5.0);
    assert_eq!(canvas.rrect_params[8].tiling, 1.0);
}

#[test]
#[should_panic(expected = "uv rect per region")]
fn test_nine_slice_requires_nine_uvs() {
    let mut canvas = Canvas::new();
    canvas.begin_recording(Vec2::new(64.0, 64.0));
    canvas.nine_slice(&ShapeDesc::default(), ScaleMode::Stretch, &[Vec4::ZERO]);
}

#[test]
fn test_blur_flushes_and_blits() {
    let (canvas, commands) = render(|canvas| {
        canvas.rect(&shape(
            Vec2::new(100.0, 100.0),
            Vec2::new(50.0, 50.0),
            red(),
        ));
        canvas.blur(CRect::new(Vec2::new(100.0, 100.0), Vec2::new(64.0, 64.0)), 3);
        canvas.rect(&shape(
            Vec2::new(100.0, 100.0),
            Vec2::new(50.0, 50.0),
            blue(),
        ));
    });

    assert_eq!(canvas.passes.len(), 3);
    assert_eq!(canvas.passes[1].name, "Blur");

    // downsample + 3 ping-pong passes + write-back
    let blits = commands
        .iter()
        .filter(|c| matches!(c, Command::BlitImage { .. }))
        .count();
    assert_eq!(blits, 5);
}

#[test]
fn test_custom_pass_runs_and_drops_on_reset() {
    struct Tracked(Arc<AtomicU32>);
    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicU32::new(0));
    let runs = Arc::new(AtomicU32::new(0));

    {
        let device = Arc::new(HeadlessDevice::new(2));
        let mut gpu = GpuContext::new(device, false, 2, Vec2U::new(64, 64)).unwrap();
        let mut canvas = Canvas::new();
        let mut renderer = Renderer::new(2);

        canvas.begin_recording(Vec2::new(64.0, 64.0));
        let tracked = Tracked(drops.clone());
        let counter = runs.clone();
        canvas.add_pass("Custom", move |_ctx| {
            let _ = &tracked;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        renderer.begin_frame(&mut gpu, &mut canvas, None).unwrap();
        let target = Renderer::screen_target(&gpu);
        renderer.render_frame(&gpu, &canvas, &target);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        // the next recording reclaims the frame arena and drops the
        // closure environment exactly once
        canvas.begin_recording(Vec2::new(64.0, 64.0));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_passes_count_transitions_plus_explicit() {
    // property 1: passes == distinct (type, clip) transitions + explicit
    let (canvas, _) = render(|canvas| {
        let desc = shape(Vec2::ZERO, Vec2::new(10.0, 10.0), red());
        canvas.rect(&desc); // batch 1 (rrect, infinite clip)
        canvas.rect(&desc);
        canvas.brect(&desc); // batch 2 (ngon)
        canvas.clip(CRect::new(Vec2::ZERO, Vec2::new(5.0, 5.0)));
        canvas.brect(&desc); // batch 3 (ngon, new clip)
        canvas.blur(CRect::new(Vec2::ZERO, Vec2::new(5.0, 5.0)), 1); // explicit
        canvas.rect(&desc); // batch 4
    });

    assert_eq!(canvas.passes.len(), 5);
}

#[test]
fn test_begin_recording_resets_everything() {
    let device = Arc::new(HeadlessDevice::new(2));
    let _gpu = GpuContext::new(device, false, 2, Vec2U::new(64, 64)).unwrap();
    let mut canvas = Canvas::new();

    canvas.begin_recording(Vec2::new(800.0, 600.0));
    canvas.rect(&shape(Vec2::ZERO, Vec2::new(10.0, 10.0), red()));
    canvas.end_recording();
    assert_eq!(canvas.passes.len(), 1);
    assert!((canvas.viewport_aspect_ratio - 800.0 / 600.0).abs() < 1e-6);

    canvas.begin_recording(Vec2::new(0.0, 100.0));
    assert!(canvas.passes.is_empty());
    assert!(canvas.rrect_params.is_empty());
    // degenerate viewport falls back to unit aspect
    assert_eq!(canvas.viewport_aspect_ratio, 1.0);
}

#[test]
fn test_end_recording_is_idempotent() {
    let (mut canvas, _) = render(|canvas| {
        canvas.rect(&shape(Vec2::ZERO, Vec2::new(10.0, 10.0), red()));
    });
    let passes = canvas.passes.len();
    canvas.end_recording();
    assert_eq!(canvas.passes.len(), passes);
}
