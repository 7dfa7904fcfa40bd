//! Path tessellation.
//!
//! Vertex generators append 2D points in [-1, +1] object space to a caller
//! owned vertex list; triangulators append into an index list. Nothing here
//! overwrites earlier output, so generators compose into one shared mesh.
//!
//! Every generator silently no-ops on under-specified input (too few
//! segments or points); callers are responsible for sensible segment
//! counts.

use std::f32::consts::PI;

use vellum_core::{bezier, cubic_bezier, rotor, Vec2, Vec4};

/// Append the 4 corners of the unit rect, counter-clockwise.
pub fn rect(vtx: &mut Vec<Vec2>) {
    vtx.extend_from_slice(&[
        Vec2::new(-1.0, -1.0),
        Vec2::new(1.0, -1.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(-1.0, 1.0),
    ]);
}

/// Append `segments` points on the unit circle from `start` to `stop`
/// radians. No-op below 2 segments.
pub fn arc(vtx: &mut Vec<Vec2>, start: f32, stop: f32, segments: u32) {
    if segments < 2 {
        return;
    }

    let step = (stop - start) / (segments - 1) as f32;
    for i in 0..segments {
        vtx.push(rotor(start + i as f32 * step));
    }
}

/// Append `segments` samples of the unit circle. No-op below 4 segments.
pub fn circle(vtx: &mut Vec<Vec2>, segments: u32) {
    if segments < 4 {
        return;
    }

    let step = (2.0 * PI) / (segments - 1) as f32;
    for i in 0..segments {
        vtx.push(rotor(i as f32 * step));
    }
}

/// Append a squircle outline: four cubic Bézier quadrants whose tangent
/// handles scale with `elasticity` in [0, 1]. No-op below 128 segments.
pub fn squircle(vtx: &mut Vec<Vec2>, elasticity: f32, segments: u32) {
    if segments < 128 {
        return;
    }

    let e = elasticity.clamp(0.0, 1.0);
    let quadrant = segments >> 2;

    cubic_bezier_path(
        vtx,
        Vec2::new(0.0, -1.0),
        Vec2::new(e, -1.0),
        Vec2::new(1.0, -1.0),
        Vec2::new(1.0, 0.0),
        quadrant,
    );
    cubic_bezier_path(
        vtx,
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, e),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
        quadrant,
    );
    cubic_bezier_path(
        vtx,
        Vec2::new(0.0, 1.0),
        Vec2::new(-e, 1.0),
        Vec2::new(-1.0, 1.0),
        Vec2::new(-1.0, 0.0),
        quadrant,
    );
    cubic_bezier_path(
        vtx,
        Vec2::new(-1.0, 0.0),
        Vec2::new(-1.0, -e),
        Vec2::new(-1.0, -1.0),
        Vec2::new(0.0, -1.0),
        quadrant,
    );
}

/// Double the radii into the [-1, +1] object space and clamp so adjacent
/// radii never exceed the remaining edge length.
fn clamp_chain(radii: Vec4, z_edge: f32, w_edge: f32) -> Vec4 {
    let mut r = radii * 2.0;
    r.x = r.x.min(2.0);
    r.y = r.y.min(2.0);
    r.z = r.z.min(2.0);
    r.w = r.w.min(2.0);

    r.y = r.y.min(2.0 - r.x);
    let max_z = (2.0 - r.x).min(z_edge - r.y);
    r.z = r.z.min(max_z);
    let max_w = max_z.min(w_edge - r.z);
    r.w = r.w.min(max_w);
    r
}

/// Append a rounded-rect outline with per-corner radii. Radii are doubled
/// then clamp-chained against the edges. No-op below 8 segments.
pub fn rrect(vtx: &mut Vec<Vec2>, corner_radii: Vec4, segments: u32) {
    if segments < 8 {
        return;
    }

    let radii = clamp_chain(corner_radii, 1.0, 1.0);

    let curve_segments = (segments - 8) / 4;
    let step = if curve_segments == 0 {
        0.0
    } else {
        (PI / 2.0) / curve_segments as f32
    };

    vtx.push(Vec2::new(1.0, 1.0 - radii.z));
    for s in 0..curve_segments {
        vtx.push(Vec2::splat(1.0 - radii.z) + rotor(s as f32 * step) * radii.z);
    }
    vtx.push(Vec2::new(1.0 - radii.z, 1.0));

    vtx.push(Vec2::new(-1.0 + radii.w, 1.0));
    for s in 0..curve_segments {
        vtx.push(
            Vec2::new(-1.0 + radii.w, 1.0 - radii.w)
                + rotor(PI / 2.0 + s as f32 * step) * radii.w,
        );
    }
    vtx.push(Vec2::new(-1.0, 1.0 - radii.w));

    vtx.push(Vec2::new(-1.0, -1.0 + radii.x));
    for s in 0..curve_segments {
        vtx.push(Vec2::splat(-1.0 + radii.x) + rotor(PI + s as f32 * step) * radii.x);
    }
    vtx.push(Vec2::new(-1.0 + radii.x, -1.0));

    vtx.push(Vec2::new(1.0 - radii.y, -1.0));
    for s in 0..curve_segments {
        vtx.push(
            Vec2::new(1.0 - radii.y, -1.0 + radii.y)
                + rotor(PI * 1.5 + s as f32 * step) * radii.y,
        );
    }
    vtx.push(Vec2::new(1.0, -1.0 + radii.y));
}

/// Append the 8 corners of a beveled rect whose slants are doubled then
/// clamp-chained like `rrect` radii.
pub fn brect(vtx: &mut Vec<Vec2>, slants: Vec4) {
    let s = clamp_chain(slants, 2.0, 2.0);

    vtx.extend_from_slice(&[
        Vec2::new(-1.0 + s.x, -1.0),
        Vec2::new(1.0 - s.y, -1.0),
        Vec2::new(1.0, -1.0 + s.y),
        Vec2::new(1.0, 1.0 - s.z),
        Vec2::new(1.0 - s.z, 1.0),
        Vec2::new(-1.0 + s.w, 1.0),
        Vec2::new(-1.0, 1.0 - s.w),
        Vec2::new(-1.0, -1.0 + s.x),
    ]);
}

/// Append `segments` samples of a quadratic Bézier. No-op below 3 segments.
pub fn bezier_path(vtx: &mut Vec<Vec2>, cp0: Vec2, cp1: Vec2, cp2: Vec2, segments: u32) {
    if segments < 3 {
        return;
    }

    let step = 1.0 / (segments - 1) as f32;
    for i in 0..segments {
        let t = i as f32 * step;
        vtx.push(Vec2::new(
            bezier(cp0.x, cp1.x, cp2.x, t),
            bezier(cp0.y, cp1.y, cp2.y, t),
        ));
    }
}

/// Append `segments` samples of a cubic Bézier. No-op below 4 segments.
pub fn cubic_bezier_path(
    vtx: &mut Vec<Vec2>,
    cp0: Vec2,
    cp1: Vec2,
    cp2: Vec2,
    cp3: Vec2,
    segments: u32,
) {
    if segments < 4 {
        return;
    }

    let step = 1.0 / (segments - 1) as f32;
    for i in 0..segments {
        let t = i as f32 * step;
        vtx.push(Vec2::new(
            cubic_bezier(cp0.x, cp1.x, cp2.x, cp3.x, t),
            cubic_bezier(cp0.y, cp1.y, cp2.y, cp3.y, t),
        ));
    }
}

/// Append `segments` samples of a centripetal Catmull-Rom spline through
/// the control points. No-op below 4 segments.
pub fn catmull_rom(
    vtx: &mut Vec<Vec2>,
    cp0: Vec2,
    cp1: Vec2,
    cp2: Vec2,
    cp3: Vec2,
    segments: u32,
) {
    if segments < 4 {
        return;
    }

    let step = 1.0 / (segments - 1) as f32;
    for i in 0..segments {
        let t = i as f32 * step;
        let t2 = t * t;
        let t3 = t2 * t;
        let x = 0.5
            * ((2.0 * cp1.x)
                + (-cp0.x + cp2.x) * t
                + (2.0 * cp0.x - 5.0 * cp1.x + 4.0 * cp2.x - cp3.x) * t2
                + (-cp0.x + 3.0 * cp1.x - 3.0 * cp2.x + cp3.x) * t3);
        let y = 0.5
            * ((2.0 * cp1.y)
                + (-cp0.y + cp2.y) * t
                + (2.0 * cp0.y - 5.0 * cp1.y + 4.0 * cp2.y - cp3.y) * t2
                + (-cp0.y + 3.0 * cp1.y - 3.0 * cp2.y + cp3.y) * t3);
        vtx.push(Vec2::new(x, y));
    }
}

/// Fan-triangulate a convex outline of `num_vertices` points starting at
/// `first_vertex`: appends `3 * (num_vertices - 2)` indices. No-op below 3
/// vertices.
pub fn triangulate_convex(idx: &mut Vec<u32>, first_vertex: u32, num_vertices: u32) {
    if num_vertices < 3 {
        return;
    }

    for v in 1..num_vertices - 1 {
        idx.push(first_vertex);
        idx.push(first_vertex + v);
        idx.push(first_vertex + v + 1);
    }
}

/// Generate indices for an already-appended non-indexed triangle list.
pub fn triangles(idx: &mut Vec<u32>, first_vertex: u32, num_vertices: u32) {
    let num_triangles = num_vertices / 3;
    for i in 0..num_triangles * 3 {
        idx.push(first_vertex + i);
    }
}

/// Triangulate a stroked polyline of width `thickness`.
///
/// Each segment becomes a quad of 4 vertices and 6 indices; consecutive
/// quads are stitched with two bridging triangles so the stroke stays
/// watertight through joints. Winding follows the up/down offsets computed
/// from the segment normal. No-op below 2 points.
pub fn triangulate_stroke(
    points: &[Vec2],
    vtx: &mut Vec<Vec2>,
    idx: &mut Vec<u32>,
    thickness: f32,
) {
    if points.len() < 2 {
        return;
    }

    let first_vertex = vtx.len() as u32;
    let mut ivtx = first_vertex;

    for i in 0..points.len() - 1 {
        let p0 = points[i];
        let p1 = points[i + 1];
        let d = p1 - p0;
        let alpha = d.y.atan2(d.x) + PI / 2.0;

        let up = rotor(alpha) * (thickness / 2.0);
        let down = -up;

        vtx.push(p0 + up);
        vtx.push(p0 + down);
        vtx.push(p1 + up);
        vtx.push(p1 + down);

        idx.extend_from_slice(&[ivtx, ivtx + 1, ivtx + 3, ivtx, ivtx + 3, ivtx + 2]);

        if i != 0 {
            let prev = ivtx - 2;
            idx.extend_from_slice(&[prev, prev + 1, ivtx + 1, prev, prev + 1, ivtx]);
        }

        ivtx += 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_corners() {
        let mut vtx = Vec::new();
        rect(&mut vtx);
        assert_eq!(vtx.len(), 4);
        assert_eq!(vtx[0], Vec2::new(-1.0, -1.0));
        assert_eq!(vtx[2], Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_generators_no_op_when_underspecified() {
        let mut vtx = Vec::new();
        arc(&mut vtx, 0.0, PI, 1);
        circle(&mut vtx, 3);
        squircle(&mut vtx, 0.5, 127);
        rrect(&mut vtx, Vec4::splat(0.5), 7);
        bezier_path(&mut vtx, Vec2::ZERO, Vec2::ONE, Vec2::ZERO, 2);
        cubic_bezier_path(&mut vtx, Vec2::ZERO, Vec2::ONE, Vec2::ZERO, Vec2::ONE, 3);
        catmull_rom(&mut vtx, Vec2::ZERO, Vec2::ONE, Vec2::ZERO, Vec2::ONE, 3);
        assert!(vtx.is_empty());

        let mut idx = Vec::new();
        triangulate_stroke(&[Vec2::ZERO], &mut vtx, &mut idx, 0.1);
        triangulate_convex(&mut idx, 0, 2);
        assert!(vtx.is_empty() && idx.is_empty());
    }

    #[test]
    fn test_arc_on_unit_circle() {
        let mut vtx = Vec::new();
        arc(&mut vtx, 0.0, PI / 2.0, 3);
        assert_eq!(vtx.len(), 3);

        // endpoints land on the known angles, midpoint at 45 degrees
        assert!((vtx[0].x - 1.0).abs() < 1e-5 && vtx[0].y.abs() < 1e-5);
        let inv_sqrt2 = std::f32::consts::FRAC_1_SQRT_2;
        assert!((vtx[1].x - inv_sqrt2).abs() < 1e-5 && (vtx[1].y - inv_sqrt2).abs() < 1e-5);
        assert!(vtx[2].x.abs() < 1e-5 && (vtx[2].y - 1.0).abs() < 1e-5);

        for p in vtx {
            let radius = (p.x * p.x + p.y * p.y).sqrt();
            assert!((radius - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_circle_on_unit_circle() {
        let mut vtx = Vec::new();
        circle(&mut vtx, 32);
        assert_eq!(vtx.len(), 32);
        for p in vtx {
            let radius = (p.x * p.x + p.y * p.y).sqrt();
            assert!((radius - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rrect_emits_requested_count() {
        let mut vtx = Vec::new();
        rrect(&mut vtx, Vec4::splat(0.25), 32);
        // 4 corners x ((32 - 8) / 4 arc samples + 2 endpoints)
        assert_eq!(vtx.len(), 4 * ((32 - 8) / 4 + 2) as usize);
        for p in &vtx {
            assert!(p.x >= -1.0 - 1e-5 && p.x <= 1.0 + 1e-5);
            assert!(p.y >= -1.0 - 1e-5 && p.y <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn test_rrect_clamp_chain_bounds_edges() {
        // oversized radii must clamp so no edge's radii pair sums past 2
        let radii = clamp_chain(Vec4::new(5.0, 5.0, 5.0, 5.0), 1.0, 1.0);
        assert!(radii.x + radii.y <= 2.0 + 1e-6);
        assert!(radii.x >= 0.0 && radii.y >= 0.0 && radii.z >= 0.0 && radii.w >= 0.0);
    }

    #[test]
    fn test_brect_emits_eight() {
        let mut vtx = Vec::new();
        brect(&mut vtx, Vec4::splat(0.2));
        assert_eq!(vtx.len(), 8);
    }

    #[test]
    fn test_squircle_quadrants() {
        let mut vtx = Vec::new();
        squircle(&mut vtx, 1.0, 128);
        assert_eq!(vtx.len(), 4 * (128 >> 2) as usize);
    }

    #[test]
    fn test_triangulate_convex_count() {
        let mut idx = Vec::new();
        triangulate_convex(&mut idx, 10, 6);
        assert_eq!(idx.len(), 3 * (6 - 2));
        assert_eq!(&idx[..3], &[10, 11, 12]);
        assert_eq!(&idx[9..], &[10, 14, 15]);
    }

    #[test]
    fn test_triangulate_stroke_counts() {
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 1.0),
        ];
        let mut vtx = Vec::new();
        let mut idx = Vec::new();
        triangulate_stroke(&points, &mut vtx, &mut idx, 0.2);
        let n = points.len() as u32;
        assert_eq!(vtx.len() as u32, 4 * (n - 1));
        assert_eq!(idx.len() as u32, 6 * (n - 1) + 6 * (n - 2));
    }

    #[test]
    fn test_stroke_quad_width() {
        let points = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)];
        let mut vtx = Vec::new();
        let mut idx = Vec::new();
        triangulate_stroke(&points, &mut vtx, &mut idx, 2.0);
        // horizontal segment: up/down offsets are vertical, half thickness
        assert!((vtx[0].y - 1.0).abs() < 1e-5 || (vtx[0].y + 1.0).abs() < 1e-5);
        assert!((vtx[0].y + vtx[1].y).abs() < 1e-5);
    }

    #[test]
    fn test_appends_never_overwrite() {
        let mut vtx = Vec::new();
        rect(&mut vtx);
        let before = vtx.clone();
        circle(&mut vtx, 8);
        assert_eq!(&vtx[..4], &before[..]);
        assert_eq!(vtx.len(), 12);
    }
}
