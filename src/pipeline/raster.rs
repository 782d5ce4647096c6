//! Rasterization stage: every primitive is scanned independently and writes into the shared
//! frame targets. The draw mode picks one path for the whole frame: depth tested triangles, or
//! line or point markers without depth test. Primitives the mode has no path for are skipped.

use std::ops::Add;
use std::sync::Arc;

use nalgebra as na;
use na::{vector, Vector2, Vector3};

use super::assembly::Primitive;
use super::buffers::{encode_depth, Coverage, Fragment, FrameTargets};
use super::vertex::TransformedVertex;
use super::workers::Workers;
use crate::config::{DrawMode, RenderConfig};
use crate::error::PipelineError;
use crate::util::{interpolate2, interpolate3};

/// Triangles with a smaller doubled screen area have no coverage.
const DEGENERATE_AREA: f32 = 1e-6;
/// Lines are only drawn if both endpoints are within this many framebuffer sizes of the screen.
const LINE_GUARD_BAND: f32 = 8.0;

/// Rasterization switches taken from the render config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterSettings {
    pub draw_mode: DrawMode,
    pub backface_cull: bool,
    pub perspective_correct: bool,
    pub pixel_locking: bool,
    pub marker_color: Vector3<f32>,
}

impl RasterSettings {
    pub fn from_config(config: &RenderConfig) -> Self {
        return Self {
            draw_mode: config.draw_mode,
            backface_cull: config.backface_cull,
            perspective_correct: config.perspective_correct,
            pixel_locking: config.pixel_locking,
            marker_color: Vector3::from(config.shading.marker_color),
        };
    }
}

/// Counters of one rasterization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterStats {
    pub culled: usize,
    /// Primitives the draw mode doesn't draw, like points and lines in triangle mode.
    pub skipped: usize,
    /// Fragment writes, including ones later overwritten by nearer primitives.
    pub fragments_written: usize,
}

impl Add for RasterStats {
    type Output = RasterStats;

    fn add(self, other: RasterStats) -> RasterStats {
        return RasterStats {
            culled: self.culled + other.culled,
            skipped: self.skipped + other.skipped,
            fragments_written: self.fragments_written + other.fragments_written,
        };
    }
}

/// Inclusive integer pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BoundingBox {
    /// Floor of the minimum and ceil of the maximum of the vertex positions. None if any
    /// coordinate is not finite.
    pub fn of_triangle(points: &[Vector2<f32>; 3]) -> Option<Self> {
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return None;
        }
        let min_x = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_x = points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        // `as` saturates, huge boxes are cut down by `clamp_to`.
        return Some(Self {
            min_x: min_x.floor() as i32,
            min_y: min_y.floor() as i32,
            max_x: max_x.ceil() as i32,
            max_y: max_y.ceil() as i32,
        });
    }

    /// Intersection with the framebuffer, None if they don't overlap.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        let clamped = Self {
            min_x: self.min_x.max(0),
            min_y: self.min_y.max(0),
            max_x: self.max_x.min(width as i32 - 1),
            max_y: self.max_y.min(height as i32 - 1),
        };
        if clamped.min_x > clamped.max_x || clamped.min_y > clamped.max_y {
            return None;
        }
        return Some(clamped);
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        return x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y;
    }
}

fn edge_ordered(a: Vector2<f32>, b: Vector2<f32>, p: Vector2<f32>) -> f32 {
    return (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
}

/// Edge function of `p` against the directed edge a -> b. Evaluated with the endpoints in a fixed
/// order, so two triangles sharing an edge get exactly opposite values and a pixel near the edge
/// can't fall between them.
fn edge(a: Vector2<f32>, b: Vector2<f32>, p: Vector2<f32>) -> f32 {
    if (a.x, a.y) > (b.x, b.y) {
        return -edge_ordered(b, a, p);
    }
    return edge_ordered(a, b, p);
}

/// Barycentric coordinates of `p`. None for degenerate triangles.
pub fn barycentric(points: &[Vector2<f32>; 3], p: Vector2<f32>) -> Option<Vector3<f32>> {
    let [a, b, c] = *points;
    let area = edge(a, b, c);
    if !(area.abs() > DEGENERATE_AREA) {
        return None;
    }
    return Some(vector![edge(b, c, p) / area, edge(c, a, p) / area, edge(a, b, p) / area]);
}

/// Sample point of pixel (x, y), pixel i spans [i, i + 1) on screen.
pub fn pixel_center(x: i32, y: i32) -> Vector2<f32> {
    return vector![x as f32 + 0.5, y as f32 + 0.5];
}

/// Barycentric coordinates of the center of pixel (x, y) if it is covered. Centers on an edge
/// count as inside.
pub fn coverage(points: &[Vector2<f32>; 3], x: i32, y: i32) -> Option<Vector3<f32>> {
    let weights = barycentric(points, pixel_center(x, y))?;
    if weights.x < 0.0 || weights.y < 0.0 || weights.z < 0.0 {
        return None;
    }
    return Some(weights);
}

/// Screen depth is affine in screen space, so it interpolates with the plain weights.
pub fn interpolate_depth(triangle: &[TransformedVertex; 3], weights: Vector3<f32>) -> f32 {
    return weights.x * triangle[0].screen.z + weights.y * triangle[1].screen.z + weights.z * triangle[2].screen.z;
}

/// A triangle faces away from the eye if its first normal points along the view ray.
pub fn should_cull(triangle: &[TransformedVertex; 3]) -> bool {
    return triangle[0].eye_position.dot(&triangle[0].eye_normal) >= 0.0;
}

/// Screen space weights divided by each vertex's eye depth and renormalized. Falls back to the
/// screen space weights when the vertex depths give no usable sum.
pub fn perspective_weights(triangle: &[TransformedVertex; 3], weights: Vector3<f32>) -> Vector3<f32> {
    let adjusted = vector![
        weights.x / triangle[0].eye_position.z,
        weights.y / triangle[1].eye_position.z,
        weights.z / triangle[2].eye_position.z
    ];
    let sum = adjusted.x + adjusted.y + adjusted.z;
    if !sum.is_finite() || sum.abs() < f32::EPSILON || adjusted.iter().any(|w| !w.is_finite()) {
        return weights;
    }
    return adjusted / sum;
}

fn screen_points(triangle: &[TransformedVertex; 3]) -> [Vector2<f32>; 3] {
    return [triangle[0].screen.xy(), triangle[1].screen.xy(), triangle[2].screen.xy()];
}

/// Scans the bounding box of a triangle and depth tests every covered pixel. Returns the number
/// of fragments written.
pub fn rasterize_triangle(
    targets: &FrameTargets,
    triangle: &[TransformedVertex; 3],
    primitive: u32,
    settings: &RasterSettings,
) -> usize {
    let points = screen_points(triangle);
    let bbox = match BoundingBox::of_triangle(&points).and_then(|b| b.clamp_to(targets.width(), targets.height())) {
        Some(bbox) => bbox,
        None => return 0,
    };

    let mut written = 0;
    for y in bbox.min_y..=bbox.max_y {
        for x in bbox.min_x..=bbox.max_x {
            let index = match targets.index(x, y) {
                Some(index) => index,
                None => continue,
            };
            let weights = match coverage(&points, x, y) {
                Some(weights) => weights,
                None => continue,
            };
            let depth = interpolate_depth(triangle, weights);
            // Outside of the near and far planes.
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }

            let attribute_weights = if settings.perspective_correct {
                perspective_weights(triangle, weights)
            } else {
                weights
            };
            let [a, b, c] = triangle;
            let fragment = Fragment {
                coverage: Coverage::Surface,
                color: Vector3::zeros(),
                eye_position: interpolate3(attribute_weights, a.eye_position, b.eye_position, c.eye_position),
                eye_normal: interpolate3(attribute_weights, a.eye_normal, b.eye_normal, c.eye_normal),
                texcoord: interpolate2(attribute_weights, a.texcoord, b.texcoord, c.texcoord),
                texture: a.texture,
                primitive,
            };
            if targets.write_depth_tested(index, encode_depth(depth), primitive, fragment, settings.pixel_locking) {
                written += 1;
            }
        }
    }
    return written;
}

fn marker(primitive: u32, settings: &RasterSettings) -> Fragment {
    return Fragment {
        coverage: Coverage::Marker,
        color: settings.marker_color,
        primitive,
        ..Default::default()
    };
}

/// Marker at the rounded screen position of a vertex.
pub fn rasterize_point(targets: &FrameTargets, vertex: &TransformedVertex, primitive: u32, settings: &RasterSettings) -> usize {
    let (x, y) = (vertex.screen.x.round(), vertex.screen.y.round());
    if !x.is_finite() || !y.is_finite() {
        return 0;
    }
    return match targets.index(x as i32, y as i32) {
        Some(index) => targets.write_marker(index, marker(primitive, settings)) as usize,
        None => 0,
    };
}

/// Bresenham line between the rounded screen positions of two vertices, as presented in
/// https://en.wikipedia.org/wiki/Bresenham%27s_line_algorithm
/// Pixels off the framebuffer are skipped, lines reaching far off screen aren't drawn at all.
pub fn rasterize_line(targets: &FrameTargets, a: &TransformedVertex, b: &TransformedVertex, primitive: u32, settings: &RasterSettings) -> usize {
    let limit = LINE_GUARD_BAND * targets.width().max(targets.height()) as f32;
    let in_guard_band = |v: &TransformedVertex| {
        let (x, y) = (v.screen.x.round(), v.screen.y.round());
        return x.is_finite() && y.is_finite() && x.abs() <= limit && y.abs() <= limit;
    };
    if !in_guard_band(a) || !in_guard_band(b) {
        return 0;
    }

    let mut x_0 = a.screen.x.round() as i32;
    let mut y_0 = a.screen.y.round() as i32;
    let x_1 = b.screen.x.round() as i32;
    let y_1 = b.screen.y.round() as i32;
    let dx = (x_1 - x_0).abs();
    let sx = if x_0 < x_1 { 1 } else { -1 };
    let dy = -(y_1 - y_0).abs();
    let sy = if y_0 < y_1 { 1 } else { -1 };
    let mut error = dx + dy;

    let fragment = marker(primitive, settings);
    let mut written = 0;
    loop {
        if let Some(index) = targets.index(x_0, y_0) {
            if targets.write_marker(index, fragment) {
                written += 1;
            }
        }
        if x_0 == x_1 && y_0 == y_1 {
            break;
        }
        let e2 = 2 * error;
        if e2 >= dy {
            error += dy;
            x_0 += sx;
        }
        if e2 <= dx {
            error += dx;
            y_0 += sy;
        }
    }
    return written;
}

/// Rasterizes one primitive according to the draw mode and returns its counters.
///
/// Points mode marks every vertex of every primitive. Lines mode draws lines and triangle
/// outlines. Triangles mode fills triangles only, so every stored fragment went through the
/// depth test.
pub fn rasterize_primitive(targets: &FrameTargets, primitive: &Primitive, index: u32, settings: &RasterSettings) -> RasterStats {
    let mut stats = RasterStats::default();
    match (settings.draw_mode, primitive) {
        (DrawMode::Points, primitive) => {
            for vertex in primitive.vertices() {
                stats.fragments_written += rasterize_point(targets, vertex, index, settings);
            }
        }
        (DrawMode::Lines, Primitive::Line([a, b])) => stats.fragments_written += rasterize_line(targets, a, b, index, settings),
        (DrawMode::Lines, Primitive::Triangle([a, b, c])) => {
            for (from, to) in [(a, b), (b, c), (c, a)] {
                stats.fragments_written += rasterize_line(targets, from, to, index, settings);
            }
        }
        (DrawMode::Triangles, Primitive::Triangle(triangle)) => {
            if settings.backface_cull && should_cull(triangle) {
                stats.culled += 1;
            } else {
                stats.fragments_written += rasterize_triangle(targets, triangle, index, settings);
            }
        }
        (DrawMode::Lines, Primitive::Point(_)) | (DrawMode::Triangles, Primitive::Point(_) | Primitive::Line(_)) => {
            stats.skipped += 1;
        }
    }
    return stats;
}

/// Runs rasterization over the whole primitive array. The position of a primitive in the array
/// is its index for depth tie breaking.
pub fn run(
    workers: &Workers,
    targets: &Arc<FrameTargets>,
    primitives: &Arc<Vec<Primitive>>,
    settings: RasterSettings,
) -> Result<RasterStats, PipelineError> {
    let job_targets = Arc::clone(targets);
    let job_primitives = Arc::clone(primitives);
    let chunks = workers.map_chunks("rasterization", primitives.len(), move |range| {
        let mut stats = RasterStats::default();
        for index in range {
            stats = stats + rasterize_primitive(&job_targets, &job_primitives[index], index as u32, &settings);
        }
        return stats;
    })?;
    return Ok(chunks.into_iter().fold(RasterStats::default(), |total, (_, stats)| total + stats));
}
