//! Vertex stage: object space vertices to screen and eye space, one vertex per work item.

use std::sync::Arc;

use nalgebra as na;
use na::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

use super::workers::Workers;
use super::FrameTransforms;
use crate::error::PipelineError;
use crate::scene::{TextureId, Vertex};
use crate::util::{from_hom_point, normal_matrix, to_hom_point};

/// Vertex after the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedVertex {
    /// x, y in pixels (y grows downwards), z depth in [0, 1] with smaller being nearer,
    /// w the clip space w.
    pub screen: Vector4<f32>,
    pub eye_position: Vector3<f32>,
    pub eye_normal: Vector3<f32>,
    pub texcoord: Vector2<f32>,
    pub texture: Option<TextureId>,
}

impl Default for TransformedVertex {
    fn default() -> Self {
        return Self {
            screen: Vector4::zeros(),
            eye_position: Vector3::zeros(),
            eye_normal: Vector3::zeros(),
            texcoord: Vector2::zeros(),
            texture: None,
        };
    }
}

/// Per group constants of the vertex stage.
#[derive(Debug, Clone, Copy)]
pub struct Uniforms {
    pub mvp: Matrix4<f32>,    // Object space to clip space.
    pub mv: Matrix4<f32>,     // Object space to eye space.
    pub normal: Matrix3<f32>, // Inverse transpose of mv's upper 3x3.
    pub width: u32,
    pub height: u32,
}

impl Uniforms {
    /// Composes the frame camera with a group's model transform.
    pub fn compose(frame: &FrameTransforms, model: &Matrix4<f32>, width: u32, height: u32) -> Self {
        let mv = frame.view * model;
        return Self {
            mvp: frame.projection * mv,
            mv,
            normal: normal_matrix(&mv),
            width,
            height,
        };
    }
}

/// Transforms a single vertex. Vertices with clip w close to zero come out with infinite or NaN
/// screen coordinates; the rasterizer skips those.
pub fn transform_vertex(vertex: &Vertex, uniforms: &Uniforms, texture: Option<TextureId>) -> TransformedVertex {
    let position = to_hom_point(vertex.position);
    let clip = uniforms.mvp * position;
    let ndc = from_hom_point(clip);

    // Viewport transform - y is flipped since rows go top to bottom.
    let screen = Vector4::new(
        (ndc.x + 1.0) * 0.5 * uniforms.width as f32,
        (1.0 - ndc.y) * 0.5 * uniforms.height as f32,
        (ndc.z + 1.0) * 0.5,
        clip.w,
    );

    let eye_normal = (uniforms.normal * vertex.normal)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vector3::zeros);

    return TransformedVertex {
        screen,
        eye_position: from_hom_point(uniforms.mv * position),
        eye_normal,
        texcoord: vertex.texcoord,
        texture,
    };
}

/// Runs the vertex stage for one group, writing `output[i]` for every `vertices[i]`.
pub fn run(
    workers: &Workers,
    vertices: &Arc<[Vertex]>,
    uniforms: Uniforms,
    texture: Option<TextureId>,
    output: &mut [TransformedVertex],
) -> Result<(), PipelineError> {
    let vertices = Arc::clone(vertices);
    return workers.map_into("vertex", output, move |i| transform_vertex(&vertices[i], &uniforms, texture));
}

#[cfg(test)]
mod tests {
    use super::*;

    use na::{point, vector};

    use crate::util::{look_at, perspective};

    fn identity_uniforms(width: u32, height: u32) -> Uniforms {
        let frame = FrameTransforms::new(Matrix4::identity(), Matrix4::identity());
        return Uniforms::compose(&frame, &Matrix4::identity(), width, height);
    }

    fn vertex_at(x: f32, y: f32, z: f32) -> Vertex {
        return Vertex::new(vector![x, y, z], vector![0.0, 0.0, 2.0], vector![0.25, 0.75]);
    }

    #[test]
    fn ndc_corners_map_to_pixel_corners_with_y_flipped() {
        let uniforms = identity_uniforms(100, 50);
        let top_left = transform_vertex(&vertex_at(-1.0, 1.0, 0.0), &uniforms, None);
        assert_eq!(top_left.screen.x, 0.0);
        assert_eq!(top_left.screen.y, 0.0);
        let bottom_right = transform_vertex(&vertex_at(1.0, -1.0, 0.0), &uniforms, None);
        assert_eq!(bottom_right.screen.x, 100.0);
        assert_eq!(bottom_right.screen.y, 50.0);
    }

    #[test]
    fn depth_maps_ndc_z_to_unit_range() {
        let uniforms = identity_uniforms(10, 10);
        assert_eq!(transform_vertex(&vertex_at(0.0, 0.0, -1.0), &uniforms, None).screen.z, 0.0);
        assert_eq!(transform_vertex(&vertex_at(0.0, 0.0, 1.0), &uniforms, None).screen.z, 1.0);
    }

    #[test]
    fn nearer_vertices_get_smaller_depth() {
        let frame = FrameTransforms::new(
            perspective(1.0, 1.0, 0.1, 100.0),
            look_at(point![0.0, 0.0, 5.0], point![0.0, 0.0, 0.0], vector![0.0, 1.0, 0.0]),
        );
        let uniforms = Uniforms::compose(&frame, &Matrix4::identity(), 64, 64);
        let near = transform_vertex(&vertex_at(0.0, 0.0, 1.0), &uniforms, None);
        let far = transform_vertex(&vertex_at(0.0, 0.0, -1.0), &uniforms, None);
        assert!(near.screen.z < far.screen.z);
        assert!(near.screen.z > 0.0 && far.screen.z < 1.0);
        assert!((near.eye_position.z + 4.0).abs() < 1e-5);
        assert!((near.screen.w - 4.0).abs() < 1e-5);
    }

    #[test]
    fn attributes_are_carried_and_normal_normalized() {
        let uniforms = identity_uniforms(10, 10);
        let v = transform_vertex(&vertex_at(0.5, 0.5, 0.0), &uniforms, Some(TextureId(2)));
        assert_eq!(v.eye_normal, vector![0.0, 0.0, 1.0]);
        assert_eq!(v.texcoord, vector![0.25, 0.75]);
        assert_eq!(v.texture, Some(TextureId(2)));
    }

    #[test]
    fn stage_transforms_every_vertex() {
        let workers = Workers::new(2);
        let vertices: Arc<[Vertex]> = (0..37).map(|i| vertex_at(i as f32 / 37.0, 0.0, 0.0)).collect::<Vec<_>>().into();
        let mut output = vec![TransformedVertex::default(); vertices.len()];
        let uniforms = identity_uniforms(37, 37);
        run(&workers, &vertices, uniforms, None, &mut output).unwrap();
        for (vertex, transformed) in vertices.iter().zip(&output) {
            assert_eq!(*transformed, transform_vertex(vertex, &uniforms, None));
        }
    }
}
