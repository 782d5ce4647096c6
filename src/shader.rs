//! Fragment stage: turns the fragment buffer into framebuffer colors, one pixel per work item.

use std::sync::Arc;

use nalgebra as na;
use na::{Vector2, Vector3};

use crate::config::{RenderConfig, Texturing};
use crate::error::PipelineError;
use crate::pipeline::buffers::{Coverage, Fragment, FrameTargets};
use crate::pipeline::workers::Workers;
use crate::scene::Texture;
use crate::util::clamp_color;

/// Frame constants of the fragment stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingParams {
    pub texturing: Texturing,
    pub base_color: Vector3<f32>,
    pub light_position: Vector3<f32>, // Eye space.
    pub light_intensity: f32,
    pub clear_color: Vector3<f32>,
}

impl ShadingParams {
    pub fn from_config(config: &RenderConfig) -> Self {
        let shading = &config.shading;
        return Self {
            texturing: config.texturing,
            base_color: Vector3::from(shading.base_color),
            light_position: Vector3::from(shading.light_position),
            light_intensity: shading.light_intensity,
            clear_color: Vector3::from(shading.clear_color),
        };
    }
}

/// Two sided Lambert term of a single point light.
pub fn lambert(params: &ShadingParams, eye_position: Vector3<f32>, eye_normal: Vector3<f32>) -> Vector3<f32> {
    let normal = eye_normal.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);
    let light_direction = (eye_position - params.light_position)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vector3::zeros);
    let intensity = params.light_intensity * normal.dot(&light_direction).abs();
    return clamp_color(params.base_color * intensity);
}

/// Texel containing (u * width, v * height), channels in [0, 1].
pub fn sample_nearest(texture: &Texture, uv: Vector2<f32>) -> Vector3<f32> {
    let x = (uv.x * texture.width() as f32).floor() as i64;
    let y = (uv.y * texture.height() as f32).floor() as i64;
    return texture.texel(x, y) / 255.0;
}

/// Blend of the four texels around (u * width, v * height) weighted by the fractional offset,
/// channels in [0, 1]. Neighbors past the last row or column repeat the edge texel.
pub fn sample_bilinear(texture: &Texture, uv: Vector2<f32>) -> Vector3<f32> {
    let px = uv.x * texture.width() as f32;
    let py = uv.y * texture.height() as f32;
    let (x0, y0) = (px.floor(), py.floor());
    let (fx, fy) = (px - x0, py - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let top = texture.texel(x0, y0) * (1.0 - fx) + texture.texel(x0 + 1, y0) * fx;
    let bottom = texture.texel(x0, y0 + 1) * (1.0 - fx) + texture.texel(x0 + 1, y0 + 1) * fx;
    return (top * (1.0 - fy) + bottom * fy) / 255.0;
}

/// Final color of one fragment.
pub fn shade_fragment(fragment: &Fragment, textures: &[Texture], params: &ShadingParams) -> Vector3<f32> {
    match fragment.coverage {
        Coverage::Empty => return params.clear_color,
        Coverage::Marker => return clamp_color(fragment.color),
        Coverage::Surface => {}
    }

    let texture = fragment.texture.and_then(|id| textures.get(id.0));
    let color = match (params.texturing, texture) {
        (Texturing::Nearest, Some(texture)) => sample_nearest(texture, fragment.texcoord),
        (Texturing::Bilinear, Some(texture)) => sample_bilinear(texture, fragment.texcoord),
        _ => lambert(params, fragment.eye_position, fragment.eye_normal),
    };
    return clamp_color(color);
}

/// Shades every pixel of the frame targets into `output`.
pub fn run(
    workers: &Workers,
    targets: &Arc<FrameTargets>,
    textures: &Arc<[Texture]>,
    params: ShadingParams,
    output: &mut [Vector3<f32>],
) -> Result<(), PipelineError> {
    let targets = Arc::clone(targets);
    let textures = Arc::clone(textures);
    return workers.map_into("shading", output, move |index| shade_fragment(&targets.fragment(index), &textures, &params));
}
