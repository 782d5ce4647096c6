//! The rendering pipeline: vertex stage, primitive assembly, rasterization and shading run one
//! after another over a worker pool, each stage finishing completely before the next starts.
//!
//! All per-frame buffers are sized at [`Pipeline::init`] (framebuffer sized) and
//! [`Pipeline::load_scene`] (vertex and primitive counts) and reused every frame.

pub mod assembly;
pub mod buffers;
pub mod raster;
pub mod vertex;
pub mod workers;

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, trace, warn};
use nalgebra as na;
use na::{Matrix4, Point3, Vector3};

use crate::config::RenderConfig;
use crate::error::{PipelineError, SceneError};
use crate::image::Framebuffer;
use crate::scene::{PrimitiveGroup, Scene, Texture};
use crate::shader::{self, ShadingParams};
use crate::util::{look_at, perspective};
use assembly::Primitive;
use buffers::{decode_depth, try_alloc_with, Fragment, FrameTargets};
use raster::{RasterSettings, RasterStats};
use vertex::{TransformedVertex, Uniforms};
use workers::Workers;

/// Per frame camera. Model transforms come with the primitive groups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransforms {
    pub projection: Matrix4<f32>,
    pub view: Matrix4<f32>,
}

impl FrameTransforms {
    pub fn new(projection: Matrix4<f32>, view: Matrix4<f32>) -> Self {
        return Self { projection, view };
    }

    /// Perspective camera at `eye` looking at `target`.
    pub fn look_at(
        eye: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fovy: f32,
        aspect: f32,
        znear: f32,
        zfar: f32,
    ) -> Self {
        return Self::new(perspective(aspect, fovy, znear, zfar), look_at(eye, target, up));
    }
}

/// Outcome of a scene load.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneReport {
    pub loaded_groups: usize,
    pub skipped_groups: Vec<(String, SceneError)>,
    pub vertices: usize,
    pub primitives: usize,
}

struct GroupState {
    group: PrimitiveGroup,
    primitive_base: usize, // Offset of the group's first primitive in the global primitive array.
    transformed: Arc<Vec<TransformedVertex>>,
}

struct LoadedScene {
    groups: Vec<GroupState>,
    textures: Arc<[Texture]>,
    primitives: Arc<Vec<Primitive>>,
}

pub struct Pipeline {
    width: u32,
    height: u32,
    config: RenderConfig,
    workers: Workers,
    targets: Arc<FrameTargets>,
    framebuffer: Framebuffer,
    scene: Option<LoadedScene>,
}

impl Pipeline {
    /// Allocates the frame buffers and starts the worker pool.
    pub fn init(width: u32, height: u32, config: RenderConfig) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(PipelineError::InvalidResolution { width, height });
        }
        let targets = Arc::new(FrameTargets::new(width, height)?);
        let framebuffer = Framebuffer::new(width, height)?;
        let workers = Workers::new(config.worker_threads);
        info!(
            "Pipeline initialized: {}x{}, {} workers, draw mode {}, texturing {}",
            width,
            height,
            workers.thread_count(),
            config.draw_mode,
            config.texturing
        );
        return Ok(Self { width, height, config, workers, targets, framebuffer, scene: None });
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    pub fn config(&self) -> &RenderConfig {
        return &self.config;
    }

    /// Swaps the configuration, effective from the next frame.
    pub fn set_config(&mut self, config: RenderConfig) {
        if config.worker_threads != self.config.worker_threads {
            self.workers.join();
            self.workers = Workers::new(config.worker_threads);
        }
        self.config = config;
    }

    /// Replaces the loaded scene. Malformed groups are skipped and listed in the report; buffer
    /// allocation failure fails the whole load and leaves no scene loaded.
    pub fn load_scene(&mut self, scene: &Scene) -> Result<SceneReport, PipelineError> {
        self.scene = None;
        let mut report = SceneReport::default();
        let mut groups = Vec::with_capacity(scene.groups.len());
        let mut primitive_count = 0;

        for group in &scene.groups {
            if let Err(err) = group.validate(scene.textures.len()) {
                warn!("Skipping primitive group '{}': {}", group.name, err);
                report.skipped_groups.push((group.name.clone(), err));
                continue;
            }
            let transformed = try_alloc_with("transformed vertex buffer", group.vertices.len(), TransformedVertex::default)?;
            groups.push(GroupState {
                group: group.clone(),
                primitive_base: primitive_count,
                transformed: Arc::new(transformed),
            });
            primitive_count += group.primitive_count();
            report.vertices += group.vertices.len();
        }

        // Primitive indices are packed into the low half of the depth words.
        if primitive_count > u32::MAX as usize {
            return Err(PipelineError::AllocationFailed { what: "primitive buffer", len: primitive_count });
        }
        let primitives = try_alloc_with("primitive buffer", primitive_count, Primitive::default)?;

        report.loaded_groups = groups.len();
        report.primitives = primitive_count;
        info!(
            "Scene loaded: {} groups ({} skipped), {} vertices, {} primitives, {} textures",
            report.loaded_groups,
            report.skipped_groups.len(),
            report.vertices,
            report.primitives,
            scene.textures.len()
        );
        self.scene = Some(LoadedScene {
            groups,
            textures: scene.textures.clone().into(),
            primitives: Arc::new(primitives),
        });
        return Ok(report);
    }

    /// Drops the scene and its buffers.
    pub fn unload_scene(&mut self) {
        if self.scene.take().is_some() {
            info!("Scene unloaded");
        }
    }

    pub fn has_scene(&self) -> bool {
        return self.scene.is_some();
    }

    /// Renders one frame of the loaded scene into the framebuffer.
    pub fn render(&mut self, frame: &FrameTransforms) -> Result<RasterStats, PipelineError> {
        let scene = self.scene.as_mut().ok_or(PipelineError::NoScene)?;
        let frame_start = Instant::now();

        let start = Instant::now();
        for state in scene.groups.iter_mut() {
            let uniforms = Uniforms::compose(frame, &state.group.model, self.width, self.height);
            let output = Arc::make_mut(&mut state.transformed);
            vertex::run(&self.workers, &state.group.vertices, uniforms, state.group.texture, output)?;
        }
        trace!("Vertex stage took {:?}", start.elapsed());

        let start = Instant::now();
        let primitives = Arc::make_mut(&mut scene.primitives);
        for state in &scene.groups {
            let range = state.primitive_base..state.primitive_base + state.group.primitive_count();
            assembly::run(&self.workers, state.group.topology, &state.group.indices, &state.transformed, &mut primitives[range])?;
        }
        trace!("Primitive assembly took {:?}", start.elapsed());

        let stats = draw(
            &self.workers,
            &self.targets,
            &mut self.framebuffer,
            &self.config,
            &scene.primitives,
            &scene.textures,
        )?;
        debug!(
            "Frame rendered in {:?}: {} primitives, {} culled, {} skipped, {} fragments",
            frame_start.elapsed(),
            scene.primitives.len(),
            stats.culled,
            stats.skipped,
            stats.fragments_written
        );
        return Ok(stats);
    }

    /// Rasterizes and shades already assembled primitives, skipping the vertex stage and assembly.
    /// Texture handles refer to the loaded scene's texture table, if any.
    pub fn render_primitives(&mut self, primitives: Vec<Primitive>) -> Result<RasterStats, PipelineError> {
        let textures: Arc<[Texture]> = match &self.scene {
            Some(scene) => Arc::clone(&scene.textures),
            None => Vec::<Texture>::new().into(),
        };
        return draw(
            &self.workers,
            &self.targets,
            &mut self.framebuffer,
            &self.config,
            &Arc::new(primitives),
            &textures,
        );
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        return &self.framebuffer;
    }

    /// Writes the last frame as rgba8 into `out`.
    pub fn present(&self, out: &mut Vec<u8>) {
        self.framebuffer.present_rgba8(out);
    }

    /// Fragment stored at a pixel by the last frame.
    pub fn fragment_at(&self, x: u32, y: u32) -> Option<Fragment> {
        let index = self.targets.index(x as i32, y as i32)?;
        return Some(self.targets.fragment(index));
    }

    /// Depth stored at a pixel by the last frame, None where no triangle was drawn.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        let index = self.targets.index(x as i32, y as i32)?;
        return self.targets.depth_at(index).map(decode_depth);
    }

    /// Waits for the workers and releases every buffer.
    pub fn shutdown(mut self) {
        self.unload_scene();
        self.workers.join();
        info!("Pipeline shut down");
    }
}

/// Clear, rasterization and shading over a primitive array.
fn draw(
    workers: &Workers,
    targets: &Arc<FrameTargets>,
    framebuffer: &mut Framebuffer,
    config: &RenderConfig,
    primitives: &Arc<Vec<Primitive>>,
    textures: &Arc<[Texture]>,
) -> Result<RasterStats, PipelineError> {
    let start = Instant::now();
    let clear_targets = Arc::clone(targets);
    workers.map_chunks("clear", targets.len(), move |range| clear_targets.clear_range(range.start, range.end))?;
    trace!("Clear took {:?}", start.elapsed());

    let start = Instant::now();
    let stats = raster::run(workers, targets, primitives, RasterSettings::from_config(config))?;
    trace!("Rasterization took {:?}", start.elapsed());

    let start = Instant::now();
    shader::run(workers, targets, textures, ShadingParams::from_config(config), framebuffer.pixels_mut())?;
    trace!("Shading took {:?}", start.elapsed());

    return Ok(stats);
}
