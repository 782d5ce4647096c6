use std::path::PathBuf;
use std::time;

use anyhow::{bail, Context};
use log::info;
use nalgebra as na;
use na::{point, vector};
use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};

use raster_pipeline::scene::{loader, shapes};
use raster_pipeline::{FrameTransforms, Pipeline, RenderConfig, Scene};

/// Execution context of the binary.
pub struct Params {
    pub width: u32,
    pub height: u32,
    pub print_fps: bool,
    pub headless: bool,
    pub frames: u32,
    pub output: PathBuf,
    pub obj: Option<PathBuf>,
    pub texture: Option<PathBuf>,
    pub config: RenderConfig,
}

/// Helper, defining exit event to be an Escape key press.
fn is_exit_event(window_event: event::WindowEvent) -> bool {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        if event.input.key_code == Some(event::VirtualKeyCode::Escape) && event.input.state.is_released() {
            return true;
        }
    }

    return false;
}

fn build_scene(params: &Params) -> anyhow::Result<Scene> {
    return match &params.obj {
        Some(obj) => loader::load_obj_scene(obj, params.texture.as_deref())
            .with_context(|| format!("failed to load {}", obj.display())),
        None => Ok(shapes::textured_cube_scene()?),
    };
}

/// Camera circling the origin, one turn every ~12.5 seconds.
fn orbit_camera(time: f32, aspect: f32) -> FrameTransforms {
    let angle = 0.5 * time;
    let eye = point![3.0 * angle.sin(), 1.5, 3.0 * angle.cos()];
    return FrameTransforms::look_at(eye, point![0.0, 0.0, 0.0], vector![0.0, 1.0, 0.0], 1.0, aspect, 0.1, 100.0);
}

/// Loads the scene and either shows it in a window or renders it headless.
pub fn run(params: Params) -> anyhow::Result<()> {
    let scene = build_scene(&params)?;
    let mut pipeline = Pipeline::init(params.width, params.height, params.config.clone())?;
    let report = pipeline.load_scene(&scene)?;
    if report.loaded_groups == 0 {
        bail!("scene has no drawable primitive groups");
    }

    let result = match params.headless {
        true => run_headless(&mut pipeline, &params),
        false => run_window(&mut pipeline, &params),
    };
    pipeline.shutdown();
    return result;
}

fn run_headless(pipeline: &mut Pipeline, params: &Params) -> anyhow::Result<()> {
    let aspect = params.width as f32 / params.height as f32;
    let time_begin = time::Instant::now();
    for frame in 0..params.frames.max(1) {
        pipeline.render(&orbit_camera(frame as f32 / 30.0, aspect))?;
    }
    let elapsed = time_begin.elapsed().as_secs_f32();
    if params.print_fps {
        println!("FPS --- {:.1}", params.frames.max(1) as f32 / elapsed);
    }

    pipeline
        .framebuffer()
        .to_rgb_image()
        .save(&params.output)
        .with_context(|| format!("failed to write {}", params.output.display()))?;
    info!("Saved frame to {}", params.output.display());
    return Ok(());
}

/// Launches the window and renders until Escape is released.
fn run_window(pipeline: &mut Pipeline, params: &Params) -> anyhow::Result<()> {
    let window_options: WindowOptions = WindowOptions {
        size: Some([params.width, params.height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    let event_channel = window.event_channel()?;
    let aspect = params.width as f32 / params.height as f32;

    let mut exit = false;
    let time_begin = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    while !exit {
        let passed_time = time_begin.elapsed().as_secs_f32();
        pipeline.render(&orbit_camera(passed_time, aspect))?;

        let frame = pipeline.framebuffer().to_rgb_image();
        let image_data = ImageView::new(ImageInfo::rgb8(params.width, params.height), frame.as_raw());
        window.set_image("image", image_data)?;

        // Draining the event channel, looking for an exit event.
        exit = event_channel.try_iter().fold(false, |exit, window_event| is_exit_event(window_event) || exit);

        if params.print_fps {
            // Counting frames to printout stats every second.
            frame_counter += 1;
            if frame_counter_time_begin.elapsed().as_secs_f32() > 1.0 {
                println!("FPS --- {}", frame_counter);
                frame_counter_time_begin = time::Instant::now();
                frame_counter = 0;
            }
        }
    }

    return Ok(());
}
