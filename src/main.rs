mod app;

use std::path::PathBuf;

use clap::Parser;
use log::info;

use raster_pipeline::{DrawMode, RenderConfig, Texturing};

/// Renders an OBJ model (or a built in textured cube) with the raster pipeline.
#[derive(Parser, Debug)]
#[command(name = "raster_pipeline", version, about = "Data parallel triangle rasterizer")]
struct Args {
    /// Wavefront OBJ model to render. A textured cube is used if omitted.
    #[arg(short, long)]
    obj: Option<PathBuf>,

    /// Diffuse texture for the model
    #[arg(short, long)]
    texture: Option<PathBuf>,

    /// RON render config, command line flags override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Draw mode: triangles, lines or points
    #[arg(short, long)]
    mode: Option<DrawMode>,

    /// Texture sampling: off, nearest or bilinear
    #[arg(long)]
    texturing: Option<Texturing>,

    /// Interpolate attributes affinely in screen space
    #[arg(long)]
    no_perspective: bool,

    /// Discard triangles facing away from the camera
    #[arg(long)]
    cull: bool,

    /// Disable per-pixel locking (brings back the visibility race)
    #[arg(long)]
    no_lock: bool,

    /// Worker threads, 0 for one per core
    #[arg(long)]
    threads: Option<usize>,

    /// Render without a window and save the last frame
    #[arg(long)]
    headless: bool,

    /// Frames rendered in headless mode
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Output image of headless mode
    #[arg(long, default_value = "output.png")]
    output: PathBuf,

    /// Print frames per second
    #[arg(long)]
    print_fps: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn render_config(&self) -> anyhow::Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::from_ron_file(path)?,
            None => RenderConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.draw_mode = mode;
        }
        if let Some(texturing) = self.texturing {
            config.texturing = texturing;
        }
        if let Some(threads) = self.threads {
            config.worker_threads = threads;
        }
        config.perspective_correct &= !self.no_perspective;
        config.backface_cull |= self.cull;
        config.pixel_locking &= !self.no_lock;
        return Ok(config);
    }
}

#[show_image::main]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let config = args.render_config()?;
    info!("Render config: {:?}", config);

    let params = app::Params {
        width: args.width,
        height: args.height,
        print_fps: args.print_fps,
        headless: args.headless,
        frames: args.frames,
        output: args.output,
        obj: args.obj,
        texture: args.texture,
        config,
    };

    app::run(params)?;

    return Ok(());
}
