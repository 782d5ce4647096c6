//! A data parallel triangle rasterization pipeline running on a CPU worker pool.
//!
//! A [`Scene`] of primitive groups is loaded into a [`Pipeline`], which renders it for a given
//! camera through a vertex stage, primitive assembly, rasterization with a per-pixel depth test
//! and a shading stage into a float [`image::Framebuffer`], presented as rgba8.

pub mod config;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod scene;
pub mod shader;
pub mod util;

pub use config::{DrawMode, RenderConfig, ShadingConfig, Texturing};
pub use error::{ConfigError, LoadError, PipelineError, SceneError};
pub use pipeline::{FrameTransforms, Pipeline, SceneReport};
pub use scene::{PrimitiveGroup, Scene, Texture, TextureId, Topology, Vertex};
