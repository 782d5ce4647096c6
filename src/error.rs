use std::io;

use thiserror::Error;

use crate::scene::{TextureId, Topology};

/// Fatal pipeline errors. Anything here aborts init, scene load or the current frame.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid framebuffer resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },
    #[error("failed to allocate {what} ({len} elements)")]
    AllocationFailed { what: &'static str, len: usize },
    #[error("no scene is loaded")]
    NoScene,
    #[error("a worker panicked during the {0} stage")]
    WorkerPanicked(&'static str),
}

/// Reasons for a primitive group to be rejected. A rejected group is skipped, the rest of the
/// scene still loads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("unsupported primitive topology mode {0}")]
    UnsupportedTopology(u32),
    #[error("group has no index buffer")]
    MissingIndices,
    #[error("{count} indices do not form whole {topology:?} primitives")]
    IndexCount { count: usize, topology: Topology },
    #[error("{attribute} count {found} does not match position count {expected}")]
    AttributeMismatch { attribute: &'static str, expected: usize, found: usize },
    #[error("index {index} is out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },
    #[error("{0:?} is not in the scene texture table")]
    UnknownTexture(TextureId),
    #[error("texture of {width}x{height} can't hold {len} rgb bytes")]
    TextureSize { width: u32, height: u32, len: usize },
}

/// Errors of the asset loading collaborator.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("obj error: {0}")]
    Obj(#[from] obj::ObjError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid scene data: {0}")]
    Scene(#[from] SceneError),
}

/// Errors while reading or writing a RON config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("serialize error: {0}")]
    Serialize(#[from] ron::Error),
}
