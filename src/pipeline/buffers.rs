//! Per-pixel frame targets shared by the rasterization workers: the depth buffer and the fragment
//! buffer with its per-pixel locks.
//!
//! Depth words pack the encoded depth in the high 32 bits and the primitive index in the low 32
//! bits. An atomic min over the packed word therefore orders by depth first and resolves equal
//! depths to the lower primitive index, which makes the winner of every pixel independent of
//! worker scheduling.

use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra as na;
use na::{Vector2, Vector3};
use parking_lot::Mutex;

use crate::error::PipelineError;
use crate::scene::TextureId;

/// Scale of normalized depth into the integer encoding.
pub const DEPTH_SCALE: f32 = i32::MAX as f32;
/// Cleared depth word, farther than anything a primitive can write.
pub const DEPTH_CLEAR: u64 = u64::MAX;

/// Encodes a normalized depth in [0, 1] as an integer, smaller is nearer.
pub fn encode_depth(depth: f32) -> u32 {
    return (depth.clamp(0.0, 1.0) * DEPTH_SCALE) as u32;
}

pub fn decode_depth(encoded: u32) -> f32 {
    return encoded as f32 / DEPTH_SCALE;
}

fn pack(depth: u32, primitive: u32) -> u64 {
    return ((depth as u64) << 32) | primitive as u64;
}

/// What wrote a fragment slot this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coverage {
    /// Nothing, the pixel gets the clear color.
    #[default]
    Empty,
    /// Depth tested surface of a triangle, shaded by the fragment stage.
    Surface,
    /// Point or line marker, written without depth test and not lit.
    Marker,
}

/// Per-pixel shading inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub coverage: Coverage,
    pub color: Vector3<f32>,
    pub eye_position: Vector3<f32>,
    pub eye_normal: Vector3<f32>,
    pub texcoord: Vector2<f32>,
    pub texture: Option<TextureId>,
    pub primitive: u32, // Index of the primitive in the global primitive array.
}

impl Default for Fragment {
    fn default() -> Self {
        return Self {
            coverage: Coverage::Empty,
            color: Vector3::zeros(),
            eye_position: Vector3::zeros(),
            eye_normal: Vector3::zeros(),
            texcoord: Vector2::zeros(),
            texture: None,
            primitive: 0,
        };
    }
}

/// Allocates a buffer, reporting allocation failure instead of aborting.
pub fn try_alloc_with<T>(what: &'static str, len: usize, mut init: impl FnMut() -> T) -> Result<Vec<T>, PipelineError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| PipelineError::AllocationFailed { what, len })?;
    buffer.extend((0..len).map(|_| init()));
    return Ok(buffer);
}

/// Depth and fragment buffers of one framebuffer, sized once at init.
pub struct FrameTargets {
    width: u32,
    height: u32,
    depth: Vec<AtomicU64>,
    // The mutex of a slot is the pixel lock. It guards the depth compare and the fragment write
    // as one step.
    fragments: Vec<Mutex<Fragment>>,
}

impl FrameTargets {
    pub fn new(width: u32, height: u32) -> Result<Self, PipelineError> {
        let len = width as usize * height as usize;
        return Ok(Self {
            width,
            height,
            depth: try_alloc_with("depth buffer", len, || AtomicU64::new(DEPTH_CLEAR))?,
            fragments: try_alloc_with("fragment buffer", len, || Mutex::new(Fragment::default()))?,
        });
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    pub fn len(&self) -> usize {
        return self.depth.len();
    }

    /// Flat index of a pixel, None outside of [0, width) x [0, height).
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        return Some(x as usize + y as usize * self.width as usize);
    }

    /// Resets depth to the far sentinel and fragments to empty for a range of pixels.
    pub fn clear_range(&self, start: usize, end: usize) {
        for index in start..end {
            self.depth[index].store(DEPTH_CLEAR, Ordering::Relaxed);
            *self.fragments[index].lock() = Fragment::default();
        }
    }

    /// Encoded depth stored at a pixel, None if nothing was depth tested there.
    pub fn depth_at(&self, index: usize) -> Option<u32> {
        let word = self.depth[index].load(Ordering::Acquire);
        if word == DEPTH_CLEAR {
            return None;
        }
        return Some((word >> 32) as u32);
    }

    pub fn fragment(&self, index: usize) -> Fragment {
        return *self.fragments[index].lock();
    }

    /// Atomic min of a packed depth word into a pixel. True if the word is now the stored minimum.
    fn claim_depth(&self, index: usize, word: u64) -> bool {
        let previous = self.depth[index].fetch_min(word, Ordering::AcqRel);
        return word <= previous;
    }

    /// Depth tested fragment write. Returns true if this primitive is the nearest one so far and
    /// its fragment was stored.
    ///
    /// With `locking` the depth min and the fragment write happen under the pixel lock, so the
    /// stored fragment always belongs to the stored depth. Without it the min is still atomic
    /// but a farther primitive that won an earlier min can overwrite the fragment of a nearer one.
    pub fn write_depth_tested(&self, index: usize, depth: u32, primitive: u32, fragment: Fragment, locking: bool) -> bool {
        let word = pack(depth, primitive);
        if locking {
            let mut slot = self.fragments[index].lock();
            if self.claim_depth(index, word) {
                *slot = fragment;
                return true;
            }
            return false;
        }

        if self.claim_depth(index, word) {
            *self.fragments[index].lock() = fragment;
            return true;
        }
        return false;
    }

    /// Marker write used by the point and line paths. No depth test, overlapping markers keep the
    /// lowest primitive index. Returns true if the marker was stored.
    pub fn write_marker(&self, index: usize, fragment: Fragment) -> bool {
        let mut slot = self.fragments[index].lock();
        if slot.coverage == Coverage::Marker && slot.primitive <= fragment.primitive {
            return false;
        }
        *slot = fragment;
        return true;
    }
}
