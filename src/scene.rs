//! Scene data handed to the pipeline by the asset loading side: flat vertex and index arrays
//! grouped into primitive groups, plus a table of textures the groups refer to by handle.
//!
//! All buffers are immutable after construction and shared by `Arc`, so the per-frame stages
//! can hand them to worker threads without copying.

pub mod loader;
pub mod shapes;

use std::sync::Arc;

use nalgebra as na;
use na::{Matrix4, Vector2, Vector3};

use crate::error::SceneError;

/// Handle of a texture in the scene texture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// Primitive topology of a group's index list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Points,
    Lines,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    /// Topology from a glTF style mode code. Line loops (2) and line strips (3) are not supported.
    pub fn from_mode(mode: u32) -> Result<Topology, SceneError> {
        return match mode {
            0 => Ok(Topology::Points),
            1 => Ok(Topology::Lines),
            4 => Ok(Topology::Triangles),
            5 => Ok(Topology::TriangleStrip),
            6 => Ok(Topology::TriangleFan),
            other => Err(SceneError::UnsupportedTopology(other)),
        };
    }

    /// Number of independent primitives an index list of given length expands to.
    /// Strips and fans are expanded into `count - 2` separate triangles.
    pub fn primitive_count(&self, index_count: usize) -> usize {
        return match self {
            Topology::Points => index_count,
            Topology::Lines => index_count / 2,
            Topology::Triangles => index_count / 3,
            Topology::TriangleStrip | Topology::TriangleFan => index_count.saturating_sub(2),
        };
    }

    /// Checks that the index count forms whole primitives.
    fn check_index_count(&self, count: usize) -> Result<(), SceneError> {
        let ok = match self {
            Topology::Points => count > 0,
            Topology::Lines => count % 2 == 0,
            Topology::Triangles => count % 3 == 0,
            Topology::TriangleStrip | Topology::TriangleFan => count >= 3,
        };
        if !ok {
            return Err(SceneError::IndexCount { count, topology: *self });
        }
        return Ok(());
    }
}

/// Object space vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub texcoord: Vector2<f32>,
}

impl Vertex {
    pub fn new(position: Vector3<f32>, normal: Vector3<f32>, texcoord: Vector2<f32>) -> Self {
        return Self { position, normal, texcoord };
    }
}

/// RGB8 texture, rows stored top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    data: Arc<[u8]>, // Interleaved rgb triples.
}

impl Texture {
    /// Wraps raw rgb bytes. Fails if the byte count doesn't match the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, SceneError> {
        if width == 0 || height == 0 || data.len() != 3 * width as usize * height as usize {
            return Err(SceneError::TextureSize { width, height, len: data.len() });
        }
        return Ok(Self { width, height, data: data.into() });
    }

    pub fn from_image(image: ::image::RgbImage) -> Result<Self, SceneError> {
        let (width, height) = image.dimensions();
        return Self::new(width, height, image.into_raw());
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    /// Texel color with channels in [0, 255]. Coordinates are clamped to the texture edge.
    pub fn texel(&self, x: i64, y: i64) -> Vector3<f32> {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        let index = 3 * (x + y * self.width as usize);
        return Vector3::new(
            self.data[index] as f32,
            self.data[index + 1] as f32,
            self.data[index + 2] as f32,
        );
    }
}

/// One draw call worth of geometry: a vertex array, an index list interpreted through the
/// topology, an optional texture and the model transform already composed through the node
/// hierarchy.
#[derive(Debug, Clone)]
pub struct PrimitiveGroup {
    pub name: String,
    pub topology: Topology,
    pub vertices: Arc<[Vertex]>,
    pub indices: Arc<[u32]>,
    pub texture: Option<TextureId>,
    pub model: Matrix4<f32>,
}

impl PrimitiveGroup {
    /// Builds a group out of flat attribute arrays. Normals and texcoords may be empty, in
    /// which case zero vectors are used, otherwise they have to match the position count.
    pub fn from_arrays(
        name: &str,
        topology: Topology,
        positions: &[[f32; 3]],
        normals: &[[f32; 3]],
        texcoords: &[[f32; 2]],
        indices: Vec<u32>,
    ) -> Result<Self, SceneError> {
        fn check_len(attribute: &'static str, expected: usize, found: usize) -> Result<(), SceneError> {
            if found != 0 && found != expected {
                return Err(SceneError::AttributeMismatch { attribute, expected, found });
            }
            return Ok(());
        }
        check_len("normal", positions.len(), normals.len())?;
        check_len("texcoord", positions.len(), texcoords.len())?;

        let vertices: Vec<Vertex> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let normal = normals.get(i).map_or(Vector3::zeros(), |n| Vector3::new(n[0], n[1], n[2]));
                let texcoord = texcoords.get(i).map_or(Vector2::zeros(), |t| Vector2::new(t[0], t[1]));
                Vertex::new(Vector3::new(p[0], p[1], p[2]), normal, texcoord)
            })
            .collect();

        return Ok(Self {
            name: name.to_string(),
            topology,
            vertices: vertices.into(),
            indices: indices.into(),
            texture: None,
            model: Matrix4::identity(),
        });
    }

    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.texture = Some(texture);
        return self;
    }

    pub fn with_model(mut self, model: Matrix4<f32>) -> Self {
        self.model = model;
        return self;
    }

    pub fn primitive_count(&self) -> usize {
        return self.topology.primitive_count(self.indices.len());
    }

    /// Checks everything the per-frame stages rely on: whole primitives, indices inside the
    /// vertex array and a texture handle that exists.
    pub fn validate(&self, texture_count: usize) -> Result<(), SceneError> {
        if self.indices.is_empty() {
            return Err(SceneError::MissingIndices);
        }
        self.topology.check_index_count(self.indices.len())?;
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= self.vertices.len()) {
            return Err(SceneError::IndexOutOfRange { index, vertices: self.vertices.len() });
        }
        if let Some(texture) = self.texture {
            if texture.0 >= texture_count {
                return Err(SceneError::UnknownTexture(texture));
            }
        }
        return Ok(());
    }
}

/// Scene value produced by the asset loader and handed to the pipeline by reference.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub groups: Vec<PrimitiveGroup>,
    pub textures: Vec<Texture>,
}

impl Scene {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        return TextureId(self.textures.len() - 1);
    }

    pub fn add_group(&mut self, group: PrimitiveGroup) {
        self.groups.push(group);
    }

    pub fn vertex_count(&self) -> usize {
        return self.groups.iter().map(|g| g.vertices.len()).sum();
    }

    pub fn primitive_count(&self) -> usize {
        return self.groups.iter().map(|g| g.primitive_count()).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_group(indices: Vec<u32>, topology: Topology) -> PrimitiveGroup {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        return PrimitiveGroup::from_arrays("test", topology, &positions, &[], &[], indices).unwrap();
    }

    #[test]
    fn topology_from_mode() {
        assert_eq!(Topology::from_mode(4).unwrap(), Topology::Triangles);
        assert_eq!(Topology::from_mode(6).unwrap(), Topology::TriangleFan);
        assert_eq!(Topology::from_mode(2).unwrap_err(), SceneError::UnsupportedTopology(2));
    }

    #[test]
    fn strips_and_fans_expand_to_count_minus_two() {
        assert_eq!(Topology::TriangleStrip.primitive_count(6), 4);
        assert_eq!(Topology::TriangleFan.primitive_count(5), 3);
        assert_eq!(Topology::TriangleFan.primitive_count(1), 0);
        assert_eq!(Topology::Triangles.primitive_count(9), 3);
        assert_eq!(Topology::Lines.primitive_count(4), 2);
    }

    #[test]
    fn validation_rejects_malformed_groups() {
        assert_eq!(triangle_group(vec![], Topology::Triangles).validate(0), Err(SceneError::MissingIndices));
        assert_eq!(
            triangle_group(vec![0, 1], Topology::Triangles).validate(0),
            Err(SceneError::IndexCount { count: 2, topology: Topology::Triangles })
        );
        assert_eq!(
            triangle_group(vec![0, 1, 7], Topology::Triangles).validate(0),
            Err(SceneError::IndexOutOfRange { index: 7, vertices: 4 })
        );
        let textured = triangle_group(vec![0, 1, 2], Topology::Triangles).with_texture(TextureId(3));
        assert_eq!(textured.validate(1), Err(SceneError::UnknownTexture(TextureId(3))));
        assert!(triangle_group(vec![0, 1, 2, 3], Topology::TriangleStrip).validate(0).is_ok());
    }

    #[test]
    fn attribute_length_mismatch_is_rejected() {
        let err = PrimitiveGroup::from_arrays(
            "bad",
            Topology::Triangles,
            &[[0.0; 3], [0.0; 3], [0.0; 3]],
            &[[0.0, 0.0, 1.0]],
            &[],
            vec![0, 1, 2],
        )
        .unwrap_err();
        assert_eq!(err, SceneError::AttributeMismatch { attribute: "normal", expected: 3, found: 1 });
    }

    #[test]
    fn texture_size_is_checked_and_texels_clamp_to_edge() {
        assert!(Texture::new(2, 2, vec![0; 11]).is_err());
        let texture = Texture::new(2, 1, vec![10, 20, 30, 40, 50, 60]).unwrap();
        assert_eq!(texture.texel(0, 0), Vector3::new(10.0, 20.0, 30.0));
        assert_eq!(texture.texel(5, 3), Vector3::new(40.0, 50.0, 60.0));
        assert_eq!(texture.texel(-1, -1), Vector3::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn scene_counts() {
        let mut scene = Scene::new();
        scene.add_group(triangle_group(vec![0, 1, 2, 1, 3, 2], Topology::Triangles));
        scene.add_group(triangle_group(vec![0, 1, 2, 3], Topology::TriangleStrip));
        assert_eq!(scene.vertex_count(), 8);
        assert_eq!(scene.primitive_count(), 4);
    }
}
