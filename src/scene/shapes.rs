//! Small procedural scenes, used by the demo binary when no model is given and by the tests.

use super::{PrimitiveGroup, Scene, Texture, Topology};
use crate::error::SceneError;

/// Checkerboard texture with square cells.
pub fn checkerboard(size: u32, cell: u32, color_1: [u8; 3], color_2: [u8; 3]) -> Result<Texture, SceneError> {
    let cell = cell.max(1);
    let mut data = Vec::with_capacity(3 * (size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let color = if ((x / cell) + (y / cell)) % 2 == 0 { color_1 } else { color_2 };
            data.extend_from_slice(&color);
        }
    }
    return Texture::new(size, size, data);
}

/// Square in the z = 0 plane spanning [-half, half] in x and y, facing +z.
/// Texcoords map x to u and y to v linearly: u = (x + half) / (2 * half), same for v.
pub fn quad(half: f32) -> Result<PrimitiveGroup, SceneError> {
    let positions = [[-half, -half, 0.0], [half, -half, 0.0], [half, half, 0.0], [-half, half, 0.0]];
    let normals = [[0.0, 0.0, 1.0]; 4];
    let texcoords = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    return PrimitiveGroup::from_arrays("quad", Topology::Triangles, &positions, &normals, &texcoords, vec![0, 1, 2, 0, 2, 3]);
}

/// Unit cube centered at the origin, 4 vertices and 2 triangles per face with outward normals.
pub fn cube() -> Result<PrimitiveGroup, SceneError> {
    let faces: [([[f32; 3]; 4], [f32; 3]); 6] = [
        ([[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]], [0.0, 0.0, 1.0]),
        ([[-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, -1.0, -1.0]], [0.0, 0.0, -1.0]),
        ([[-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]], [0.0, 1.0, 0.0]),
        ([[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]], [0.0, -1.0, 0.0]),
        ([[1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]], [1.0, 0.0, 0.0]),
        ([[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]], [-1.0, 0.0, 0.0]),
    ];
    let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut texcoords = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (face_index, (corners, normal)) in faces.iter().enumerate() {
        let base = (4 * face_index) as u32;
        for i in 0..4 {
            positions.push(corners[i]);
            normals.push(*normal);
            texcoords.push(uvs[i]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    return PrimitiveGroup::from_arrays("cube", Topology::Triangles, &positions, &normals, &texcoords, indices);
}

/// Checkerboard textured cube, the default demo scene.
pub fn textured_cube_scene() -> Result<Scene, SceneError> {
    let mut scene = Scene::new();
    let texture = scene.add_texture(checkerboard(64, 8, [230, 120, 40], [40, 40, 60])?);
    scene.add_group(cube()?.with_texture(texture));
    return Ok(scene);
}
