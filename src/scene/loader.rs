//! Asset loading collaborator: Wavefront OBJ geometry plus an optional diffuse texture turned
//! into a [`Scene`]. Only the flat arrays the pipeline consumes are extracted.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use obj::{load_obj, Obj, TexturedVertex};

use super::{PrimitiveGroup, Scene, Texture, Topology};
use crate::error::LoadError;

/// Loads a texture file of any format `image` can decode, converted to rgb8.
pub fn load_texture<P: AsRef<Path>>(path: P) -> Result<Texture, LoadError> {
    let path = path.as_ref();
    let image = ::image::open(path)?.to_rgb8();
    info!("Loaded texture {} ({}x{})", path.display(), image.width(), image.height());
    return Ok(Texture::from_image(image)?);
}

/// Loads an OBJ model as a single triangle group, optionally bound to a texture.
pub fn load_obj_scene<P: AsRef<Path>>(obj_path: P, texture_path: Option<&Path>) -> Result<Scene, LoadError> {
    let obj_path = obj_path.as_ref();
    let model: Obj<TexturedVertex, u32> = load_obj(BufReader::new(File::open(obj_path)?))?;
    info!("Number of vertices - {}", model.vertices.len());
    info!("Number of indices  - {}", model.indices.len());

    let positions: Vec<[f32; 3]> = model.vertices.iter().map(|v| v.position).collect();
    let normals: Vec<[f32; 3]> = model.vertices.iter().map(|v| v.normal).collect();
    // OBJ puts v = 0 at the bottom of the image, texture rows go top to bottom.
    let texcoords: Vec<[f32; 2]> = model.vertices.iter().map(|v| [v.texture[0], 1.0 - v.texture[1]]).collect();

    let name = obj_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut scene = Scene::new();
    let mut group = PrimitiveGroup::from_arrays(&name, Topology::Triangles, &positions, &normals, &texcoords, model.indices)?;
    if let Some(texture_path) = texture_path {
        let texture = scene.add_texture(load_texture(texture_path)?);
        group = group.with_texture(texture);
    }
    scene.add_group(group);

    return Ok(scene);
}
