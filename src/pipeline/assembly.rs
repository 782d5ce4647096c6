//! Primitive assembly: gathers transformed vertices through the index list into fixed size
//! primitive records. Every group writes to its own slice of the global primitive array, so
//! groups from different meshes pack next to each other without colliding.

use std::sync::Arc;

use super::vertex::TransformedVertex;
use super::workers::Workers;
use crate::error::PipelineError;
use crate::scene::Topology;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Point([TransformedVertex; 1]),
    Line([TransformedVertex; 2]),
    Triangle([TransformedVertex; 3]),
}

impl Default for Primitive {
    fn default() -> Self {
        return Primitive::Point([TransformedVertex::default()]);
    }
}

impl Primitive {
    pub fn vertices(&self) -> &[TransformedVertex] {
        return match self {
            Primitive::Point(v) => &v[..],
            Primitive::Line(v) => &v[..],
            Primitive::Triangle(v) => &v[..],
        };
    }
}

/// Indices of the `local`-th primitive of an index list. Strip triangles alternate their first
/// two vertices to keep one winding for the whole strip.
fn primitive_indices(topology: Topology, indices: &[u32], local: usize) -> ([u32; 3], usize) {
    return match topology {
        Topology::Points => ([indices[local], 0, 0], 1),
        Topology::Lines => ([indices[2 * local], indices[2 * local + 1], 0], 2),
        Topology::Triangles => ([indices[3 * local], indices[3 * local + 1], indices[3 * local + 2]], 3),
        Topology::TriangleStrip => {
            if local % 2 == 0 {
                ([indices[local], indices[local + 1], indices[local + 2]], 3)
            } else {
                ([indices[local + 1], indices[local], indices[local + 2]], 3)
            }
        }
        Topology::TriangleFan => ([indices[0], indices[local + 1], indices[local + 2]], 3),
    };
}

/// Builds the `local`-th primitive of a group. Indices are validated at scene load.
pub fn assemble(topology: Topology, indices: &[u32], vertices: &[TransformedVertex], local: usize) -> Primitive {
    let (ids, count) = primitive_indices(topology, indices, local);
    let v = |i: usize| vertices[ids[i] as usize];
    return match count {
        1 => Primitive::Point([v(0)]),
        2 => Primitive::Line([v(0), v(1)]),
        _ => Primitive::Triangle([v(0), v(1), v(2)]),
    };
}

/// Runs assembly for one group. `output` is the group's slice of the global primitive array,
/// i.e. it starts at the group's base offset and holds exactly its primitive count.
pub fn run(
    workers: &Workers,
    topology: Topology,
    indices: &Arc<[u32]>,
    vertices: &Arc<Vec<TransformedVertex>>,
    output: &mut [Primitive],
) -> Result<(), PipelineError> {
    let indices = Arc::clone(indices);
    let vertices = Arc::clone(vertices);
    return workers.map_into("primitive assembly", output, move |local| assemble(topology, &indices, &vertices, local));
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::Vector4;

    /// Vertices tagged by their index in screen.x.
    fn tagged_vertices(n: usize) -> Vec<TransformedVertex> {
        return (0..n)
            .map(|i| TransformedVertex { screen: Vector4::new(i as f32, 0.0, 0.0, 1.0), ..Default::default() })
            .collect();
    }

    fn tags(primitive: &Primitive) -> Vec<usize> {
        return primitive.vertices().iter().map(|v| v.screen.x as usize).collect();
    }

    #[test]
    fn triangle_list() {
        let vertices = tagged_vertices(4);
        let indices = [0, 1, 2, 2, 1, 3];
        assert_eq!(tags(&assemble(Topology::Triangles, &indices, &vertices, 1)), vec![2, 1, 3]);
    }

    #[test]
    fn strip_keeps_winding() {
        let vertices = tagged_vertices(5);
        let indices = [0, 1, 2, 3, 4];
        assert_eq!(tags(&assemble(Topology::TriangleStrip, &indices, &vertices, 0)), vec![0, 1, 2]);
        assert_eq!(tags(&assemble(Topology::TriangleStrip, &indices, &vertices, 1)), vec![2, 1, 3]);
        assert_eq!(tags(&assemble(Topology::TriangleStrip, &indices, &vertices, 2)), vec![2, 3, 4]);
    }

    #[test]
    fn fan_shares_first_vertex() {
        let vertices = tagged_vertices(5);
        let indices = [4, 0, 1, 2];
        assert_eq!(tags(&assemble(Topology::TriangleFan, &indices, &vertices, 0)), vec![4, 0, 1]);
        assert_eq!(tags(&assemble(Topology::TriangleFan, &indices, &vertices, 1)), vec![4, 1, 2]);
    }

    #[test]
    fn lines_and_points() {
        let vertices = tagged_vertices(4);
        let indices = [3, 2, 1, 0];
        assert!(matches!(assemble(Topology::Lines, &indices, &vertices, 1), Primitive::Line(_)));
        assert_eq!(tags(&assemble(Topology::Lines, &indices, &vertices, 1)), vec![1, 0]);
        assert_eq!(tags(&assemble(Topology::Points, &indices, &vertices, 2)), vec![1]);
    }

    #[test]
    fn groups_pack_at_their_base_offset() {
        let workers = Workers::new(2);
        let mut global = vec![Primitive::default(); 3];
        let first_indices: Arc<[u32]> = vec![0, 1, 2].into();
        let second_indices: Arc<[u32]> = vec![0, 1, 2, 3].into();
        let first_vertices = Arc::new(tagged_vertices(3));
        let second_vertices = Arc::new(tagged_vertices(4));

        run(&workers, Topology::Triangles, &first_indices, &first_vertices, &mut global[0..1]).unwrap();
        run(&workers, Topology::TriangleStrip, &second_indices, &second_vertices, &mut global[1..3]).unwrap();

        assert_eq!(tags(&global[0]), vec![0, 1, 2]);
        assert_eq!(tags(&global[1]), vec![0, 1, 2]);
        assert_eq!(tags(&global[2]), vec![2, 1, 3]);
    }
}
