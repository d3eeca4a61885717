//! Uniform ("red") refinement of triangle meshes.
use crate::mesh::{TriangleConnectivity, TriangleMesh2d};
use nalgebra::{center, Point2};
use nlfem_optimize::Real;
use std::collections::HashMap;

/// Splits every triangle into four by connecting its edge midpoints.
///
/// Existing vertices keep their indices, and each new midpoint vertex is shared by the
/// triangles adjacent to its edge. Child triangles inherit the orientation of their parent.
pub fn refine_uniformly<T>(mesh: &TriangleMesh2d<T>) -> TriangleMesh2d<T>
where
    T: Real,
{
    let mut vertices = mesh.vertices().to_vec();
    let mut midpoint_labels = HashMap::new();
    let mut connectivity: Vec<TriangleConnectivity> = Vec::with_capacity(4 * mesh.num_triangles());

    for &[a, b, c] in mesh.connectivity() {
        let ab = midpoint_index(&mut vertices, &mut midpoint_labels, a, b);
        let bc = midpoint_index(&mut vertices, &mut midpoint_labels, b, c);
        let ca = midpoint_index(&mut vertices, &mut midpoint_labels, c, a);
        connectivity.push([a, ab, ca]);
        connectivity.push([ab, b, bc]);
        connectivity.push([ca, bc, c]);
        connectivity.push([ab, bc, ca]);
    }

    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}

pub fn refine_uniformly_repeat<T>(mesh: &TriangleMesh2d<T>, times: usize) -> TriangleMesh2d<T>
where
    T: Real,
{
    let mut refined = mesh.clone();
    for _ in 0..times {
        refined = refine_uniformly(&refined);
    }
    refined
}

fn midpoint_index<T: Real>(
    vertices: &mut Vec<Point2<T>>,
    labels: &mut HashMap<[usize; 2], usize>,
    a: usize,
    b: usize,
) -> usize {
    let key = if a < b { [a, b] } else { [b, a] };
    if let Some(&index) = labels.get(&key) {
        return index;
    }
    let midpoint = center(&vertices[a], &vertices[b]);
    vertices.push(midpoint);
    let index = vertices.len() - 1;
    labels.insert(key, index);
    index
}
