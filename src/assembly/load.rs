use crate::accumulate::scatter_accumulate;
use crate::assembly::local::{element_load, opposite_edge_midpoints};
use crate::function::ProblemFunction;
use crate::mesh::{FemMesh, TriangleConnectivity};
use itertools::izip;
use nalgebra::{DVector, Point2};
use nlfem_optimize::Real;

/// Assembles the load vector `b` of the source term on the given mesh.
pub fn assemble_load_vector<T, G>(mesh: &FemMesh<T>, source: &G) -> DVector<T>
where
    T: Real,
    G: ProblemFunction<T> + ?Sized,
{
    assemble_load_vector_from_parts(mesh.vertices(), mesh.connectivity(), mesh.areas(), source)
}

/// Assembles the load vector from raw mesh data.
///
/// Per-vertex contributions are laid out vertex-column-major, that is all contributions to
/// local vertex 0 of every triangle first, then local vertex 1, then local vertex 2, and then
/// summed per global node. The result is therefore independent of how the summation is
/// implemented, as long as it respects this order.
pub fn assemble_load_vector_from_parts<T, G>(
    vertices: &[Point2<T>],
    connectivity: &[TriangleConnectivity],
    areas: &DVector<T>,
    source: &G,
) -> DVector<T>
where
    T: Real,
    G: ProblemFunction<T> + ?Sized,
{
    assert_eq!(connectivity.len(), areas.len(), "Need exactly one area per triangle.");

    let element_loads: Vec<[T; 3]> = izip!(connectivity, areas.iter())
        .map(|(&[a, b, c], &area)| {
            let midpoints = opposite_edge_midpoints(&[vertices[a], vertices[b], vertices[c]]);
            let midpoint_values = midpoints.map(|m| source.eval_at(&m));
            element_load(area, &midpoint_values)
        })
        .collect();

    let num_contributions = 3 * connectivity.len();
    let mut keys = Vec::with_capacity(num_contributions);
    let mut values = Vec::with_capacity(num_contributions);
    for local_vertex in 0..3 {
        for (nodes, loads) in izip!(connectivity, &element_loads) {
            keys.push(nodes[local_vertex]);
            values.push(loads[local_vertex]);
        }
    }

    scatter_accumulate(&keys, &values, vertices.len())
}
