//! Element-level quantities for linear (P1) triangles.
use nalgebra::{center, Matrix3, Point2};
use nlfem_optimize::Real;
use numeric_literals::replace_float_literals;

/// Area of the triangle with the given vertices. Negative for clockwise triangles.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn triangle_signed_area<T: Real>(vertices: &[Point2<T>; 3]) -> T {
    let [a, b, c] = vertices;
    let ab = b - a;
    let ac = c - a;
    0.5 * (ab.x * ac.y - ab.y * ac.x)
}

/// Edge vectors `e_k`, where `e_k` is the edge opposite vertex `k`, oriented counter-clockwise.
pub fn opposite_edges<T: Real>(vertices: &[Point2<T>; 3]) -> [nalgebra::Vector2<T>; 3] {
    let [a, b, c] = vertices;
    [c - b, a - c, b - a]
}

/// Midpoints `m_k` of the edges opposite each vertex `k`.
pub fn opposite_edge_midpoints<T: Real>(vertices: &[Point2<T>; 3]) -> [Point2<T>; 3] {
    let [a, b, c] = vertices;
    [center(b, c), center(c, a), center(a, b)]
}

/// Element stiffness matrix of the Laplacian for P1 basis functions,
/// `K_ij = (e_i . e_j) / (4 |T|)`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn element_stiffness<T: Real>(vertices: &[Point2<T>; 3], area: T) -> Matrix3<T> {
    let edges = opposite_edges(vertices);
    Matrix3::from_fn(|i, j| edges[i].dot(&edges[j]) / (4.0 * area))
}

/// Consistent element mass matrix for P1 basis functions, `M_ij = |T| (1 + delta_ij) / 12`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn element_mass<T: Real>(area: T) -> Matrix3<T> {
    Matrix3::from_fn(|i, j| if i == j { area / 6.0 } else { area / 12.0 })
}

/// Load contributions of an element to its three vertices, using the edge midpoint rule.
///
/// `midpoint_values[k]` is the source evaluated at the midpoint of the edge opposite vertex
/// `k`. Vertex `k` receives `|T| (g(m_{k+1}) + g(m_{k+2})) / 6`, which is the edge-midpoint
/// quadrature of its basis function times the source.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn element_load<T: Real>(area: T, midpoint_values: &[T; 3]) -> [T; 3] {
    let g = midpoint_values;
    [
        area * (g[1] + g[2]) / 6.0,
        area * (g[2] + g[0]) / 6.0,
        area * (g[0] + g[1]) / 6.0,
    ]
}
