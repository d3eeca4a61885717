use crate::assembly::local::{element_mass, element_stiffness, triangle_signed_area};
use crate::mesh::TriangleConnectivity;
use itertools::izip;
use nalgebra::{DVector, Matrix3, Point2};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use nlfem_optimize::Real;

/// Signed areas of all triangles. Positive for counter-clockwise triangles.
pub fn compute_element_areas<T: Real>(vertices: &[Point2<T>], connectivity: &[TriangleConnectivity]) -> DVector<T> {
    DVector::from_iterator(
        connectivity.len(),
        connectivity
            .iter()
            .map(|&[a, b, c]| triangle_signed_area(&[vertices[a], vertices[b], vertices[c]])),
    )
}

pub fn assemble_stiffness<T: Real>(vertices: &[Point2<T>], connectivity: &[TriangleConnectivity]) -> CsrMatrix<T> {
    assemble_element_matrices(vertices.len(), connectivity, |element_index| {
        let [a, b, c] = connectivity[element_index];
        let element_vertices = [vertices[a], vertices[b], vertices[c]];
        let area = triangle_signed_area(&element_vertices);
        element_stiffness(&element_vertices, area)
    })
}

pub fn assemble_mass<T: Real>(num_nodes: usize, connectivity: &[TriangleConnectivity], areas: &DVector<T>) -> CsrMatrix<T> {
    assert_eq!(connectivity.len(), areas.len());
    assemble_element_matrices(num_nodes, connectivity, |element_index| element_mass(areas[element_index]))
}

/// Sums 3x3 element matrices into a global `n x n` CSR matrix.
fn assemble_element_matrices<T, F>(n: usize, connectivity: &[TriangleConnectivity], element_matrix: F) -> CsrMatrix<T>
where
    T: Real,
    F: Fn(usize) -> Matrix3<T>,
{
    let mut coo = CooMatrix::new(n, n);
    for (element_index, nodes) in connectivity.iter().enumerate() {
        let matrix = element_matrix(element_index);
        for (local_i, &i) in nodes.iter().enumerate() {
            for (local_j, &j) in nodes.iter().enumerate() {
                coo.push(i, j, matrix[(local_i, local_j)]);
            }
        }
    }
    // Duplicate entries are summed by the conversion
    CsrMatrix::from(&coo)
}

/// Extracts the diagonal of a square CSR matrix. Missing diagonal entries are zero.
pub fn csr_diagonal<T: Real>(matrix: &CsrMatrix<T>) -> DVector<T> {
    let n = matrix.nrows().min(matrix.ncols());
    DVector::from_iterator(n, (0..n).map(|i| csr_row_split(matrix, i, None).0))
}

/// Splits row `i` of `matrix` into its diagonal entry and, if `u` is given, the product of the
/// off-diagonal part of the row with `u`.
///
/// Returns `(A(i, i), sum_{j != i} A(i, j) u(j))`. The second component is zero if `u` is
/// `None`.
pub fn csr_row_split<T: Real>(matrix: &CsrMatrix<T>, i: usize, u: Option<&DVector<T>>) -> (T, T) {
    let row = matrix.row(i);
    let mut diagonal = T::zero();
    let mut off_diagonal = T::zero();
    for (&j, &a_ij) in izip!(row.col_indices(), row.values()) {
        if j == i {
            diagonal += a_ij;
        } else if let Some(u) = u {
            off_diagonal += a_ij * u[j];
        }
    }
    (diagonal, off_diagonal)
}

/// Computes `A u` for a CSR matrix `A`.
pub fn csr_mul_vector<T: Real>(matrix: &CsrMatrix<T>, u: &DVector<T>) -> DVector<T> {
    assert_eq!(matrix.ncols(), u.len(), "Matrix and vector dimensions must be compatible.");
    DVector::from_iterator(
        matrix.nrows(),
        matrix.row_iter().map(|row| {
            izip!(row.col_indices(), row.values())
                .map(|(&j, &a_ij)| a_ij * u[j])
                .fold(T::zero(), |sum, term| sum + term)
        }),
    )
}
