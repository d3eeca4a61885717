use crate::assembly::global::{assemble_mass, assemble_stiffness, compute_element_areas, csr_diagonal};
use crate::error::SolveError;
use nalgebra::{DVector, Point2, Scalar};
use nalgebra_sparse::CsrMatrix;
use nlfem_optimize::Real;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod procedural;
pub mod refinement;

/// Vertex indices of a linear triangle, in counter-clockwise order.
pub type TriangleConnectivity = [usize; 3];

/// A plain triangle mesh in two dimensions: vertex positions and triangle connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct TriangleMesh2d<T: Scalar> {
    vertices: Vec<Point2<T>>,
    connectivity: Vec<TriangleConnectivity>,
}

impl<T: Scalar> TriangleMesh2d<T> {
    pub fn from_vertices_and_connectivity(vertices: Vec<Point2<T>>, connectivity: Vec<TriangleConnectivity>) -> Self {
        Self { vertices, connectivity }
    }

    pub fn vertices(&self) -> &[Point2<T>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[TriangleConnectivity] {
        &self.connectivity
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.connectivity.len()
    }

    /// Finds edges that belong to exactly one triangle. Each edge is returned with sorted
    /// vertex indices, and the edges are sorted lexicographically.
    pub fn find_boundary_edges(&self) -> Vec<[usize; 2]> {
        // BTreeMap keeps the output deterministic
        let mut edge_counts = BTreeMap::new();
        for &[a, b, c] in &self.connectivity {
            for [i, j] in [[a, b], [b, c], [c, a]] {
                let key = if i < j { [i, j] } else { [j, i] };
                *edge_counts.entry(key).or_insert(0usize) += 1;
            }
        }

        edge_counts
            .into_iter()
            .filter(|&(_, count)| count == 1)
            .map(|(edge, _)| edge)
            .collect()
    }

    /// Returns a sorted list of vertices that are determined to be on the boundary.
    ///
    /// A vertex is considered to be a part of the boundary if it belongs to a boundary edge.
    pub fn find_boundary_vertices(&self) -> Vec<usize> {
        let mut indices: Vec<_> = self.find_boundary_edges().into_iter().flatten().collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Raw fields of a [`FemMesh`], for meshes assembled outside of this crate.
#[derive(Debug, Clone)]
pub struct FemMeshParts<T: Scalar> {
    pub vertices: Vec<Point2<T>>,
    pub connectivity: Vec<TriangleConnectivity>,
    pub areas: DVector<T>,
    pub stiffness: CsrMatrix<T>,
    pub mass: CsrMatrix<T>,
    pub free_nodes: Vec<usize>,
    pub boundary_nodes: Vec<usize>,
}

/// A triangulated domain together with its assembled P1 stiffness and mass matrices and the
/// partition of the nodes into free (interior) and boundary nodes.
///
/// The free and boundary node sets are guaranteed to partition `0 .. num_nodes()`, and every
/// field is guaranteed to be consistent with the number of nodes and triangles. A `FemMesh`
/// is never modified by the solvers.
#[derive(Debug, Clone)]
pub struct FemMesh<T: Scalar> {
    vertices: Vec<Point2<T>>,
    connectivity: Vec<TriangleConnectivity>,
    areas: DVector<T>,
    stiffness: CsrMatrix<T>,
    mass: CsrMatrix<T>,
    mass_diagonal: DVector<T>,
    free_nodes: Vec<usize>,
    boundary_nodes: Vec<usize>,
    is_free: Vec<bool>,
}

impl<T: Real> FemMesh<T> {
    /// Validates and assembles a mesh from its raw parts.
    pub fn from_parts(parts: FemMeshParts<T>) -> Result<Self, SolveError> {
        let FemMeshParts {
            vertices,
            connectivity,
            areas,
            stiffness,
            mass,
            free_nodes,
            boundary_nodes,
        } = parts;
        let n = vertices.len();

        if areas.len() != connectivity.len() {
            return Err(SolveError::InvalidMesh(format!(
                "{} element areas given for {} triangles",
                areas.len(),
                connectivity.len()
            )));
        }
        for (name, matrix) in [("stiffness", &stiffness), ("mass", &mass)] {
            if matrix.nrows() != n || matrix.ncols() != n {
                return Err(SolveError::InvalidMesh(format!(
                    "{} matrix is {}x{}, expected {}x{}",
                    name,
                    matrix.nrows(),
                    matrix.ncols(),
                    n,
                    n
                )));
            }
        }
        for (element_index, triangle) in connectivity.iter().enumerate() {
            if let Some(&v) = triangle.iter().find(|&&v| v >= n) {
                return Err(SolveError::InvalidMesh(format!(
                    "triangle {} references vertex {}, but there are only {} vertices",
                    element_index, v, n
                )));
            }
        }

        let is_free = partition_flags(n, &free_nodes, &boundary_nodes)?;
        let mass_diagonal = csr_diagonal(&mass);

        Ok(Self {
            vertices,
            connectivity,
            areas,
            stiffness,
            mass,
            mass_diagonal,
            free_nodes,
            boundary_nodes,
            is_free,
        })
    }

    /// Assembles stiffness and mass matrices for the given triangle mesh. Nodes on boundary
    /// edges become boundary nodes, and all remaining nodes are free.
    pub fn from_triangle_mesh(mesh: &TriangleMesh2d<T>) -> Result<Self, SolveError> {
        let vertices = mesh.vertices();
        let connectivity = mesh.connectivity();
        for (element_index, triangle) in connectivity.iter().enumerate() {
            if let Some(&v) = triangle.iter().find(|&&v| v >= vertices.len()) {
                return Err(SolveError::InvalidMesh(format!(
                    "triangle {} references vertex {}, but there are only {} vertices",
                    element_index,
                    v,
                    vertices.len()
                )));
            }
        }

        let areas = compute_element_areas(vertices, connectivity);
        if let Some(element_index) = areas.iter().position(|&area| !(area > T::zero())) {
            return Err(SolveError::InvalidMesh(format!(
                "triangle {} is degenerate or inverted",
                element_index
            )));
        }

        let boundary_nodes = mesh.find_boundary_vertices();
        let mut is_boundary = vec![false; vertices.len()];
        for &v in &boundary_nodes {
            is_boundary[v] = true;
        }
        let free_nodes = (0..vertices.len()).filter(|&v| !is_boundary[v]).collect();

        Self::from_parts(FemMeshParts {
            vertices: vertices.to_vec(),
            connectivity: connectivity.to_vec(),
            stiffness: assemble_stiffness(vertices, connectivity),
            mass: assemble_mass(vertices.len(), connectivity, &areas),
            areas,
            free_nodes,
            boundary_nodes,
        })
    }
}

impl<T: Scalar> FemMesh<T> {
    pub fn num_nodes(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[Point2<T>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[TriangleConnectivity] {
        &self.connectivity
    }

    pub fn areas(&self) -> &DVector<T> {
        &self.areas
    }

    pub fn stiffness(&self) -> &CsrMatrix<T> {
        &self.stiffness
    }

    pub fn mass(&self) -> &CsrMatrix<T> {
        &self.mass
    }

    /// The diagonal of the mass matrix, which is the only part of the mass matrix used by
    /// the solvers.
    pub fn mass_diagonal(&self) -> &DVector<T> {
        &self.mass_diagonal
    }

    pub fn free_nodes(&self) -> &[usize] {
        &self.free_nodes
    }

    pub fn boundary_nodes(&self) -> &[usize] {
        &self.boundary_nodes
    }

    /// Whether the node is free. Panics if `node` is out of bounds.
    pub fn is_free(&self, node: usize) -> bool {
        self.is_free[node]
    }

    /// Membership flags for the free node set, indexed by node.
    pub fn free_flags(&self) -> &[bool] {
        &self.is_free
    }
}

fn partition_flags(n: usize, free_nodes: &[usize], boundary_nodes: &[usize]) -> Result<Vec<bool>, SolveError> {
    let mut is_free = vec![false; n];
    let mut is_assigned = vec![false; n];

    for (set_name, nodes, free) in [("free", free_nodes, true), ("boundary", boundary_nodes, false)] {
        for &node in nodes {
            if node >= n {
                return Err(SolveError::InvalidMeshPartition(format!(
                    "{} node {} is out of bounds for a mesh with {} nodes",
                    set_name, node, n
                )));
            }
            if is_assigned[node] {
                let reason = if is_free[node] == free {
                    format!("node {} appears more than once in the {} set", node, set_name)
                } else {
                    format!("node {} is both free and boundary", node)
                };
                return Err(SolveError::InvalidMeshPartition(reason));
            }
            is_assigned[node] = true;
            is_free[node] = free;
        }
    }

    if let Some(node) = is_assigned.iter().position(|&assigned| !assigned) {
        return Err(SolveError::InvalidMeshPartition(format!(
            "node {} is neither free nor boundary",
            node
        )));
    }

    Ok(is_free)
}
