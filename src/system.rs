//! The discrete nonlinear system `A u + M f(u) = b` on the free nodes of a mesh.
use crate::assembly::global::csr_mul_vector;
use crate::assembly::load::assemble_load_vector;
use crate::function::ProblemFunction;
use crate::mesh::FemMesh;
use nalgebra::{DVector, Scalar};
use nalgebra_sparse::CsrMatrix;
use nlfem_optimize::Real;

/// A mesh together with an assembled load vector.
///
/// Only the diagonal of the mass matrix enters the nonlinear term, so the system reads
/// `A u + diag(M) .* f(u) = b` on the free nodes.
#[derive(Debug, Clone)]
pub struct NonlinearSystem<'a, T: Scalar> {
    mesh: &'a FemMesh<T>,
    load: DVector<T>,
}

impl<'a, T: Real> NonlinearSystem<'a, T> {
    pub fn assemble<G>(mesh: &'a FemMesh<T>, source: &G) -> Self
    where
        G: ProblemFunction<T> + ?Sized,
    {
        let load = assemble_load_vector(mesh, source);
        Self { mesh, load }
    }

    /// Panics if the load vector does not have one entry per mesh node.
    pub fn from_load(mesh: &'a FemMesh<T>, load: DVector<T>) -> Self {
        assert_eq!(load.len(), mesh.num_nodes(), "Load vector must have one entry per node.");
        Self { mesh, load }
    }

    pub fn mesh(&self) -> &'a FemMesh<T> {
        self.mesh
    }

    pub fn stiffness(&self) -> &'a CsrMatrix<T> {
        self.mesh.stiffness()
    }

    pub fn mass_diagonal(&self) -> &'a DVector<T> {
        self.mesh.mass_diagonal()
    }

    pub fn load(&self) -> &DVector<T> {
        &self.load
    }

    /// Initial iterate: the boundary function at boundary nodes and zero at free nodes.
    pub fn initial_guess<G>(&self, boundary: &G) -> DVector<T>
    where
        G: ProblemFunction<T> + ?Sized,
    {
        let mut u = DVector::zeros(self.mesh.num_nodes());
        for &node in self.mesh.boundary_nodes() {
            u[node] = boundary.eval_at(&self.mesh.vertices()[node]);
        }
        u
    }

    /// Full residual `A u + diag(M) .* f(u) - b`, including the (meaningless) boundary rows.
    pub fn residual<F>(&self, nonlinearity: &F, u: &DVector<T>) -> DVector<T>
    where
        F: ProblemFunction<T> + ?Sized,
    {
        let mut r = csr_mul_vector(self.stiffness(), u);
        r += self.mass_diagonal().component_mul(&nonlinearity.f_vector(u));
        r -= &self.load;
        r
    }

    /// Residual restricted to the free nodes, in the order of [`FemMesh::free_nodes`].
    pub fn free_residual<F>(&self, nonlinearity: &F, u: &DVector<T>) -> DVector<T>
    where
        F: ProblemFunction<T> + ?Sized,
    {
        let r = self.residual(nonlinearity, u);
        let free_nodes = self.mesh.free_nodes();
        DVector::from_iterator(free_nodes.len(), free_nodes.iter().map(|&i| r[i]))
    }

    pub fn free_residual_norm<F>(&self, nonlinearity: &F, u: &DVector<T>) -> T
    where
        F: ProblemFunction<T> + ?Sized,
    {
        self.free_residual(nonlinearity, u).norm()
    }
}
