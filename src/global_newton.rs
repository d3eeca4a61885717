//! Newton's method on all free nodes at once.
//!
//! The Jacobian of the free-node residual is `J = A_ff + diag(M_f .* f'(u_f))`, where `_f`
//! denotes restriction to free rows and columns. It is assembled densely and factorized with
//! LU in every step, which limits this strategy to small meshes.
use crate::error::SolveError;
use crate::function::ProblemFunction;
use crate::relaxation::SweepStats;
use crate::solver::{IterationRecord, SolveReport, SolverSettings, Strategy};
use crate::system::NonlinearSystem;
use itertools::izip;
use log::info;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use nlfem_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use nlfem_optimize::newton::{newton, NewtonSettings};
use nlfem_optimize::Real;
use std::error::Error;

/// The free-node residual `x -> (A u + diag(M) .* f(u) - b)_f`, where `u` agrees with `x` on
/// the free nodes and holds fixed boundary values elsewhere.
pub struct FreeNodeResidual<'a, 'b, T: Real, F: ?Sized> {
    system: &'a NonlinearSystem<'a, T>,
    nonlinearity: &'b F,
    /// Full-length iterate. Boundary entries are never written.
    u: DVector<T>,
    /// Position of each node in the free node list, if free.
    free_index: Vec<Option<usize>>,
    residual_norms: Vec<T>,
}

impl<'a, 'b, T, F> FreeNodeResidual<'a, 'b, T, F>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    /// `u` provides the boundary values. Its free entries are overwritten on evaluation.
    pub fn new(system: &'a NonlinearSystem<'a, T>, nonlinearity: &'b F, u: DVector<T>) -> Self {
        let mesh = system.mesh();
        assert_eq!(u.len(), mesh.num_nodes(), "Iterate must have one entry per node.");
        let mut free_index = vec![None; mesh.num_nodes()];
        for (local, &node) in mesh.free_nodes().iter().enumerate() {
            free_index[node] = Some(local);
        }
        Self {
            system,
            nonlinearity,
            u,
            free_index,
            residual_norms: Vec::new(),
        }
    }

    /// Extracts the free entries of the full iterate.
    pub fn free_values(&self) -> DVector<T> {
        let free_nodes = self.system.mesh().free_nodes();
        DVector::from_iterator(free_nodes.len(), free_nodes.iter().map(|&i| self.u[i]))
    }

    /// Residual norms of every evaluation so far, in order.
    pub fn residual_norms(&self) -> &[T] {
        &self.residual_norms
    }

    /// The dense free-node Jacobian at the free values `x`.
    pub fn jacobian(&mut self, x: &DVectorView<T>) -> DMatrix<T> {
        self.set_free_values(x);
        let mesh = self.system.mesh();
        let stiffness = self.system.stiffness();
        let mass = self.system.mass_diagonal();
        let free_nodes = mesh.free_nodes();

        let mut jacobian = DMatrix::zeros(free_nodes.len(), free_nodes.len());
        for (row, &i) in free_nodes.iter().enumerate() {
            let stiffness_row = stiffness.row(i);
            for (&j, &a_ij) in izip!(stiffness_row.col_indices(), stiffness_row.values()) {
                if let Some(col) = self.free_index[j] {
                    jacobian[(row, col)] += a_ij;
                }
            }
            jacobian[(row, row)] += mass[i] * self.nonlinearity.df(self.u[i]);
        }
        jacobian
    }

    pub fn into_solution(self) -> DVector<T> {
        self.u
    }

    fn set_free_values(&mut self, x: &DVectorView<T>) {
        let free_nodes = self.system.mesh().free_nodes();
        assert_eq!(x.len(), free_nodes.len());
        for (&node, &x_i) in izip!(free_nodes, x.iter()) {
            self.u[node] = x_i;
        }
    }
}

impl<'a, 'b, T, F> VectorFunction<T> for FreeNodeResidual<'a, 'b, T, F>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    fn dimension(&self) -> usize {
        self.system.mesh().free_nodes().len()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) {
        self.set_free_values(x);
        let residual = self.system.free_residual(self.nonlinearity, &self.u);
        f.copy_from(&residual);
        let norm = residual.norm();
        // The first evaluation is the initial iterate
        if let Some(iteration) = self.residual_norms.len().checked_sub(1) {
            info!("Global Newton iteration {}: residual {}.", iteration, norm);
        }
        self.residual_norms.push(norm);
    }
}

impl<'a, 'b, T, F> DifferentiableVectorFunction<T> for FreeNodeResidual<'a, 'b, T, F>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), Box<dyn Error>> {
        let jacobian = self.jacobian(x);
        let solution = jacobian
            .lu()
            .solve(rhs)
            .ok_or_else(|| Box::<dyn Error>::from("free-node Jacobian is singular"))?;
        sol.copy_from(&solution);
        Ok(())
    }
}

/// Solves the system with global Newton iterations on the free nodes, starting from `u`.
///
/// Each step solves `J e = r` and updates `u_f <- u_f - e`. Termination follows the same
/// rule as [`solve_relaxation`](crate::solver::solve_relaxation): stop once the free-node
/// residual norm is at most `tolerance * |r_0|`.
pub fn solve_global_newton<T, F>(
    system: &NonlinearSystem<T>,
    nonlinearity: &F,
    u: DVector<T>,
    settings: &SolverSettings<T>,
) -> Result<SolveReport<T>, SolveError>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    let initial_residual = system.free_residual_norm(nonlinearity, &u);
    if !initial_residual.is_finite() {
        return Err(SolveError::DivergentDerivative { node: None, iteration: 0 });
    }
    let absolute_tolerance = settings.tolerance * initial_residual;
    info!(
        "Global Newton: initial residual {}, absolute tolerance {}.",
        initial_residual, absolute_tolerance
    );

    let mut function = FreeNodeResidual::new(system, nonlinearity, u);
    let mut x = function.free_values();
    let mut f = DVector::zeros(x.len());
    let mut dx = DVector::zeros(x.len());

    let outcome = newton(
        &mut function,
        &mut x,
        &mut f,
        &mut dx,
        NewtonSettings {
            max_iterations: settings.max_iterations,
            tolerance: absolute_tolerance,
        },
    )?;

    // The first evaluation is the initial iterate
    let history: Vec<_> = function
        .residual_norms()
        .iter()
        .skip(1)
        .enumerate()
        .map(|(iteration, &residual)| IterationRecord { iteration, residual })
        .collect();

    let mut solution = function.into_solution();
    for (&node, &x_i) in izip!(system.mesh().free_nodes(), x.iter()) {
        solution[node] = x_i;
    }

    Ok(SolveReport {
        solution,
        iterations: outcome.iterations,
        convergence: outcome.convergence,
        initial_residual,
        absolute_tolerance,
        history,
        strategy: Strategy::GlobalNewton,
        sweep_stats: SweepStats::default(),
    })
}
