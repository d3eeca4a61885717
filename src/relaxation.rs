//! Nonlinear Gauss-Seidel relaxation.
//!
//! A sweep visits the nodes in index order (forward) or reverse index order (backward). At
//! each free node `i` it solves the scalar equation
//!
//! ```text
//! A(i, i) x + M(i) f(x) + sum_{j != i} A(i, j) u(j) - b(i) = 0
//! ```
//!
//! with scalar Newton iterations started from `u(i)`, and overwrites `u(i)` with the result
//! before moving on. Boundary nodes are never touched.
//!
//! The derivative threshold of the inner settings is relative: at node `i` it is scaled by
//! `|A(i, i)| + |M(i)|`. The inner tolerance is absolute.
use crate::assembly::global::csr_row_split;
use crate::error::SolveError;
use crate::function::ProblemFunction;
use crate::system::NonlinearSystem;
use log::warn;
use nalgebra::DVector;
use nlfem_optimize::calculus::ScalarFunction;
use nlfem_optimize::newton::{newton_scalar, NewtonError, ScalarNewtonSettings};
use nlfem_optimize::Real;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// The scalar equation `stiffness * x + mass * f(x) + off_diagonal_minus_load = 0` for a
/// single node, with the other nodal values frozen.
#[derive(Debug, Clone, Copy)]
pub struct NodalProblem<'a, T, F: ?Sized> {
    /// `sum_{j != i} A(i, j) u(j) - b(i)`.
    pub off_diagonal_minus_load: T,
    /// `A(i, i)`.
    pub stiffness: T,
    /// `M(i, i)`.
    pub mass: T,
    pub nonlinearity: &'a F,
}

impl<'a, T, F> ScalarFunction<T> for NodalProblem<'a, T, F>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    fn eval(&self, x: T) -> T {
        self.stiffness * x + self.mass * self.nonlinearity.f(x) + self.off_diagonal_minus_load
    }

    fn derivative(&self, x: T) -> T {
        self.stiffness + self.mass * self.nonlinearity.df(x)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepDirection {
    Forward,
    Backward,
}

/// Counters collected during one or more sweeps.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    pub nodes_updated: usize,
    /// Scalar solves that exhausted their iteration budget. The last iterate is kept.
    pub unconverged_nodes: usize,
    pub newton_iterations: usize,
}

impl AddAssign for SweepStats {
    fn add_assign(&mut self, rhs: Self) {
        self.nodes_updated += rhs.nodes_updated;
        self.unconverged_nodes += rhs.unconverged_nodes;
        self.newton_iterations += rhs.newton_iterations;
    }
}

pub fn sweep_forward<T, F>(
    system: &NonlinearSystem<T>,
    nonlinearity: &F,
    u: &mut DVector<T>,
    settings: &ScalarNewtonSettings<T>,
) -> Result<SweepStats, SolveError>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    let n = u.len();
    relax_nodes(system, nonlinearity, u, settings, 0..n)
}

pub fn sweep_backward<T, F>(
    system: &NonlinearSystem<T>,
    nonlinearity: &F,
    u: &mut DVector<T>,
    settings: &ScalarNewtonSettings<T>,
) -> Result<SweepStats, SolveError>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    let n = u.len();
    relax_nodes(system, nonlinearity, u, settings, (0..n).rev())
}

pub fn sweep<T, F>(
    system: &NonlinearSystem<T>,
    nonlinearity: &F,
    u: &mut DVector<T>,
    settings: &ScalarNewtonSettings<T>,
    direction: SweepDirection,
) -> Result<SweepStats, SolveError>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    match direction {
        SweepDirection::Forward => sweep_forward(system, nonlinearity, u, settings),
        SweepDirection::Backward => sweep_backward(system, nonlinearity, u, settings),
    }
}

fn relax_nodes<T, F>(
    system: &NonlinearSystem<T>,
    nonlinearity: &F,
    u: &mut DVector<T>,
    settings: &ScalarNewtonSettings<T>,
    nodes: impl Iterator<Item = usize>,
) -> Result<SweepStats, SolveError>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    let mesh = system.mesh();
    assert_eq!(u.len(), mesh.num_nodes(), "Iterate must have one entry per node.");

    let stiffness = system.stiffness();
    let mass = system.mass_diagonal();
    let load = system.load();
    let mut stats = SweepStats::default();

    for i in nodes {
        if !mesh.is_free(i) {
            continue;
        }

        let (diagonal, off_diagonal) = csr_row_split(stiffness, i, Some(&*u));
        let problem = NodalProblem {
            off_diagonal_minus_load: off_diagonal - load[i],
            stiffness: diagonal,
            mass: mass[i],
            nonlinearity,
        };
        let node_settings = ScalarNewtonSettings {
            derivative_threshold: settings.derivative_threshold * (diagonal.abs() + mass[i].abs()),
            ..*settings
        };

        let result = newton_scalar(&problem, u[i], &node_settings).map_err(|err| match err {
            NewtonError::DivergentDerivative { iteration } => SolveError::DivergentDerivative {
                node: Some(i),
                iteration,
            },
            err => SolveError::from(err),
        })?;

        if !result.convergence.is_converged() {
            warn!(
                "Scalar Newton at node {} did not converge in {} iterations (|g| = {}).",
                i,
                result.iterations,
                result.convergence.residual()
            );
            stats.unconverged_nodes += 1;
        }

        u[i] = result.solution;
        stats.nodes_updated += 1;
        stats.newton_iterations += result.iterations;
    }

    Ok(stats)
}
