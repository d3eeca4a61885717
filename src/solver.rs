//! Outer iteration for the nonlinear system, with a choice of relaxation or global Newton.
use crate::error::SolveError;
use crate::function::ProblemFunction;
use crate::global_newton::solve_global_newton;
use crate::relaxation::{sweep_backward, sweep_forward, SweepStats};
use crate::system::NonlinearSystem;
use log::{info, warn};
use nalgebra::{DVector, Scalar};
use nlfem_optimize::newton::{Convergence, ScalarNewtonSettings};
use nlfem_optimize::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Alternating forward and backward nonlinear Gauss-Seidel sweeps.
    #[default]
    Relaxation,
    /// Newton iterations on the free nodes with a dense direct solve per step.
    GlobalNewton,
}

/// Settings for the outer iteration.
///
/// The outer iteration stops once the free-node residual norm is at most
/// `tolerance * |r_0|`, where `r_0` is the residual of the initial iterate.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(serialize = "T: Serialize", deserialize = "T: Real + Deserialize<'de>"))]
pub struct SolverSettings<T> {
    pub tolerance: T,
    pub max_iterations: usize,
    /// Settings for the per-node scalar solves. Unused by [`Strategy::GlobalNewton`].
    pub inner: ScalarNewtonSettings<T>,
    pub strategy: Strategy,
}

impl<T: Real> Default for SolverSettings<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 10,
            inner: ScalarNewtonSettings::default(),
            strategy: Strategy::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord<T> {
    /// Zero-based index of the outer iteration.
    pub iteration: usize,
    /// Free-node residual norm after the iteration.
    pub residual: T,
}

/// Result of an outer iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport<T: Scalar> {
    pub solution: DVector<T>,
    pub iterations: usize,
    pub convergence: Convergence<T>,
    pub initial_residual: T,
    /// The absolute tolerance `tolerance * initial_residual`.
    pub absolute_tolerance: T,
    pub history: Vec<IterationRecord<T>>,
    pub strategy: Strategy,
    /// Sweep counters, accumulated over all outer iterations. Zero for global Newton.
    pub sweep_stats: SweepStats,
}

impl<T: Real> SolveReport<T> {
    pub fn is_converged(&self) -> bool {
        self.convergence.is_converged()
    }

    /// Turns an exhausted iteration budget into [`SolveError::MaxIterationsExceeded`].
    pub fn into_converged(self) -> Result<Self, SolveError> {
        match self.convergence {
            Convergence::Converged(_) => Ok(self),
            Convergence::MaxIterationsExceeded(residual) => Err(SolveError::MaxIterationsExceeded {
                iterations: self.iterations,
                residual: residual.to_subset().unwrap_or(f64::NAN),
            }),
        }
    }
}

/// Solves the system from the initial iterate `u` with the strategy given in `settings`.
///
/// Only free entries of `u` are modified. The boundary entries are the Dirichlet data.
pub fn solve<T, F>(
    system: &NonlinearSystem<T>,
    nonlinearity: &F,
    u: DVector<T>,
    settings: &SolverSettings<T>,
) -> Result<SolveReport<T>, SolveError>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    match settings.strategy {
        Strategy::Relaxation => solve_relaxation(system, nonlinearity, u, settings),
        Strategy::GlobalNewton => solve_global_newton(system, nonlinearity, u, settings),
    }
}

/// Symmetric nonlinear Gauss-Seidel: each outer iteration is a forward sweep followed by a
/// backward sweep.
///
/// If the initial residual already satisfies the tolerance, the initial iterate is returned
/// after zero iterations. Exhausting `max_iterations` is reported through
/// [`Convergence::MaxIterationsExceeded`] together with the last iterate.
pub fn solve_relaxation<T, F>(
    system: &NonlinearSystem<T>,
    nonlinearity: &F,
    mut u: DVector<T>,
    settings: &SolverSettings<T>,
) -> Result<SolveReport<T>, SolveError>
where
    T: Real,
    F: ProblemFunction<T> + ?Sized,
{
    assert_eq!(u.len(), system.mesh().num_nodes(), "Iterate must have one entry per node.");

    let initial_residual = system.free_residual_norm(nonlinearity, &u);
    let absolute_tolerance = settings.tolerance * initial_residual;
    if !initial_residual.is_finite() {
        return Err(SolveError::DivergentDerivative { node: None, iteration: 0 });
    }
    info!(
        "Relaxation: initial residual {}, absolute tolerance {}.",
        initial_residual, absolute_tolerance
    );

    let mut residual = initial_residual;
    let mut history = Vec::new();
    let mut sweep_stats = SweepStats::default();
    let mut iteration = 0;

    while residual > absolute_tolerance {
        if iteration == settings.max_iterations {
            warn!(
                "Relaxation did not converge within {} iterations. Residual: {}.",
                iteration, residual
            );
            return Ok(SolveReport {
                solution: u,
                iterations: iteration,
                convergence: Convergence::MaxIterationsExceeded(residual),
                initial_residual,
                absolute_tolerance,
                history,
                strategy: Strategy::Relaxation,
                sweep_stats,
            });
        }

        sweep_stats += sweep_forward(system, nonlinearity, &mut u, &settings.inner)?;
        sweep_stats += sweep_backward(system, nonlinearity, &mut u, &settings.inner)?;
        residual = system.free_residual_norm(nonlinearity, &u);
        if !residual.is_finite() {
            return Err(SolveError::DivergentDerivative { node: None, iteration });
        }

        info!("Relaxation iteration {}: residual {}.", iteration, residual);
        history.push(IterationRecord { iteration, residual });
        iteration += 1;
    }

    Ok(SolveReport {
        solution: u,
        iterations: iteration,
        convergence: Convergence::Converged(residual),
        initial_residual,
        absolute_tolerance,
        history,
        strategy: Strategy::Relaxation,
        sweep_stats,
    })
}
