use crate::calculus::{DifferentiableVectorFunction, ScalarFunction};
use crate::Real;
use log::debug;
use nalgebra::{DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Outcome of a bounded iteration.
///
/// Both variants carry the norm of the residual at the final iterate. Exhausting the
/// iteration budget is a regular outcome and not an error, but callers that require
/// convergence must check for it.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Convergence<T> {
    Converged(T),
    MaxIterationsExceeded(T),
}

impl<T: Copy> Convergence<T> {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged(_))
    }

    pub fn residual(&self) -> T {
        match *self {
            Convergence::Converged(r) | Convergence::MaxIterationsExceeded(r) => r,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonSettings<T> {
    pub max_iterations: usize,
    pub tolerance: T,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonOutcome<T> {
    pub iterations: usize,
    pub convergence: Convergence<T>,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarNewtonSettings<T> {
    pub max_iterations: usize,
    pub tolerance: T,
    /// Derivatives with magnitude at or below this threshold are treated as zero.
    ///
    /// The threshold is absolute. Callers that know the scale of the derivative should
    /// scale it accordingly.
    pub derivative_threshold: T,
}

impl<T: Real> Default for ScalarNewtonSettings<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance: 1e-6,
            derivative_threshold: 1e-14,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScalarNewtonResult<T> {
    pub solution: T,
    pub iterations: usize,
    pub convergence: Convergence<T>,
}

#[derive(Debug)]
pub enum NewtonError {
    /// A Newton step could not be taken because the derivative vanished or
    /// the function produced a non-finite value.
    DivergentDerivative { iteration: usize },
    /// The procedure failed because solving the Jacobian system failed.
    JacobianError(Box<dyn Error>),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &NewtonError::DivergentDerivative { iteration } => {
                write!(f, "Zero or non-finite derivative encountered at Newton iteration {}.", iteration)
            }
            &NewtonError::JacobianError(ref err) => {
                write!(f, "Failed to solve Jacobian system. Error: {}", err)
            }
        }
    }
}

impl Error for NewtonError {}

/// Attempts to solve the scalar equation `g(x) = 0`, starting from `x0`.
///
/// Iterates `x <- x - g(x) / g'(x)` until `|g(x)| <= tolerance` or the iteration budget is
/// exhausted. The last iterate is returned in both cases, and the outcome is reported through
/// [`Convergence`]. If the derivative vanishes (in the sense of
/// [`ScalarNewtonSettings::derivative_threshold`]) or any evaluation is not finite, no step
/// is taken and [`NewtonError::DivergentDerivative`] is returned instead.
pub fn newton_scalar<T, G>(g: G, x0: T, settings: &ScalarNewtonSettings<T>) -> Result<ScalarNewtonResult<T>, NewtonError>
where
    T: Real,
    G: ScalarFunction<T>,
{
    let mut x = x0;
    let mut g_x = g.eval(x);
    let mut iter = 0;

    if !g_x.is_finite() {
        return Err(NewtonError::DivergentDerivative { iteration: iter });
    }

    while g_x.abs() > settings.tolerance {
        if iter == settings.max_iterations {
            return Ok(ScalarNewtonResult {
                solution: x,
                iterations: iter,
                convergence: Convergence::MaxIterationsExceeded(g_x.abs()),
            });
        }

        let dg_x = g.derivative(x);
        if !dg_x.is_finite() || dg_x.abs() <= settings.derivative_threshold {
            return Err(NewtonError::DivergentDerivative { iteration: iter });
        }

        let x_next = x - g_x / dg_x;
        let g_next = g.eval(x_next);
        if !x_next.is_finite() || !g_next.is_finite() {
            return Err(NewtonError::DivergentDerivative { iteration: iter });
        }

        x = x_next;
        g_x = g_next;
        iter += 1;
    }

    Ok(ScalarNewtonResult {
        solution: x,
        iterations: iter,
        convergence: Convergence::Converged(g_x.abs()),
    })
}

/// Attempts to solve the non-linear equation F(u) = 0.
///
/// No heap allocation is performed. The solution is said to have converged if
/// ```|F(u)|_2 <= tolerance```.
///
/// Each iteration solves `J(u) e = F(u)` and updates `u <- u - e`. `f` and `dx` are
/// workspace buffers with the same length as `x`. On return, `f` holds `F(x)` at the final
/// iterate.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn newton<'a, T, F>(
    mut function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
) -> Result<NewtonOutcome<T>, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction<T>,
{
    let mut x = x.into();
    let mut f = f.into();
    let mut correction = dx.into();

    assert_eq!(x.nrows(), f.nrows());
    assert_eq!(correction.nrows(), f.nrows());

    function.eval_into(&mut f, &DVectorView::from(&x));

    let mut iter = 0;
    let mut f_norm = f.norm();

    while f_norm > settings.tolerance {
        if iter == settings.max_iterations {
            return Ok(NewtonOutcome {
                iterations: iter,
                convergence: Convergence::MaxIterationsExceeded(f_norm),
            });
        }

        // Solve the system J e = f, then x <- x - e
        function
            .solve_jacobian_system(&mut correction, &DVectorView::from(&x), &DVectorView::from(&f))
            .map_err(NewtonError::JacobianError)?;
        x.axpy(-1.0, &correction, 1.0);

        function.eval_into(&mut f, &DVectorView::from(&x));
        f_norm = f.norm();
        if !f_norm.is_finite() {
            return Err(NewtonError::DivergentDerivative { iteration: iter });
        }

        iter += 1;
        debug!("Newton iteration {}: |F| = {}", iter, f_norm);
    }

    Ok(NewtonOutcome {
        iterations: iter,
        convergence: Convergence::Converged(f_norm),
    })
}
