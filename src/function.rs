//! Named scalar functions used as source terms, boundary data and nonlinearities.
use crate::error::SolveError;
use nalgebra::{DVector, Point2};
use nlfem_optimize::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// A scalar function that can be used in any of the three roles of a nonlinear problem.
///
/// As a nonlinearity, `f` and `df` are evaluated pointwise on nodal values. As a source or
/// boundary term, `eval_at` is evaluated at spatial points.
pub trait ProblemFunction<T: Real> {
    fn f(&self, u: T) -> T;
    fn df(&self, u: T) -> T;
    fn eval_at(&self, point: &Point2<T>) -> T;

    fn f_vector(&self, u: &DVector<T>) -> DVector<T> {
        u.map(|u_i| self.f(u_i))
    }

    fn df_vector(&self, u: &DVector<T>) -> DVector<T> {
        u.map(|u_i| self.df(u_i))
    }

    fn eval_at_points(&self, points: &[Point2<T>]) -> DVector<T> {
        DVector::from_iterator(points.len(), points.iter().map(|p| self.eval_at(p)))
    }
}

impl<T: Real, X: ProblemFunction<T> + ?Sized> ProblemFunction<T> for &X {
    fn f(&self, u: T) -> T {
        X::f(self, u)
    }

    fn df(&self, u: T) -> T {
        X::df(self, u)
    }

    fn eval_at(&self, point: &Point2<T>) -> T {
        X::eval_at(self, point)
    }
}

/// The closed set of built-in functions.
///
/// | kind                 | `f(u)`    | `f'(u)`   | `g(x, y)`                     |
/// |----------------------|-----------|-----------|-------------------------------|
/// | `Zero`               | `0`       | `0`       | `0`                           |
/// | `One`                | `1`       | `0`       | `1`                           |
/// | `SourceCoupled`      | `u`       | `1`       | `2 pi^2 sin(pi x) sin(pi y)`  |
/// | `NonlinearReaction`  | `sinh(u)` | `cosh(u)` | `sinh(x + y)`                 |
/// | `Boltzmann`          | `exp(u)`  | `exp(u)`  | `exp(-(x^2 + y^2))`           |
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Zero,
    One,
    SourceCoupled,
    NonlinearReaction,
    Boltzmann,
}

impl FunctionKind {
    pub const ALL: [FunctionKind; 5] = [
        FunctionKind::Zero,
        FunctionKind::One,
        FunctionKind::SourceCoupled,
        FunctionKind::NonlinearReaction,
        FunctionKind::Boltzmann,
    ];

    /// The canonical name of the function.
    pub fn name(&self) -> &'static str {
        match self {
            FunctionKind::Zero => "zero",
            FunctionKind::One => "one",
            FunctionKind::SourceCoupled => "source_coupled",
            FunctionKind::NonlinearReaction => "nonlinear_reaction",
            FunctionKind::Boltzmann => "boltzmann",
        }
    }

    /// Looks up a function by name.
    ///
    /// Matching is case-insensitive, `-` is treated as `_`, and the short aliases
    /// `zeros`, `ones`, `sc`, `scnl` and `boltz` are accepted.
    pub fn from_name(name: &str) -> Result<Self, SolveError> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "zero" | "zeros" => Ok(FunctionKind::Zero),
            "one" | "ones" => Ok(FunctionKind::One),
            "source_coupled" | "sc" => Ok(FunctionKind::SourceCoupled),
            "nonlinear_reaction" | "scnl" => Ok(FunctionKind::NonlinearReaction),
            "boltzmann" | "boltz" => Ok(FunctionKind::Boltzmann),
            _ => Err(SolveError::UnknownFunctionName(name.to_string())),
        }
    }
}

impl Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FunctionKind {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
impl<T: Real> ProblemFunction<T> for FunctionKind {
    fn f(&self, u: T) -> T {
        match self {
            FunctionKind::Zero => 0.0,
            FunctionKind::One => 1.0,
            FunctionKind::SourceCoupled => u,
            FunctionKind::NonlinearReaction => u.sinh(),
            FunctionKind::Boltzmann => u.exp(),
        }
    }

    fn df(&self, u: T) -> T {
        match self {
            FunctionKind::Zero | FunctionKind::One => 0.0,
            FunctionKind::SourceCoupled => 1.0,
            FunctionKind::NonlinearReaction => u.cosh(),
            FunctionKind::Boltzmann => u.exp(),
        }
    }

    fn eval_at(&self, point: &Point2<T>) -> T {
        let (x, y) = (point.x, point.y);
        match self {
            FunctionKind::Zero => 0.0,
            FunctionKind::One => 1.0,
            FunctionKind::SourceCoupled => {
                let pi = T::pi();
                2.0 * pi * pi * (pi * x).sin() * (pi * y).sin()
            }
            FunctionKind::NonlinearReaction => (x + y).sinh(),
            FunctionKind::Boltzmann => (-(x * x + y * y)).exp(),
        }
    }
}
