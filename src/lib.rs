//! Finite element solver for the nonlinear elliptic problem
//!
//! ```text
//! -Δu + f(u) = g  in Ω,
//!           u = h  on ∂Ω,
//! ```
//!
//! discretized with linear (P1) triangles on a rectangle. The discrete system
//! `A u + M f(u) = b` on the free nodes is solved either by symmetric nonlinear Gauss-Seidel
//! relaxation or by global Newton iterations.
pub mod accumulate;
pub mod assembly;
pub mod error;
pub mod function;
pub mod global_newton;
pub mod mesh;
pub mod problem;
pub mod relaxation;
pub mod solver;
pub mod system;

pub mod optimize {
    pub use nlfem_optimize::*;
}

pub use error::SolveError;
pub use nlfem_optimize::Real;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
