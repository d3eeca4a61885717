use nalgebra::RealField;

pub use nalgebra;

/// Calculus helper traits and numerical differentiation
pub mod calculus;
/// Newton iterations for scalar and vector equations
pub mod newton;

/// Real scalar type used throughout the Newton routines.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
