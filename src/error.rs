//! Error type shared by mesh construction, function lookup and the nonlinear solvers.
use nlfem_optimize::newton::NewtonError;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug)]
pub enum SolveError {
    /// An iteration exhausted its budget before reaching the tolerance.
    ///
    /// The solvers themselves report exhaustion through
    /// [`Convergence`](crate::optimize::newton::Convergence); this variant is produced
    /// when a caller asks for a converged result, see
    /// [`SolveReport::into_converged`](crate::solver::SolveReport::into_converged).
    MaxIterationsExceeded { iterations: usize, residual: f64 },
    /// A Newton step met a zero (or non-finite) derivative. `node` is the mesh node whose
    /// scalar problem failed, if the failure happened inside a relaxation sweep.
    ///
    /// With `node: None` this also covers an outer residual that stopped being finite, which
    /// the driver and the global Newton solver report without any derivative involved.
    DivergentDerivative { node: Option<usize>, iteration: usize },
    /// The free and boundary node sets do not partition the node indices.
    InvalidMeshPartition(String),
    /// Mesh fields are inconsistent with each other (lengths, shapes, indices, areas).
    InvalidMesh(String),
    /// The scalar configuration sequence does not describe a valid rectangle mesh.
    InvalidMeshConfig(String),
    UnknownFunctionName(String),
    LinearSolveFailed(String),
}

impl Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &SolveError::MaxIterationsExceeded { iterations, residual } => {
                write!(
                    f,
                    "Failed to converge within maximum number of iterations ({}). Final residual: {:e}.",
                    iterations, residual
                )
            }
            &SolveError::DivergentDerivative { node: Some(node), iteration } => {
                write!(
                    f,
                    "Zero or non-finite derivative at node {} (Newton iteration {}).",
                    node, iteration
                )
            }
            &SolveError::DivergentDerivative { node: None, iteration } => {
                write!(
                    f,
                    "Zero or non-finite derivative, or non-finite residual, at iteration {}.",
                    iteration
                )
            }
            &SolveError::InvalidMeshPartition(ref reason) => {
                write!(f, "Free and boundary nodes do not partition the mesh nodes: {}", reason)
            }
            &SolveError::InvalidMesh(ref reason) => write!(f, "Invalid mesh: {}", reason),
            &SolveError::InvalidMeshConfig(ref reason) => write!(f, "Invalid mesh configuration: {}", reason),
            &SolveError::UnknownFunctionName(ref name) => write!(f, "Unknown function name \"{}\".", name),
            &SolveError::LinearSolveFailed(ref reason) => write!(f, "Linear solve failed: {}", reason),
        }
    }
}

impl Error for SolveError {}

impl From<NewtonError> for SolveError {
    fn from(err: NewtonError) -> Self {
        match err {
            NewtonError::DivergentDerivative { iteration } => SolveError::DivergentDerivative { node: None, iteration },
            NewtonError::JacobianError(err) => SolveError::LinearSolveFailed(err.to_string()),
        }
    }
}
