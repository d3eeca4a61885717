use crate::error::SolveError;
use crate::function::FunctionKind;
use crate::mesh::procedural::RectangleMeshConfig;
use crate::mesh::FemMesh;
use crate::solver::{solve, SolveReport, SolverSettings};
use crate::system::NonlinearSystem;
use log::info;
use nalgebra::Scalar;
use nlfem_optimize::Real;
use serde::{Deserialize, Serialize};

/// The three functions that define a problem `-Δu + f(u) = g` with `u = h` on the boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemFunctions {
    /// `g`, the right-hand side.
    pub source: FunctionKind,
    /// `h`, the Dirichlet boundary data.
    pub boundary: FunctionKind,
    /// `f`, the nonlinear reaction term.
    pub nonlinearity: FunctionKind,
}

impl Default for ProblemFunctions {
    fn default() -> Self {
        Self {
            source: FunctionKind::Zero,
            boundary: FunctionKind::Boltzmann,
            nonlinearity: FunctionKind::NonlinearReaction,
        }
    }
}

impl ProblemFunctions {
    pub fn from_names(source: &str, boundary: &str, nonlinearity: &str) -> Result<Self, SolveError> {
        Ok(Self {
            source: FunctionKind::from_name(source)?,
            boundary: FunctionKind::from_name(boundary)?,
            nonlinearity: FunctionKind::from_name(nonlinearity)?,
        })
    }
}

/// A mesh together with the functions defining a nonlinear boundary value problem.
#[derive(Debug, Clone)]
pub struct NonlinearProblem<T: Scalar> {
    mesh: FemMesh<T>,
    functions: ProblemFunctions,
}

impl<T: Real> NonlinearProblem<T> {
    pub fn new(mesh: FemMesh<T>, functions: ProblemFunctions) -> Self {
        Self { mesh, functions }
    }

    /// Generates (and refines) a rectangle mesh according to `config`.
    pub fn from_config(config: &RectangleMeshConfig<T>, functions: ProblemFunctions) -> Result<Self, SolveError> {
        let triangle_mesh = config.build()?;
        let mesh = FemMesh::from_triangle_mesh(&triangle_mesh)?;
        info!(
            "Generated mesh with {} nodes ({} free) and {} triangles.",
            mesh.num_nodes(),
            mesh.free_nodes().len(),
            mesh.connectivity().len()
        );
        Ok(Self::new(mesh, functions))
    }

    pub fn mesh(&self) -> &FemMesh<T> {
        &self.mesh
    }

    pub fn functions(&self) -> &ProblemFunctions {
        &self.functions
    }

    pub fn system(&self) -> NonlinearSystem<T> {
        NonlinearSystem::assemble(&self.mesh, &self.functions.source)
    }

    /// Assembles the load vector, sets up the initial iterate from the boundary data and runs
    /// the outer iteration.
    pub fn solve(&self, settings: &SolverSettings<T>) -> Result<SolveReport<T>, SolveError> {
        let system = self.system();
        let u0 = system.initial_guess(&self.functions.boundary);
        solve(&system, &self.functions.nonlinearity, u0, settings)
    }
}

/// Solves `-Δu + f(u) = 0` with `u = exp(-(x^2 + y^2))` on the boundary, on the rectangle mesh
/// described by `mesh_config` (see [`RectangleMeshConfig::from_slice`]) and with default
/// solver settings.
///
/// The report is returned even if the iteration budget was exhausted.
pub fn solve_square<T: Real>(mesh_config: &[T], nonlinearity: &str) -> Result<SolveReport<T>, SolveError> {
    let config = RectangleMeshConfig::from_slice(mesh_config)?;
    let functions = ProblemFunctions {
        nonlinearity: FunctionKind::from_name(nonlinearity)?,
        ..ProblemFunctions::default()
    };
    NonlinearProblem::from_config(&config, functions)?.solve(&SolverSettings::default())
}
