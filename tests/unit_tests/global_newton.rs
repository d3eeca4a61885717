use crate::unit_square_fem_mesh;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;
use nlfem::function::FunctionKind;
use nlfem::global_newton::{solve_global_newton, FreeNodeResidual};
use nlfem::mesh::procedural::RectangleMeshConfig;
use nlfem::mesh::{FemMesh, FemMeshParts};
use nlfem::optimize::calculus::{approximate_jacobian, VectorFunction};
use nlfem::solver::{SolverSettings, Strategy};
use nlfem::system::NonlinearSystem;
use nlfem::SolveError;
use std::f64::consts::PI;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

fn newton_settings(tolerance: f64, max_iterations: usize) -> SolverSettings<f64> {
    SolverSettings {
        tolerance,
        max_iterations,
        strategy: Strategy::GlobalNewton,
        ..SolverSettings::default()
    }
}

#[test]
fn free_node_jacobian_matches_finite_differences() {
    let mesh = unit_square_fem_mesh(4);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::SourceCoupled);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);

    for nonlinearity in [FunctionKind::NonlinearReaction, FunctionKind::Boltzmann, FunctionKind::SourceCoupled] {
        let mut function = FreeNodeResidual::new(&system, &nonlinearity, u0.clone());
        let x = DVector::from_fn(function.dimension(), |i, _| 0.1 * i as f64 - 0.3);

        let jacobian = function.jacobian(&DVectorView::from(&x));
        let approx = approximate_jacobian(&mut function, &x, 1e-6);
        assert_matrix_eq!(jacobian, approx, comp = abs, tol = 1e-6);
    }
}

#[test]
fn free_node_residual_keeps_boundary_values() {
    let mesh = unit_square_fem_mesh(3);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::One);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);

    let mut function = FreeNodeResidual::new(&system, &FunctionKind::NonlinearReaction, u0.clone());
    assert_eq!(function.dimension(), mesh.free_nodes().len());

    let x = DVector::repeat(function.dimension(), 0.25);
    let mut f = DVector::zeros(function.dimension());
    function.eval_into(&mut DVectorViewMut::from(&mut f), &DVectorView::from(&x));

    let mut u = u0.clone();
    for &node in mesh.free_nodes() {
        u[node] = 0.25;
    }
    assert_eq!(f, system.free_residual(&FunctionKind::NonlinearReaction, &u));
    assert_eq!(function.residual_norms(), &[f.norm()]);
    assert_eq!(function.free_values(), x);

    let solution = function.into_solution();
    for &node in mesh.boundary_nodes() {
        assert_eq!(solution[node], u0[node]);
    }
}

#[test]
fn global_newton_converges_quadratically() {
    let mesh = unit_square_fem_mesh(6);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::SourceCoupled);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);

    let report = solve_global_newton(&system, &FunctionKind::NonlinearReaction, u0, &newton_settings(1e-12, 20)).unwrap();
    assert!(report.is_converged());
    assert!(report.iterations <= 8, "took {} iterations", report.iterations);
    assert_eq!(report.history.len(), report.iterations);
    assert_eq!(report.strategy, Strategy::GlobalNewton);
    assert_eq!(report.sweep_stats.nodes_updated, 0);

    let last = report.history.last().unwrap();
    assert_eq!(last.iteration, report.iterations - 1);
    assert_eq!(last.residual, report.convergence.residual());
    assert!(last.residual <= report.absolute_tolerance);
}

#[test]
fn global_newton_without_free_nodes() {
    let structured = unit_square_fem_mesh(1);
    let mesh = FemMesh::from_parts(FemMeshParts {
        vertices: structured.vertices().to_vec(),
        connectivity: structured.connectivity().to_vec(),
        areas: structured.areas().clone(),
        stiffness: structured.stiffness().clone(),
        mass: structured.mass().clone(),
        free_nodes: vec![],
        boundary_nodes: vec![0, 1, 2, 3],
    })
    .unwrap();
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::One);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);

    let report = solve_global_newton(&system, &FunctionKind::Boltzmann, u0.clone(), &newton_settings(1e-6, 10)).unwrap();
    assert!(report.is_converged());
    assert_eq!(report.iterations, 0);
    assert_eq!(report.solution, u0);
}

#[test]
fn singular_jacobian_is_reported() {
    let structured = unit_square_fem_mesh(2);
    let n = structured.num_nodes();
    let mesh = FemMesh::from_parts(FemMeshParts {
        vertices: structured.vertices().to_vec(),
        connectivity: structured.connectivity().to_vec(),
        areas: structured.areas().clone(),
        stiffness: CsrMatrix::zeros(n, n),
        mass: CsrMatrix::identity(n),
        free_nodes: structured.free_nodes().to_vec(),
        boundary_nodes: structured.boundary_nodes().to_vec(),
    })
    .unwrap();
    let system = NonlinearSystem::from_load(&mesh, DVector::repeat(n, 1.0));
    let u0 = DVector::zeros(n);

    let err = solve_global_newton(&system, &FunctionKind::Zero, u0, &newton_settings(1e-6, 10)).unwrap_err();
    assert!(matches!(err, SolveError::LinearSolveFailed(_)), "unexpected error: {:?}", err);
}

/// Largest nodal error of the discrete solution of `-Δu = 2π² sin(πx) sin(πy)` with zero
/// boundary data, whose exact solution is `sin(πx) sin(πy)`.
fn manufactured_solution_error(cell_size: f64) -> f64 {
    let config = RectangleMeshConfig::from_slice(&[0.0, 1.0, 0.0, 1.0, cell_size, 0.0]).unwrap();
    let mesh = FemMesh::from_triangle_mesh(&config.build().unwrap()).unwrap();
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::SourceCoupled);
    let u0 = system.initial_guess(&FunctionKind::Zero);

    let report = solve_global_newton(&system, &FunctionKind::Zero, u0, &newton_settings(1e-12, 5))
        .unwrap()
        .into_converged()
        .unwrap();

    mesh.vertices()
        .iter()
        .zip(report.solution.iter())
        .map(|(p, u)| (u - (PI * p.x).sin() * (PI * p.y).sin()).abs())
        .fold(0.0, f64::max)
}

#[test]
fn manufactured_solution_converges_under_refinement() {
    let coarse = manufactured_solution_error(1.0 / 8.0);
    let fine = manufactured_solution_error(1.0 / 16.0);
    assert!(coarse < 5e-2, "coarse error {}", coarse);
    assert!(fine < coarse / 3.0, "coarse error {}, fine error {}", coarse, fine);
}

/// Records log messages together with the thread that emitted them, so that tests running in
/// parallel only see their own messages.
struct ThreadLogger {
    messages: Mutex<Vec<(ThreadId, String)>>,
}

impl log::Log for ThreadLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let message = (thread::current().id(), record.args().to_string());
        self.messages.lock().unwrap().push(message);
    }

    fn flush(&self) {}
}

static LOGGER: ThreadLogger = ThreadLogger {
    messages: Mutex::new(Vec::new()),
};

fn install_logger() {
    // Fails harmlessly if another test installed it first
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Info);
}

fn messages_from_current_thread() -> Vec<String> {
    let id = thread::current().id();
    LOGGER
        .messages
        .lock()
        .unwrap()
        .iter()
        .filter(|(thread, _)| *thread == id)
        .map(|(_, message)| message.clone())
        .collect()
}

#[test]
fn residuals_are_logged_as_they_are_evaluated() {
    install_logger();
    let mesh = unit_square_fem_mesh(3);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::One);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);
    let mut function = FreeNodeResidual::new(&system, &FunctionKind::NonlinearReaction, u0);

    let mut f = DVector::zeros(function.dimension());
    let x0 = function.free_values();
    function.eval_into(&mut DVectorViewMut::from(&mut f), &DVectorView::from(&x0));
    assert!(messages_from_current_thread().is_empty());

    let x1 = DVector::repeat(function.dimension(), 0.5);
    function.eval_into(&mut DVectorViewMut::from(&mut f), &DVectorView::from(&x1));
    assert_eq!(
        messages_from_current_thread(),
        vec![format!("Global Newton iteration 0: residual {}.", f.norm())]
    );
}
