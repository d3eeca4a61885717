use crate::{solve_linear_dense, unit_square_fem_mesh};
use matrixcompare::assert_matrix_eq;
use nlfem::function::{FunctionKind, ProblemFunction};
use nlfem::optimize::newton::{Convergence, ScalarNewtonSettings};
use nlfem::relaxation::{sweep_backward, sweep_forward};
use nlfem::solver::{solve, solve_relaxation, SolverSettings, Strategy};
use nlfem::system::NonlinearSystem;
use nlfem::SolveError;

fn settings(strategy: Strategy, tolerance: f64, max_iterations: usize) -> SolverSettings<f64> {
    SolverSettings {
        tolerance,
        max_iterations,
        strategy,
        // Sweeps stall once every nodal residual is below the inner tolerance
        inner: ScalarNewtonSettings {
            max_iterations: 20,
            tolerance: 1e-13,
            derivative_threshold: 1e-14,
        },
    }
}

#[test]
fn default_settings() {
    let settings = SolverSettings::<f64>::default();
    assert_eq!(settings.tolerance, 1e-6);
    assert_eq!(settings.max_iterations, 10);
    assert_eq!(settings.strategy, Strategy::Relaxation);
    assert_eq!(settings.inner, ScalarNewtonSettings::default());
    assert_eq!(settings.inner.max_iterations, 10);
    assert_eq!(settings.inner.tolerance, 1e-6);
}

#[test]
fn settings_deserialize_with_defaults() {
    let settings: SolverSettings<f64> = serde_json::from_str(r#"{ "max_iterations": 50 }"#).unwrap();
    assert_eq!(settings.max_iterations, 50);
    assert_eq!(settings.tolerance, 1e-6);
    assert_eq!(settings.strategy, Strategy::Relaxation);

    let settings: SolverSettings<f64> = serde_json::from_str(r#"{ "strategy": "global_newton", "tolerance": 1e-9 }"#).unwrap();
    assert_eq!(settings.strategy, Strategy::GlobalNewton);
    assert_eq!(settings.tolerance, 1e-9);
    assert_eq!(settings.max_iterations, 10);

    let json = serde_json::to_string(&SolverSettings::<f64>::default()).unwrap();
    let roundtrip: SolverSettings<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(roundtrip, SolverSettings::default());
}

#[test]
fn already_converged_initial_guess_takes_zero_iterations() {
    let mesh = unit_square_fem_mesh(4);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::Zero);
    let u0 = system.initial_guess(&FunctionKind::Zero);

    for strategy in [Strategy::Relaxation, Strategy::GlobalNewton] {
        let report = solve(&system, &FunctionKind::NonlinearReaction, u0.clone(), &settings(strategy, 1e-6, 10)).unwrap();
        assert_eq!(report.iterations, 0);
        assert!(report.history.is_empty());
        assert_eq!(report.convergence, Convergence::Converged(0.0));
        assert_eq!(report.solution, u0);
        assert_eq!(report.strategy, strategy);
    }
}

#[test]
fn linear_problem_matches_direct_solve() {
    let mesh = unit_square_fem_mesh(4);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::One);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);
    let u_direct = solve_linear_dense(&system, &u0);

    let report = solve(&system, &FunctionKind::Zero, u0.clone(), &settings(Strategy::Relaxation, 1e-10, 500)).unwrap();
    assert!(report.is_converged());
    assert!(report.iterations > 1);
    assert_matrix_eq!(report.solution, u_direct, comp = abs, tol = 1e-8);

    let report = solve(&system, &FunctionKind::Zero, u0, &settings(Strategy::GlobalNewton, 1e-10, 10)).unwrap();
    assert!(report.is_converged());
    assert_eq!(report.iterations, 1);
    assert_matrix_eq!(report.solution, u_direct, comp = abs, tol = 1e-10);
}

#[test]
fn relaxation_report_is_consistent() {
    let mesh = unit_square_fem_mesh(4);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::SourceCoupled);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);
    let nonlinearity = FunctionKind::NonlinearReaction;

    let report = solve_relaxation(&system, &nonlinearity, u0.clone(), &settings(Strategy::Relaxation, 1e-8, 500)).unwrap();
    assert!(report.is_converged());
    assert_eq!(report.history.len(), report.iterations);
    assert_eq!(report.initial_residual, system.free_residual_norm(&nonlinearity, &u0));
    assert_eq!(report.absolute_tolerance, 1e-8 * report.initial_residual);

    let final_residual = system.free_residual_norm(&nonlinearity, &report.solution);
    assert_eq!(report.convergence, Convergence::Converged(final_residual));
    assert!(final_residual <= report.absolute_tolerance);
    for (index, record) in report.history.iter().enumerate() {
        assert_eq!(record.iteration, index);
    }
    assert_eq!(report.history.last().unwrap().residual, final_residual);

    // Two sweeps per iteration over all free nodes
    let free = mesh.free_nodes().len();
    assert_eq!(report.sweep_stats.nodes_updated, 2 * free * report.iterations);
}

#[test]
fn exhausted_iteration_budget_is_reported() {
    let mesh = unit_square_fem_mesh(4);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::Zero);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);

    let report = solve(&system, &FunctionKind::NonlinearReaction, u0.clone(), &settings(Strategy::Relaxation, 1e-14, 2)).unwrap();
    assert_eq!(report.iterations, 2);
    assert_eq!(report.history.len(), 2);
    assert!(!report.is_converged());
    let residual = report.convergence.residual();
    assert!(matches!(report.convergence, Convergence::MaxIterationsExceeded(_)));
    assert!(residual < report.initial_residual);

    let err = report.into_converged().unwrap_err();
    assert!(matches!(err, SolveError::MaxIterationsExceeded { iterations: 2, residual: r } if r == residual));

    // A zero budget returns the initial iterate
    let report = solve(&system, &FunctionKind::NonlinearReaction, u0.clone(), &settings(Strategy::Relaxation, 1e-6, 0)).unwrap();
    assert_eq!(report.iterations, 0);
    assert_eq!(report.solution, u0);
    assert_eq!(report.convergence, Convergence::MaxIterationsExceeded(report.initial_residual));
}

#[test]
fn boundary_values_are_preserved_by_both_strategies() {
    let mesh = unit_square_fem_mesh(4);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::SourceCoupled);
    let boundary = FunctionKind::Boltzmann;
    let u0 = system.initial_guess(&boundary);

    for strategy in [Strategy::Relaxation, Strategy::GlobalNewton] {
        let report = solve(&system, &FunctionKind::Boltzmann, u0.clone(), &settings(strategy, 1e-8, 200)).unwrap();
        assert!(report.is_converged());
        for &node in mesh.boundary_nodes() {
            assert_eq!(report.solution[node], boundary.eval_at(&mesh.vertices()[node]));
        }
    }
}

#[test]
fn relaxation_and_global_newton_agree() {
    let mesh = unit_square_fem_mesh(4);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::Zero);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);
    let nonlinearity = FunctionKind::NonlinearReaction;

    let relaxation = solve(&system, &nonlinearity, u0.clone(), &settings(Strategy::Relaxation, 1e-11, 500))
        .unwrap()
        .into_converged()
        .unwrap();
    let newton = solve(&system, &nonlinearity, u0, &settings(Strategy::GlobalNewton, 1e-11, 20))
        .unwrap()
        .into_converged()
        .unwrap();

    assert!(newton.iterations < relaxation.iterations);
    assert_matrix_eq!(relaxation.solution, newton.solution, comp = abs, tol = 1e-9);
}

#[test]
fn converged_solution_is_a_fixed_point_of_the_sweeps() {
    let mesh = unit_square_fem_mesh(4);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::SourceCoupled);
    let u0 = system.initial_guess(&FunctionKind::Boltzmann);
    let nonlinearity = FunctionKind::NonlinearReaction;
    let settings = settings(Strategy::Relaxation, 1e-10, 500);

    let report = solve(&system, &nonlinearity, u0, &settings).unwrap().into_converged().unwrap();
    let mut u = report.solution.clone();
    sweep_forward(&system, &nonlinearity, &mut u, &settings.inner).unwrap();
    sweep_backward(&system, &nonlinearity, &mut u, &settings.inner).unwrap();

    for &node in mesh.free_nodes() {
        assert!((u[node] - report.solution[node]).abs() < settings.tolerance);
    }
}

#[test]
fn non_finite_residual_is_reported_without_node() {
    let mesh = unit_square_fem_mesh(3);
    let system = NonlinearSystem::assemble(&mesh, &FunctionKind::One);
    let mut u0 = system.initial_guess(&FunctionKind::Zero);
    // A boundary node coupled to a free node
    u0[1] = f64::INFINITY;

    for strategy in [Strategy::Relaxation, Strategy::GlobalNewton] {
        let err = solve(&system, &FunctionKind::Zero, u0.clone(), &settings(strategy, 1e-6, 10)).unwrap_err();
        assert!(
            matches!(err, SolveError::DivergentDerivative { node: None, iteration: 0 }),
            "unexpected error: {:?}",
            err
        );
        assert!(err.to_string().contains("non-finite residual"));
    }
}
