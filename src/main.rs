//! Solves `-Δu + f(u) = g` on a rectangle with Dirichlet data `h` and prints the convergence
//! history and the nodal solution.
use clap::{Parser, ValueEnum};
use eyre::WrapErr;
use nlfem::mesh::procedural::RectangleMeshConfig;
use nlfem::optimize::newton::Convergence;
use nlfem::problem::{NonlinearProblem, ProblemFunctions};
use nlfem::solver::{SolverSettings, Strategy};
use std::path::PathBuf;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum StrategyArg {
    Relaxation,
    GlobalNewton,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Relaxation => Strategy::Relaxation,
            StrategyArg::GlobalNewton => Strategy::GlobalNewton,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, allow_negative_numbers = true)]
struct Args {
    /// Rectangle mesh: x_min,x_max,y_min,y_max,cell_size[,refinements].
    #[arg(long, value_delimiter = ',', default_values_t = [0.0, 1.0, 0.0, 1.0, 0.25])]
    mesh: Vec<f64>,

    /// Source term g.
    #[arg(long, default_value = "zero")]
    source: String,

    /// Dirichlet boundary data h.
    #[arg(long, default_value = "boltzmann")]
    boundary: String,

    /// Nonlinear reaction term f.
    #[arg(long, default_value = "nonlinear_reaction")]
    nonlinearity: String,

    /// JSON file with solver settings. Command line options take precedence.
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Relative tolerance on the free-node residual norm.
    #[arg(long)]
    tolerance: Option<f64>,

    #[arg(long)]
    max_iterations: Option<usize>,
}

fn main() -> eyre::Result<()> {
    // Also forwards records from the `log` facade. Stdout is reserved for results.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();

    let mut settings: SolverSettings<f64> = match &args.settings {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read settings file {}", path.display()))?;
            serde_json::from_str(&json).wrap_err("failed to parse solver settings")?
        }
        None => SolverSettings::default(),
    };
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy.into();
    }
    if let Some(tolerance) = args.tolerance {
        settings.tolerance = tolerance;
    }
    if let Some(max_iterations) = args.max_iterations {
        settings.max_iterations = max_iterations;
    }

    let config = RectangleMeshConfig::from_slice(&args.mesh)?;
    let functions = ProblemFunctions::from_names(&args.source, &args.boundary, &args.nonlinearity)?;
    let problem = NonlinearProblem::from_config(&config, functions)?;
    println!(
        "Mesh: {} nodes, {} free, {} triangles.",
        problem.mesh().num_nodes(),
        problem.mesh().free_nodes().len(),
        problem.mesh().connectivity().len()
    );

    let report = problem.solve(&settings)?;
    println!("Initial residual: {:e}", report.initial_residual);
    for record in &report.history {
        println!("Iteration {:>4}: residual {:e}", record.iteration, record.residual);
    }
    match report.convergence {
        Convergence::Converged(residual) => {
            println!("Converged after {} iterations (residual {:e}).", report.iterations, residual)
        }
        Convergence::MaxIterationsExceeded(residual) => eprintln!(
            "Warning: no convergence within {} iterations (residual {:e}).",
            report.iterations, residual
        ),
    }

    println!("Solution:");
    for (vertex, value) in problem.mesh().vertices().iter().zip(report.solution.iter()) {
        println!("{:>12.6} {:>12.6} {:>16.8e}", vertex.x, vertex.y, value);
    }

    Ok(())
}
