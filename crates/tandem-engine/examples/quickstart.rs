//! Coupled transient solve example.
//!
//! Demonstrates: register fields → derived couplings → block structure →
//! adaptive time stepping with one refused step → persisted run-time
//! metadata.
//!
//! Run with `RUST_LOG=info` (or `debug`) to see the solver log.

use tandem_core::SolutionStore;
use tandem_engine::{
    Collaborators, JsonSolutionStore, Problem, ProblemConfig, SolveMode, SolveOrchestrator,
    SolveOutcome, TimeStepMethod,
};
use tandem_test_utils::fixtures::{current, elasticity, transient_heat};
use tandem_test_utils::{ScriptedSolverFactory, StubGeometry, StubMesher};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Tandem Quickstart ===\n");

    let cache = tempfile::tempdir().unwrap();
    let config = ProblemConfig {
        total_time: 5.0,
        initial_time_step: 1.0,
        time_step_method: TimeStepMethod::Adaptive,
        cache_dir: cache.path().to_path_buf(),
        session: "quickstart".into(),
        ..Default::default()
    };

    let mut problem = Problem::new(config).unwrap();
    problem.add_field(current("J")).unwrap();
    problem.add_field(transient_heat("T")).unwrap();
    problem
        .add_field(elasticity("u").with_time_skip(2.0))
        .unwrap();

    println!("Couplings:");
    for c in problem.couplings().couplings() {
        println!("  {} -> {} ({:?})", c.source, c.target, c.strength);
    }

    let (solvers, journal) = ScriptedSolverFactory::new()
        .with_step_length(1.0)
        .refuse_estimate(2, 0.5)
        .build();
    let runtime = cache.path().join("quickstart").join("runtime.json");
    let mut orchestrator = SolveOrchestrator::new(
        problem,
        Collaborators {
            solvers,
            mesher: Box::new(StubMesher::new(6)),
            geometry: Box::new(StubGeometry::new(6)),
            store: Box::new(JsonSolutionStore::new(&runtime)),
        },
    );

    let report = match orchestrator.solve(SolveMode::Full) {
        Ok(SolveOutcome::Completed(report)) => report,
        Ok(SolveOutcome::AlreadySolving) => unreachable!("fresh orchestrator"),
        Err(e) => {
            eprintln!("solve failed: {e}");
            std::process::exit(1);
        }
    };

    println!("\nBlocks:");
    for b in orchestrator.blocks() {
        println!("  {}: {}", b.id(), b.label());
    }

    println!("\nTime steps: {:?}", orchestrator.time_steps().lengths());
    println!(
        "Iterations: {}, retries: {}, final time: {}",
        report.iterations, report.retries, report.final_time
    );
    for m in &report.metrics.blocks {
        println!(
            "  {:>6}: solves={} estimates={} skipped={} time={}μs",
            m.label, m.solves, m.estimates, m.skipped, m.elapsed_us
        );
    }
    println!("Engine calls: {}", journal.calls().len());

    let reopened = JsonSolutionStore::open(&runtime).unwrap();
    println!(
        "Persisted solutions: {} (last time step of T: {:?})",
        reopened.index().len(),
        reopened.last_time_step(tandem_core::FieldId(1), tandem_core::SolutionMode::Normal),
    );
}
