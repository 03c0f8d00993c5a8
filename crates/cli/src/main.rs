use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{resolve_locator_config, FileConfig, RunOverrides};
use log::{info, warn};
use plume_graph::{load_json, CoverageOutcome, DominanceIndex, FlowGraph, LoadStats, NodeId};
use plume_locator::Localizer;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use trace::JsonTrace;

mod config;
mod report;
mod trace;

#[derive(Parser)]
#[command(name = "plume")]
#[command(about = "Locate the source of a contamination event in a flow network", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// TOML config file with a [run] table
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a contamination event and localize its origin round by round
    Run(RunArgs),

    /// Show coverage sets derived from the dominator tree
    Coverage(CoverageArgs),
}

#[derive(Args)]
struct RunArgs {
    /// JSON array of edge records
    #[arg(long)]
    edges: PathBuf,

    /// Sink node id (overrides run.sink)
    #[arg(long)]
    sink: Option<u64>,

    /// Sensors placed per round (overrides run.sensors_per_round)
    #[arg(long)]
    sensors: Option<usize>,

    /// Hidden origin for the simulation; ignored unless upstream of the sink
    #[arg(long)]
    origin: Option<u64>,

    /// Seed for picking an arbitrary origin
    #[arg(long)]
    seed: Option<u64>,

    /// Write the step-by-step trace (JSON array) here
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Write a Markdown summary here
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct CoverageArgs {
    /// JSON array of edge records
    #[arg(long)]
    edges: PathBuf,

    /// Sink node id (overrides run.sink)
    #[arg(long)]
    sink: Option<u64>,

    /// Print the full coverage set of a single node
    #[arg(long)]
    node: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    match cli.command {
        Commands::Run(args) => run(&file_config, args),
        Commands::Coverage(args) => coverage(&file_config, args),
    }
}

fn run(file_config: &FileConfig, args: RunArgs) -> Result<()> {
    let locator_config = resolve_locator_config(
        file_config,
        RunOverrides {
            sink: args.sink,
            sensors_per_round: args.sensors,
            origin: args.origin,
            seed: args.seed,
        },
    )?;

    let (graph, stats) = load_graph(&args.edges)?;
    let outcome = build_coverage(&graph, locator_config.sink)?;

    let localizer = Localizer::new(&graph, outcome.index(), locator_config)
        .context("Failed to initialize localization")?;
    let mut trace = JsonTrace::default();
    let report = localizer.run_simulated(&mut trace);

    match report.found() {
        Some(origin) => info!("Origin {origin} found after {} rounds", report.rounds.len()),
        None => warn!(
            "No unique origin after {} rounds: {:?}",
            report.rounds.len(),
            report.termination
        ),
    }

    if let Some(path) = &args.trace {
        trace.write_to(path)?;
        info!("Trace with {} steps written to {}", trace.len(), path.display());
    }
    if let Some(path) = &args.report {
        let md = report::render_run_report(&report, &outcome, &stats);
        fs::write(path, md).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn coverage(file_config: &FileConfig, args: CoverageArgs) -> Result<()> {
    let sink = resolve_locator_config(
        file_config,
        RunOverrides {
            sink: args.sink,
            ..RunOverrides::default()
        },
    )?
    .sink;

    let (graph, _) = load_graph(&args.edges)?;
    let outcome = build_coverage(&graph, sink)?;
    let index = outcome.index();

    let mode = match &outcome {
        CoverageOutcome::Dominators(_) => json!({ "mode": "dominators" }),
        CoverageOutcome::Degenerate { cause, .. } => {
            json!({ "mode": "degenerate", "cause": cause.to_string() })
        }
    };

    let body = match args.node {
        Some(raw) => {
            let node = NodeId(raw);
            let set = index
                .coverage(node)
                .with_context(|| format!("Node {node} is not in the flow graph"))?;
            json!({
                "sink": sink,
                "coverage": mode,
                "node": node,
                "members": set,
            })
        }
        None => {
            let nodes: Vec<_> = index
                .iter()
                .map(|(id, set)| json!({ "id": id, "size": set.len() }))
                .collect();
            json!({
                "sink": sink,
                "coverage": mode,
                "nodes": nodes,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn load_graph(path: &Path) -> Result<(FlowGraph, LoadStats)> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let loaded = load_json(&raw).with_context(|| format!("Invalid {}", path.display()))?;
    Ok(loaded)
}

fn build_coverage(graph: &FlowGraph, sink: NodeId) -> Result<CoverageOutcome> {
    let outcome = DominanceIndex::build(graph, sink)?;
    if let CoverageOutcome::Degenerate { cause, .. } = &outcome {
        warn!("Using single-node coverage: {cause}");
    }
    Ok(outcome)
}
