//! Retrace CLI - replay captured traffic against a service build

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retrace_core::prelude::*;

#[derive(Parser)]
#[command(name = "retrace")]
#[command(about = "Replay captured traces with recorded outbound responses", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the newest captured document for the configured service
    Run {
        /// Replay in memory only: no checkpoints, cache, or notification
        #[arg(long)]
        dry_run: bool,
    },
    /// Summarize a trace document on disk
    Inspect {
        /// Path to the document
        file: PathBuf,
    },
    /// Checkpoint maintenance
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
    /// Version information
    Version,
}

#[derive(Subcommand, Clone, Copy)]
enum CheckpointCommands {
    /// Print the last attempted index of each domain
    Show,
    /// Delete every domain checkpoint
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("retrace {}", env!("CARGO_PKG_VERSION"));
            println!("retrace-core {}", retrace_core::VERSION);
        }
        Commands::Run { dry_run } => {
            let config = ReplayConfig::load()?;
            let summary = if dry_run {
                dry_run_replay(config).await?
            } else {
                full_replay(config).await?
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Inspect { file } => inspect(&file)?,
        Commands::Checkpoint { command } => {
            let config = ReplayConfig::load_unvalidated()?;
            for domain in ReplayDomain::ORDER {
                let checkpoint = FileCheckpoint::for_domain(&config.storage.checkpoint_dir, domain);
                match command {
                    CheckpointCommands::Show => match checkpoint.load()? {
                        Some(index) => println!("{}: last attempted {}", domain, index),
                        None => println!("{}: none", domain),
                    },
                    CheckpointCommands::Clear => {
                        checkpoint.clear()?;
                        println!("{}: cleared {}", domain, checkpoint.path().display());
                    }
                }
            }
        }
    }

    Ok(())
}

async fn full_replay(config: ReplayConfig) -> Result<ReplaySummary> {
    let runner =
        ReplayRunner::from_config(config, Arc::new(DryRunReplayer), Arc::new(NoopExporter))?;

    let token = runner.orchestrator().cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current trace");
            token.cancel();
        }
    });

    Ok(runner.run().await?)
}

async fn dry_run_replay(config: ReplayConfig) -> Result<ReplaySummary> {
    // Fetch directly so an interrupted full run keeps its cached document
    let source = ObjectStoreSource::new(&config.source)?;
    let text = source.fetch_latest(&config.identity.object_prefix()).await?;
    let plan = ReplayPlan::partition(TraceDocument::from_json(&text)?)?;

    let mut orchestrator = ReplayOrchestrator::new(Arc::new(NoopExporter));
    for domain in ReplayDomain::ORDER {
        orchestrator = orchestrator.with_domain(
            domain,
            Arc::new(DryRunReplayer),
            Arc::new(MemoryCheckpoint::new()),
        );
    }

    Ok(orchestrator.replay(&plan).await?)
}

fn inspect(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let plan = ReplayPlan::partition(TraceDocument::from_json(&text)?)?;

    for domain in ReplayDomain::ORDER {
        let traces = plan.traces(domain);
        println!("{} ({} traces)", domain, traces.len());
        for (index, trace) in traces.iter().enumerate() {
            println!(
                "  [{}] {} {} ({} recorded calls)",
                index,
                trace.trace_id(),
                trace.root.describe(),
                trace.calls.len()
            );
        }
    }
    println!("unclassified: {}", plan.unclassified());
    for trace_id in plan.quarantined_ids() {
        println!("quarantined: {}", trace_id);
    }

    Ok(())
}
