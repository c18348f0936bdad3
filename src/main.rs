//! treeprogress CLI entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use treeprogress::core::{
    AllocationTree, EventScript, Executor, ProducerEvent, ProgressAggregator, ProgressSnapshot,
};
use treeprogress::{Config, ProgressDisplay};

#[derive(Parser)]
#[command(name = "treeprogress", version, about = "Hierarchical weighted progress aggregation")]
struct Cli {
    /// Config file (defaults to ./treeprogress.yml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load an allocation tree and check its weights
    Check {
        tree: PathBuf,
        /// Print the tree, with every weight filled in, as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay an event script against a tree, drawing the progress bar
    Replay {
        tree: PathBuf,
        events: PathBuf,
        #[arg(long)]
        width: Option<usize>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Print the final snapshot as JSON instead of drawing the bar
        #[arg(long)]
        json: bool,
    },
}

fn load_tree(path: &Path) -> Result<AllocationTree> {
    let tree = AllocationTree::from_file(path)
        .with_context(|| format!("Failed to load tree {}", path.display()))?;
    tree.validate()
        .with_context(|| format!("Inconsistent weights in {}", path.display()))?;
    Ok(tree)
}

fn check(path: &Path, json: bool) -> Result<()> {
    let tree = load_tree(path)?;
    log::info!("Loaded {} allocations", tree.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&tree.to_spec())?);
    } else {
        print!("{}", tree);
    }
    Ok(())
}

fn print_summary(snapshot: &ProgressSnapshot) {
    println!("Progress: {:.1}%", snapshot.progress * 100.0);
    for status in &snapshot.allocations {
        let path = if status.path.is_empty() {
            status.description.as_str()
        } else {
            status.path.as_str()
        };
        println!("  {}: {}/{}", path, status.completed, status.total);
    }
}

async fn replay(config: Config, tree: &Path, events: &Path, json: bool) -> Result<()> {
    let tree = Arc::new(load_tree(tree)?);
    let producers = EventScript::from_file(events)
        .and_then(|script| script.resolve(&tree))
        .with_context(|| format!("Failed to load events {}", events.display()))?;

    let mut aggregator = ProgressAggregator::new(tree);
    let mut worker = None;
    if !json {
        // The display overwrites the line above it
        println!();
        let (display, handle) = ProgressDisplay::stdout(config.progress_bar());
        aggregator = aggregator.with_display(display);
        worker = Some(handle);
    }
    let aggregator = Arc::new(aggregator);

    let (executor, mut event_rx) = Executor::new(aggregator.clone());
    let executor = executor.with_delay(config.delay());

    let logger = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let ProducerEvent::Failed { producer, error } = &event {
                log::warn!("Producer {} failed: {}", producer, error);
            } else {
                log::debug!("{:?}", event);
            }
        }
    });

    let result = executor.run(producers).await;
    drop(executor);

    let snapshot = aggregator.snapshot();
    let unfinished = aggregator.unfinished();
    // Last handle to the display goes with the aggregator
    drop(aggregator);

    if let Some(worker) = worker {
        let _ = worker.await;
    }
    let _ = logger.await;

    let report = result?;
    log::info!(
        "Applied {} events from {} producers",
        report.events,
        report.producers
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_summary(&snapshot);
        if !unfinished.is_empty() {
            println!("Unfinished: {}", unfinished.join(", "));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; keep them quiet by default so they don't tear the bar
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Check { tree, json } => check(&tree, json),
        Command::Replay {
            tree,
            events,
            width,
            label,
            delay_ms,
            json,
        } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(width) = width {
                config.bar_width = width;
            }
            if let Some(label) = label {
                config.label = label;
            }
            if let Some(delay_ms) = delay_ms {
                config.delay_ms = delay_ms;
            }
            config.validate()?;

            replay(config, &tree, &events, json).await
        }
    }
}
