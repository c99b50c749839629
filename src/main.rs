//! Lead-Ripple main entry point
//!
//! This is the command-line interface for the Lead-Ripple enrichment engine.

use clap::Parser;
use lead_ripple::config::{load_config_with_hash, Config};
use lead_ripple::output::{
    generate_markdown_summary, generate_summary, load_statistics, print_run_summary,
    print_statistics, write_json_lines,
};
use lead_ripple::pipeline::{load_targets, Orchestrator, RunOptions, Target};
use lead_ripple::storage::{open_store, EnrichmentStore, Filter, MergeMode};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Lead-Ripple: a staged web enrichment engine
///
/// Lead-Ripple fetches the websites of a list of businesses under a shared
/// rate limit, extracts contact signals with staged fallback (homepage,
/// prioritized multi-page crawl, pattern guess) and merges the results into
/// a SQLite enrichment store without losing previously discovered data.
#[derive(Parser, Debug)]
#[command(name = "lead-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A staged web enrichment engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// JSON file with additional targets
    #[arg(long, value_name = "FILE")]
    targets: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Process every target, even those already enriched
    #[arg(long)]
    fresh: bool,

    /// Let this run replace existing non-empty fields
    #[arg(long)]
    overwrite: bool,

    /// Validate config and show what would be enriched without fetching
    #[arg(long, conflicts_with_all = ["stats", "export", "summary_input"])]
    dry_run: bool,

    /// Show statistics from the store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export", "summary_input"])]
    stats: bool,

    /// Export stored records as JSON lines and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "summary_input"])]
    export: bool,

    /// Export the summarization input shape as JSON lines and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export"])]
    summary_input: bool,

    /// Filter for --export/--summary-input (e.g. `emails?`, `pages_fetched>=2`), repeatable
    #[arg(long = "filter", value_name = "EXPR")]
    filters: Vec<String>,

    /// Columns for --export
    #[arg(long, value_delimiter = ',', value_name = "COLUMNS")]
    columns: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.stats {
        handle_stats(&config)?;
    } else if cli.export || cli.summary_input {
        handle_export(&config, &cli)?;
    } else {
        let targets = collect_targets(&config, cli.targets.as_deref())?;
        if cli.dry_run {
            handle_dry_run(&config, &targets);
        } else {
            handle_run(&config, targets, &cli, config_hash).await?;
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lead_ripple=info,warn"),
            1 => EnvFilter::new("lead_ripple=debug,info"),
            2 => EnvFilter::new("lead_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Targets from the config file followed by those from `--targets`
fn collect_targets(
    config: &Config,
    targets_file: Option<&Path>,
) -> Result<Vec<Target>, Box<dyn std::error::Error>> {
    let mut targets: Vec<Target> = config.targets.iter().map(Target::from_entry).collect();

    if let Some(path) = targets_file {
        let loaded = load_targets(path)?;
        tracing::info!("Loaded {} targets from {}", loaded.len(), path.display());
        targets.extend(loaded);
    }

    if targets.is_empty() {
        return Err("no targets: add [[target]] entries to the config or pass --targets".into());
    }

    Ok(targets)
}

/// Handles the --dry-run mode: validates config and shows what would be enriched
fn handle_dry_run(config: &Config, targets: &[Target]) {
    let enrichment = &config.enrichment;

    println!("=== Lead-Ripple Dry Run ===\n");

    println!("Enrichment Configuration:");
    println!("  Rate limit: {}/s (burst {})", enrichment.rate_limit_per_second, enrichment.capacity());
    println!("  Worker pool size: {}", enrichment.worker_pool_size);
    println!("  Per-target concurrency: {}", enrichment.per_target_concurrency);
    println!(
        "  Timeouts: stage 1 {}s, stage 2 {}s",
        enrichment.stage1_timeout_seconds, enrichment.stage2_timeout_seconds
    );
    println!("  Max pages per target: {}", enrichment.max_pages_per_target);
    println!("  Required signal: {:?}", enrichment.required_signal);
    println!("  Overwrite mode: {}", enrichment.overwrite_mode);
    println!("  Classify sites: {}", enrichment.classify_sites);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nExtra Denylisted Domains ({}):", config.denylist.len());
    for entry in &config.denylist {
        println!("  - {}", entry.domain);
    }

    println!("\nTargets ({}):", targets.len());
    for target in targets.iter().take(50) {
        let seed = target
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| format!("{} (invalid seed)", target.seed_url));
        println!("  - {} -> {}", target.entity_id, seed);
    }
    if targets.len() > 50 {
        println!("  ... and {} more", targets.len() - 50);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would enrich {} targets", targets.len());
}

/// Handles the --stats mode: shows statistics from the store
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --export and --summary-input: JSON lines on stdout
fn handle_export(config: &Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let filters = cli
        .filters
        .iter()
        .map(|expr| expr.parse::<Filter>())
        .collect::<Result<Vec<_>, _>>()?;

    let store = open_store(Path::new(&config.output.database_path))?;
    let mut stdout = std::io::stdout().lock();

    if cli.summary_input {
        let rows = store.summary_inputs(&filters)?;
        tracing::info!("Exporting {} summarization inputs", rows.len());
        write_json_lines(&mut stdout, &rows)?;
    } else {
        let rows = store.export(&filters, cli.columns.as_deref())?;
        tracing::info!("Exporting {} records", rows.len());
        write_json_lines(&mut stdout, &rows)?;
    }

    Ok(())
}

/// Handles the main enrichment run
async fn handle_run(
    config: &Config,
    targets: Vec<Target>,
    cli: &Cli,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    if cli.fresh {
        tracing::info!("Starting fresh run (reprocessing every target)");
    } else {
        tracing::info!("Starting run (targets with a verified email are skipped)");
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight fetches");
                cancel.cancel();
            }
        });
    }

    let mut store = open_store(Path::new(&config.output.database_path))?;
    let orchestrator = Orchestrator::new(config, cancel)?;
    let options = RunOptions {
        fresh: cli.fresh,
        merge_mode: MergeMode::from_overwrite(cli.overwrite || config.enrichment.overwrite_mode),
        config_hash: config_hash.clone(),
    };

    let stats = match orchestrator.run(targets, &mut store, &options).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Enrichment run failed: {}", e);
            return Err(e.into());
        }
    };

    let summary = generate_summary(&stats, &config_hash);
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;
    if !cli.quiet {
        print_run_summary(&summary);
    }
    tracing::info!("Summary written to {}", config.output.summary_path);

    Ok(())
}
