//! harness-multi - Parallel test-suite orchestrator
//!
//! Runs many independent test-suite files through an external harness
//! under a bounded concurrency pool, then merges the per-suite outcomes
//! into one structured report and a renumbered TAP-v13 document.
//!
//! ## Features
//!
//! - Two scheduling lanes: a default lane bounded only by the pool size
//!   and an exclusive lane limited to one concurrent run (e.g. a single
//!   browser instance)
//! - Per-run harness configuration artifacts with guaranteed cleanup
//! - Ephemeral port allocation so concurrent runs never collide
//! - Optional bail-out: skip remaining suites after the first failure
//! - Merged TAP v13 output with one contiguous case numbering
//!
//! ## Usage
//!
//! ```bash
//! # Run every configured suite
//! harness-multi run --config harness-multi.json
//!
//! # Preview lane classification
//! harness-multi list
//!
//! # Write an example configuration
//! harness-multi config init
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod cli;
mod config;
mod executor;
mod harness;
mod models;
mod output;
mod ports;
mod report;

use cli::Args;
use config::ConfigFile;
use executor::Orchestrator;
use harness::ProcessHarness;
use models::ProgressEvent;
use output::{OutputFormat, ResultFormatter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        cli::Command::Run(run_args) => {
            run_suites(run_args).await?;
        }
        cli::Command::List(list_args) => {
            list_tasks(list_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<ConfigFile> {
    match path {
        Some(path) => ConfigFile::load(path),
        None => ConfigFile::load_default(),
    }
}

async fn run_suites(args: cli::RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?.config;

    if let Some(pool_size) = args.pool_size {
        config.pool_size = pool_size;
    }
    if args.bail_out {
        config.output.bail_out = true;
    }

    let formatter = ResultFormatter::new(
        OutputFormat::from_str(&args.format)
            .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?,
    );

    let harness = ProcessHarness::new(config.harness.clone())
        .with_coverage(config.output.coverage.clone())
        .detect_version()
        .await;

    info!(
        "Running {} suite(s) with pool size {}",
        config.tasks().len(),
        config.pool_size
    );

    let mut orchestrator = Orchestrator::new(config, harness);

    // Stream progress lines while the orchestration runs.
    let mut progress = orchestrator
        .take_progress()
        .expect("progress stream taken once");
    let quiet = args.quiet;
    let printer = tokio::spawn(async move {
        while let Some(event) = progress.recv().await {
            if quiet && matches!(event, ProgressEvent::Case { .. }) {
                continue;
            }
            println!("{event}");
        }
    });

    let result = orchestrator.run().await?;
    let _ = printer.await;

    println!("{}", formatter.format_report(&result.report));

    if let Some(path) = args.output {
        std::fs::write(&path, &result.tap)?;
        info!("TAP document written to {}", path);
    }

    // Failing tests are expressed through the report, not the exit code.
    Ok(())
}

fn list_tasks(args: cli::ListArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?.config;
    let tasks = config.tasks();

    println!("\n{} task(s), pool size {}\n", tasks.len(), config.pool_size);
    println!("──────────────────────────────────────────────────────────────────────");
    for task in &tasks {
        println!(
            "  {:40} {:10} {}",
            task.display_name(),
            task.lane.to_string(),
            task.launcher
        );
    }
    println!("──────────────────────────────────────────────────────────────────────\n");

    Ok(())
}

fn manage_config(args: cli::ConfigArgs) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = std::path::Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            let file = ConfigFile {
                path: None,
                config: ConfigFile::example(),
            };
            file.save(path)?;
            println!("✓ Configuration file created: {output}");
        }

        cli::ConfigAction::Validate { file } => {
            let path = match file {
                Some(path) => path,
                None => ConfigFile::find()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_else(|| "./harness-multi.json".to_string()),
            };

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {path}");
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Show { format } => {
            let config = ConfigFile::load_default()?.config;
            let output = if format == "yaml" {
                serde_yaml::to_string(&config)?
            } else {
                serde_json::to_string_pretty(&config)?
            };
            println!("{output}");
        }
    }

    Ok(())
}
