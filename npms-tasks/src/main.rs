//! npms-tasks - Main entry point
//!
//! Maintenance commands for the npms analysis pipeline. Each command runs to
//! completion, tears down its client handles within a bounded time, and exits
//! with a code derived from the failure kind.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use npms_common::config::{ConfigResolver, ConfigSource, TomlConfig};
use npms_common::NormalizeOptions;
use npms_tasks::couchdb::CouchDbClient;
use npms_tasks::dispatcher::DispatchOptions;
use npms_tasks::queue::RabbitMqQueue;
use npms_tasks::stats::StatsReporter;
use npms_tasks::tasks;
use npms_tasks::{Denylist, TaskError};
use tracing::{error, info, warn};

/// Command-line arguments for npms-tasks
#[derive(Parser, Debug)]
#[command(name = "npms-tasks")]
#[command(about = "Maintenance tasks for the npms analysis pipeline")]
#[command(version)]
struct Args {
    /// Config file (overrides NPMS_CONFIG and the default locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set (e.g. debug, info, warn)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find packages that were not analyzed and enqueue them
    EnqueueMissing {
        /// Compute and list the missing packages without enqueuing them
        #[arg(long, visible_alias = "dr")]
        dry_run: bool,
    },

    /// Normalize a package.json file and print the result
    Normalize {
        /// Registry name of the package
        name: String,

        /// Path to the raw package.json
        file: PathBuf,

        /// Keep the name found in the file instead of the registry name
        #[arg(long)]
        no_check_name: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Config is resolved before tracing so the log level can come from it
    let (config, source) = match ConfigResolver::new().resolve(args.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("npms-tasks: {}", e);
            return ExitCode::from(TaskError::from(e).exit_code());
        }
    };

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    if let Err(e) = npms_common::logging::init_tracing(level) {
        eprintln!("npms-tasks: {}", e);
        return ExitCode::from(TaskError::from(e).exit_code());
    }

    info!(
        "Starting npms-tasks (git: {}, built: {}, profile: {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    log_config_source(&source);

    let result = match args.command {
        Command::EnqueueMissing { dry_run } => run_enqueue_missing(&config, dry_run),
        Command::Normalize {
            name,
            file,
            no_check_name,
        } => run_normalize(&name, &file, !no_check_name),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn log_config_source(source: &ConfigSource) {
    match source {
        ConfigSource::CommandLine(path) => info!("Config: {} (command line)", path.display()),
        ConfigSource::Environment(path) => info!("Config: {} (NPMS_CONFIG)", path.display()),
        ConfigSource::UserFile(path) | ConfigSource::SystemFile(path) => {
            info!("Config: {}", path.display())
        }
        ConfigSource::CompiledDefaults => warn!("No config file found, using compiled defaults"),
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<TaskError>()
        .map(TaskError::exit_code)
        .unwrap_or(1)
}

fn run_enqueue_missing(config: &TomlConfig, dry_run: bool) -> anyhow::Result<()> {
    let settings = &config.enqueue_missing;
    let shutdown_timeout = Duration::from_secs(settings.shutdown_timeout_secs);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(async {
        let source_timeout = Duration::from_secs(config.couchdb.request_timeout_secs);
        let registry = CouchDbClient::new(&config.couchdb.npm_addr, source_timeout)
            .map_err(TaskError::from)?;
        let analysis = CouchDbClient::new(&config.couchdb.npms_addr, source_timeout)
            .map_err(TaskError::from)?;
        // A dry run never writes, so it does not need the broker
        let queue = if dry_run {
            RabbitMqQueue::new(&config.queue)
        } else {
            RabbitMqQueue::connect(&config.queue).await
        }
        .map_err(TaskError::from)?;

        let denylist = Denylist::from(config.blacklist.clone());
        let options = DispatchOptions {
            concurrency: settings.concurrency,
            dry_run,
            progress_every: settings.progress_every,
        };

        info!(
            registry = %registry.display_url(),
            analysis = %analysis.display_url(),
            queue = %queue.display_addr(),
            denylisted = denylist.len(),
            dry_run,
            "Running enqueue-missing"
        );

        let stats = StatsReporter::spawn(Duration::from_secs(settings.stats_interval_secs));
        let outcome =
            tasks::enqueue_missing::run(&registry, &analysis, &queue, &denylist, &options).await;

        stats.stop();
        let closed = tasks::teardown(&queue, shutdown_timeout).await;

        let report = outcome?;
        closed?;
        info!(
            missing = report.missing_count,
            enqueued = report.enqueued,
            dry_run = report.dry_run,
            "enqueue-missing finished"
        );
        Ok::<(), TaskError>(())
    });

    runtime.shutdown_timeout(shutdown_timeout);
    info!("Shutdown complete");

    result.context("enqueue-missing failed")
}

fn run_normalize(name: &str, file: &Path, check_name: bool) -> anyhow::Result<()> {
    let options = NormalizeOptions { check_name };
    let package_json = tasks::normalize::run(name, file, options)
        .with_context(|| format!("Failed to normalize {}", file.display()))?;

    let output = serde_json::to_string_pretty(&package_json).map_err(TaskError::from)?;
    println!("{}", output);
    Ok(())
}
