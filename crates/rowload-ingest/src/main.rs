//! Rowload - Main entry point
//!
//! Exit status: 0 when every file loaded, 1 when at least one file failed,
//! 2 when the run could not start or was aborted.

use anyhow::Context;
use clap::Parser;
use rowload_common::logging::init_logging;
use rowload_ingest::discovery::discover_files;
use rowload_ingest::{Cli, FileSkipLog, LoadOrchestrator, LoaderConfig, PgTableSink, RunSummary};
use std::process::ExitCode;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Environment variables take precedence over the flags
    let log_config = match cli.log_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid logging configuration: {:#}", e);
            return ExitCode::from(2);
        },
    };

    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {:#}", e);
            return ExitCode::from(2);
        },
    };

    match execute(&cli).await {
        Ok(Some(summary)) if summary.has_failures() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Run failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        },
    }
}

/// Load configuration and run. `None` when only validating.
async fn execute(cli: &Cli) -> anyhow::Result<Option<RunSummary>> {
    let config = LoaderConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from '{}'", cli.config.display()))?
        .apply_env()?;
    let config = cli.apply_overrides(config);
    let settings = config.to_settings()?;

    if cli.validate_only {
        let files = discover_files(
            &settings.root_dir,
            &settings.extension,
            std::slice::from_ref(&config.skip_log),
        )?;
        info!(count = files.len(), "Configuration is valid");
        for path in &files {
            println!("{}", path.display());
        }
        return Ok(None);
    }

    let skip_log = FileSkipLog::open(&config.skip_log).with_context(|| {
        format!("Failed to open skip log '{}'", config.skip_log.display())
    })?;
    let sink = PgTableSink::connect(&config.database).await?;

    let mut orchestrator = LoadOrchestrator::new(settings, sink, skip_log);
    let summary = match orchestrator.run().await {
        Ok(summary) => summary,
        Err(e) => {
            let partial = orchestrator.summary();
            println!(
                "Aborted after {} of {} files loaded: {} rows committed in {} batches",
                partial.files_done(),
                partial.files.len(),
                partial.rows_inserted(),
                partial.batches_inserted()
            );
            return Err(e.into());
        },
    };

    for file in summary.files.iter().filter(|f| f.error.is_some()) {
        warn!(
            path = %file.path.display(),
            state = %file.state,
            error = file.error.as_deref().unwrap_or_default(),
            "File not loaded"
        );
    }
    if summary.skip_log_failures() > 0 {
        warn!(
            count = summary.skip_log_failures(),
            path = %config.skip_log.display(),
            "Some skipped rows could not be written to the skip log"
        );
    }

    println!(
        "Loaded {} of {} files: {} rows inserted in {} batches, {} rows skipped",
        summary.files_done(),
        summary.files.len(),
        summary.rows_inserted(),
        summary.batches_inserted(),
        summary.rows_skipped()
    );

    Ok(Some(summary))
}
