//! LDAP Export
//!
//! Streams the results of one directory search into an LDIF file.
//!
//! # Usage
//!
//! ```bash
//! # Export every person below the base
//! ldapexport -s directory.json -b dc=example,dc=com -f '(objectClass=person)' -o people.ldif
//! ```

use std::path::Path;
use std::sync::Arc;
use tracing::{Level, info, warn};

use ldapexport::cli::CliInterface;
use ldapexport::error::Result;
use ldapexport::export::{ExportPipeline, ExportReport, ExportState, LdifFileSink, ProgressTracker};
use ldapexport::ldif::LdifCodec;
use ldapexport::MemoryDirectory;
use tokio_util::sync::CancellationToken;

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands or run the export
///
/// # Returns
/// * `Result<bool>` - Whether the export completed
async fn run() -> Result<bool> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(true);
    }

    let report = run_export(&cli).await?.into_result()?;
    Ok(report.status == ExportState::Completed)
}

/// Build the pipeline from the effective configuration and run it
async fn run_export(cli: &CliInterface) -> Result<ExportReport> {
    let config = cli.config();
    let query = cli.query_spec()?;

    let directory = MemoryDirectory::from_file(cli.snapshot_path()?)?;

    let output = cli.output_path();
    let token = CancellationToken::new();
    spawn_interrupt_handler(token.clone());

    let pipeline = ExportPipeline::new(
        Arc::new(directory),
        query,
        Box::new(LdifFileSink::new(&output)),
    )
    .with_codec(LdifCodec::new(config.format_params()))
    .with_ordering(config.attribute_ordering())
    .with_benign_codes(config.benign_codes())
    .with_version_header(config.export.write_version_header)
    .with_progress(Arc::new(ProgressTracker::new(cli.show_progress())))
    .with_cancellation(Arc::new(token));

    info!("Exporting to {}", output.display());
    let report = pipeline.execute().await;
    print_summary(cli, &report, &output);
    Ok(report)
}

/// Cancel the export on Ctrl+C. The pipeline stops before the next record
/// and still closes the output file.
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, stopping export");
                token.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });
}

fn print_summary(cli: &CliInterface, report: &ExportReport, output: &Path) {
    if cli.args().quiet {
        return;
    }
    let verb = match report.status {
        ExportState::Completed => "Exported",
        ExportState::Cancelled => "Cancelled after",
        _ => "Failed after",
    };
    println!(
        "{} {} records ({} bytes) in {:.2}s to {}",
        verb,
        report.records_exported,
        report.bytes_written,
        report.elapsed_ms as f64 / 1000.0,
        output.display()
    );
}

/// Initialize logging system based on verbosity level
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    // Log to stderr so the spinner and summary stay readable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
