//! CLI Entry Point for print_daq
//!
//! Provides command-line interface for:
//! - Recording a print (status audit, raw accelerometer log, rolling features)
//! - Querying the printer status once
//!
//! # Usage
//!
//! Record a print against a real printer:
//! ```bash
//! print_daq run --host 192.168.50.10 --session benchy
//! ```
//!
//! Dry run against the simulated printer:
//! ```bash
//! print_daq run --mock --output-dir /tmp/daq
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use print_daq::acquisition::{AcquisitionSession, SessionReport, SessionSinks, StatusSource};
use print_daq::config::{AcquisitionConfig, DEFAULT_CONFIG_PATH};
use print_daq::logging::{self, OutputFormat, TracingConfig};
use print_daq::mock::{SimulatedAccelerometer, SimulatedPrinter};
use print_daq::moonraker::{AdxlStreamClient, MoonrakerStatusClient};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "print_daq")]
#[command(about = "Temperature-gated accelerometer logging for 3D printers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record status, raw samples and rolling features until Ctrl+C
    Run {
        /// Configuration file (TOML format)
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Printer host, overriding the configuration
        #[arg(long)]
        host: Option<String>,

        /// Session name used as output file prefix
        #[arg(long)]
        session: Option<String>,

        /// Directory receiving the CSV files
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Use the simulated printer instead of real hardware
        #[arg(long)]
        mock: bool,

        /// Log output format: pretty, compact or json
        #[arg(long, default_value = "compact")]
        log_format: OutputFormat,
    },

    /// Query printer status once and report whether heaters are at target
    Status {
        /// Configuration file (TOML format)
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Printer host, overriding the configuration
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            host,
            session,
            output_dir,
            mock,
            log_format,
        } => {
            let mut config = load_config(&config, host)?;
            if let Some(session) = session {
                config.output.session_name = session;
            }
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            config.printer.mock |= mock;
            config.validate()?;

            let tracing_config = TracingConfig::from_config(&config)
                .map_err(|e| anyhow!(e))?
                .with_format(log_format);
            logging::init(tracing_config).map_err(|e| anyhow!(e))?;

            let report = record(config).await?;
            print_report(&report);
            Ok(())
        }
        Commands::Status { config, host } => {
            let config = load_config(&config, host)?;
            config.validate()?;
            logging::init_from_config(&config).map_err(|e| anyhow!(e))?;
            query_status(&config).await
        }
    }
}

fn load_config(path: &Path, host: Option<String>) -> Result<AcquisitionConfig> {
    let mut config = AcquisitionConfig::load_from(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    if let Some(host) = host {
        config.printer.host = host;
    }
    Ok(config)
}

async fn record(config: AcquisitionConfig) -> Result<SessionReport> {
    let sinks = SessionSinks::csv(&config.output).context("opening output files")?;
    let session = AcquisitionSession::new(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received");
            let _ = shutdown_tx.send(true);
        }
    });

    tracing::info!(
        session = %config.output.session_name,
        dir = %config.output.dir.display(),
        mock = config.printer.mock,
        "Recording print"
    );

    let report = if config.printer.mock {
        let printer = SimulatedPrinter::default();
        let connect = async { Ok(SimulatedAccelerometer::default()) };
        session.run(printer, connect, sinks, shutdown_rx).await?
    } else {
        let status = MoonrakerStatusClient::new(&config.printer)?;
        let connect = AdxlStreamClient::open(
            config.printer.stream_endpoint(),
            config.printer.sensor.clone(),
        );
        session.run(status, connect, sinks, shutdown_rx).await?
    };
    Ok(report)
}

async fn query_status(config: &AcquisitionConfig) -> Result<()> {
    let status = if config.printer.mock {
        SimulatedPrinter::default().query().await?
    } else {
        MoonrakerStatusClient::new(&config.printer)?.query().await?
    };

    println!("Bed:      {:.1} / {:.1} °C", status.bed_temp, status.bed_target);
    println!("Nozzle:   {:.1} / {:.1} °C", status.nozzle_temp, status.nozzle_target);
    println!("Progress: {:.1}%", status.progress * 100.0);
    println!(
        "Ready:    {}",
        if status.heaters_at_target() { "yes" } else { "no" }
    );
    Ok(())
}

fn print_report(report: &SessionReport) {
    println!();
    println!("Session finished");
    match report.triggered_at {
        Some(at) => println!("  Print start detected: {}", at.to_rfc3339()),
        None => println!("  Print start never detected"),
    }
    if let Some(at) = report.ingest.collection_started_at {
        println!("  Accelerometer logging started: {}", at.to_rfc3339());
    }
    println!(
        "  Status polls: {} ({} failed)",
        report.watcher.polls, report.watcher.failures
    );
    println!(
        "  Samples: {} recorded, {} discarded before start",
        report.ingest.accepted, report.ingest.gated_discarded
    );
    println!("  Feature records: {}", report.ingest.feature_records);
    if report.ingest.malformed_messages > 0 {
        println!("  Skipped messages: {}", report.ingest.malformed_messages);
    }
}
