//! `tally-exporter` binary: serves the example collector and exporter self-metrics.

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use tally::Registry;
use tally_exporter::{
    logging, ExampleCollector, ExporterConfig, ExporterMetricsCollector, MetricsExporter,
    ServerError, ShutdownCoordinator,
};

/// Time given to blocking collection threads to finish after the server stops.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Example pull-based metrics exporter.
#[derive(Debug, Parser)]
#[command(name = "tally-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML config file.
    config: PathBuf,
    /// Path to the log file. Logs are appended to it.
    #[arg(long, default_value = logging::DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // `--help` and `--version` are reported as errors printed to stdout.
            let code = u8::from(err.use_stderr());
            err.print().ok();
            return ExitCode::from(code);
        }
    };

    let _log_guard = match logging::init(&cli.log_file) {
        Ok(guard) => guard,
        Err(err) => {
            let err = anyhow::Error::new(err);
            eprintln!("Failed to set up logging: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = ExporterConfig::load(&cli.config)
        .with_context(|| format!("Failed to read config file `{}`", cli.config.display()))?;
    tracing::info!(?config, "Loaded config");

    let mut registry = Registry::empty();
    registry
        .register(ExampleCollector::default())
        .context("Failed registering example collector")?;
    registry
        .register(ExporterMetricsCollector::new())
        .context("Failed registering exporter metrics")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed creating Tokio runtime")?;
    let result = runtime.block_on(serve(config, registry));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

async fn serve(config: ExporterConfig, registry: Registry) -> anyhow::Result<()> {
    let bind_address = config.socket_addr();
    let shutdown = ShutdownCoordinator::new();
    let signal_listener = shutdown
        .clone()
        .listen_for_signals()
        .context("Failed subscribing to termination signals")?;
    let server = MetricsExporter::new(Arc::new(registry))
        .with_format(config.format.into())
        .with_metrics_path(&config.metrics_path)
        .with_drain_timeout(config.shutdown_timeout)
        .with_graceful_shutdown(shutdown.stopped())
        .bind(bind_address)
        .await
        .with_context(|| format!("Failed binding to {bind_address}"))?;
    tracing::info!("Starting exporter on {}", server.local_addr());

    let signals = tokio::spawn(signal_listener);
    let result = server.start().await;
    signals.abort();
    let reason = shutdown.reason();
    match result {
        Ok(()) => {
            tracing::info!(?reason, "Exporter shut down gracefully");
            Ok(())
        }
        Err(err @ ServerError::DrainTimedOut { .. }) => {
            tracing::warn!(%err, ?reason, "Failed to shut down server gracefully");
            Ok(())
        }
        Err(err) => Err(err).context("Metrics server failed"),
    }
}
