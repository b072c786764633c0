//! Pull-based metrics exporter serving a [`tally::Registry`] over HTTP.
//!
//! The crate provides:
//!
//! - [`MetricsExporter`]: a `hyper` server exposing the registry on the metrics path
//!   (`/metrics` by default) and an index page on all other paths
//! - [`ShutdownCoordinator`]: translates termination signals into a single graceful
//!   shutdown request with a bounded drain
//! - [`ExporterConfig`] and [`logging`]: the configuration and log sink used by the
//!   `tally-exporter` binary
//! - [`ExampleCollector`]: a collector querying a synthetic data source
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally::Registry;
//! use tally_exporter::{
//!     ExampleCollector, ExporterConfig, ExporterMetricsCollector, MetricsExporter,
//!     ShutdownCoordinator,
//! };
//!
//! # async fn test() -> anyhow::Result<()> {
//! let config = ExporterConfig::load("exporter.yaml")?;
//! let mut registry = Registry::empty();
//! registry.register(ExampleCollector::default())?;
//! registry.register(ExporterMetricsCollector::new())?;
//!
//! let shutdown = ShutdownCoordinator::new();
//! tokio::spawn(shutdown.clone().listen_for_signals()?);
//! let server = MetricsExporter::new(Arc::new(registry))
//!     .with_format(config.format.into())
//!     .with_metrics_path(&config.metrics_path)
//!     .with_drain_timeout(config.shutdown_timeout)
//!     .with_graceful_shutdown(shutdown.stopped())
//!     .bind(config.socket_addr())
//!     .await?;
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

mod config;
mod example;
mod exporter;
pub mod logging;
mod metrics;
mod shutdown;

pub use crate::{
    config::{ConfigError, ExporterConfig, ExpositionFormat},
    example::{DataSource, DataSourceError, ExampleCollector, SyntheticSource},
    exporter::{MetricsExporter, MetricsServer, ServerError, ServerState},
    metrics::ExporterMetricsCollector,
    shutdown::{ShutdownCoordinator, ShutdownReason},
};
