//! Internal metrics for the exporter itself.

use std::{
    sync::{atomic::AtomicU64, Arc},
    time::Duration,
};

use once_cell::sync::Lazy;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use tally::{Collector, MetricDescriptor, MetricType, Sample, Unit};

#[derive(Debug, Default)]
pub(crate) struct ExporterMetrics {
    scrapes: Counter,
    last_scrape_duration: Gauge<f64, AtomicU64>,
    last_scraped_size: Gauge,
}

impl ExporterMetrics {
    pub(crate) fn observe_scrape(&self, latency: Duration, scraped_size: usize) {
        self.scrapes.inc();
        self.last_scrape_duration.set(latency.as_secs_f64());
        self.last_scraped_size
            .set(i64::try_from(scraped_size).unwrap_or(i64::MAX));
    }

    #[allow(clippy::cast_precision_loss)] // values are far below 2^52
    fn snapshot(&self) -> (f64, f64, f64) {
        (
            self.scrapes.get() as f64,
            self.last_scrape_duration.get(),
            self.last_scraped_size.get() as f64,
        )
    }
}

pub(crate) static EXPORTER_METRICS: Lazy<ExporterMetrics> = Lazy::new(ExporterMetrics::default);

/// Collector exposing metrics of the exporter server itself:
///
/// - `tally_exporter_scrapes`: number of served scrapes
/// - `tally_exporter_scrape_duration_seconds`: collection latency of the last scrape
/// - `tally_exporter_scraped_size_bytes`: size of the last scraped payload
///
/// Values are shared by all exporters in the process. Values for a scrape are updated after
/// it is served, so a scrape doesn't observe itself.
#[derive(Debug)]
pub struct ExporterMetricsCollector {
    scrapes: Arc<MetricDescriptor>,
    scrape_duration: Arc<MetricDescriptor>,
    scraped_size: Arc<MetricDescriptor>,
}

impl Default for ExporterMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetricsCollector {
    /// Creates a collector.
    pub fn new() -> Self {
        let scrapes = MetricDescriptor::new("tally_exporter_scrapes", "Number of served scrapes.")
            .with_type(MetricType::Counter);
        let scrape_duration = MetricDescriptor::new(
            "tally_exporter_scrape_duration",
            "Metrics collection latency of the last scrape.",
        )
        .with_unit(Unit::Seconds);
        let scraped_size = MetricDescriptor::new(
            "tally_exporter_scraped_size",
            "Size of the last scraped payload.",
        )
        .with_unit(Unit::Bytes);

        Self {
            scrapes: Arc::new(scrapes),
            scrape_duration: Arc::new(scrape_duration),
            scraped_size: Arc::new(scraped_size),
        }
    }
}

impl Collector for ExporterMetricsCollector {
    fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![
            self.scrapes.clone(),
            self.scrape_duration.clone(),
            self.scraped_size.clone(),
        ]
    }

    fn collect(&self) -> Vec<Sample> {
        let (scrapes, duration, size) = EXPORTER_METRICS.snapshot();
        [
            (&self.scrapes, scrapes),
            (&self.scrape_duration, duration),
            (&self.scraped_size, size),
        ]
        .into_iter()
        .filter_map(|(descriptor, value)| Sample::unlabeled(descriptor, value).ok())
        .collect()
    }
}
