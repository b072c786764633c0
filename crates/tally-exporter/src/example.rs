//! Example collector bridging a (synthetic) data source to the `tally` exposition model.

use std::{fmt, iter, sync::Arc};

use tally::{Collector, LastError, MetricDescriptor, Sample};

/// Value reported for every example sample.
const SAMPLE_VALUE: f64 = 42.0;
/// Auxiliary label value; the data source doesn't supply one.
const SECOND_LABEL_VALUE: &str = "second label";

/// Error querying a [`DataSource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DataSourceError {
    message: String,
}

impl DataSourceError {
    /// Creates an error with the specified message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn no_readings() -> Self {
        Self::new("data source returned no readings")
    }
}

/// Source of raw numeric readings queried on each scrape.
///
/// Implemented for closures returning `Result<Vec<f64>, DataSourceError>`.
pub trait DataSource: Send + Sync + 'static {
    /// Queries readings. May block.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is (temporarily) unavailable.
    fn readings(&self) -> Result<Vec<f64>, DataSourceError>;
}

impl<F> DataSource for F
where
    F: Fn() -> Result<Vec<f64>, DataSourceError> + Send + Sync + 'static,
{
    fn readings(&self) -> Result<Vec<f64>, DataSourceError> {
        self()
    }
}

/// Deterministic data source yielding `0.0, 1.0, ..` up to the configured count.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
    count: u32,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self { count: 3 }
    }
}

impl SyntheticSource {
    /// Creates a source yielding `count` readings.
    pub const fn new(count: u32) -> Self {
        Self { count }
    }
}

impl DataSource for SyntheticSource {
    fn readings(&self) -> Result<Vec<f64>, DataSourceError> {
        Ok((0..self.count).map(f64::from).collect())
    }
}

/// Collector exposing `example_metric_without_label` and `example_metric_with_label`.
///
/// Data source failures never fail a scrape: the collector emits no samples and logs the failure
/// once per run of identical errors.
pub struct ExampleCollector<S = SyntheticSource> {
    source: S,
    without_label: Arc<MetricDescriptor>,
    with_label: Arc<MetricDescriptor>,
    last_error: LastError,
}

impl<S> fmt::Debug for ExampleCollector<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ExampleCollector")
            .field("without_label", &self.without_label.full_name())
            .field("with_label", &self.with_label.full_name())
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl Default for ExampleCollector {
    fn default() -> Self {
        Self::new(SyntheticSource::default())
    }
}

impl<S: DataSource> ExampleCollector<S> {
    /// Creates a collector querying the specified data source.
    pub fn new(source: S) -> Self {
        let without_label = MetricDescriptor::new(
            "example_metric_without_label",
            "Example metric reported while the data source is healthy.",
        );
        let with_label = MetricDescriptor::new(
            "example_metric_with_label",
            "Example metric reported for each data source reading.",
        )
        .with_labels(["label_1", "label_2"]);

        Self {
            source,
            without_label: Arc::new(without_label),
            with_label: Arc::new(with_label),
            last_error: LastError::new(),
        }
    }

    fn query_source(&self) -> Result<Vec<f64>, DataSourceError> {
        let readings = self.source.readings()?;
        if readings.is_empty() {
            return Err(DataSourceError::no_readings());
        }
        Ok(readings)
    }
}

impl<S: DataSource> Collector for ExampleCollector<S> {
    fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![self.with_label.clone(), self.without_label.clone()]
    }

    fn collect(&self) -> Vec<Sample> {
        let readings = match self.query_source() {
            Ok(readings) => readings,
            Err(err) => {
                if self.last_error.replace(&err) {
                    tracing::warn!(%err, "Failed to get metrics");
                }
                return vec![];
            }
        };
        self.last_error.clear();

        let labeled = readings.iter().map(|reading| {
            let first_label = format!("{reading:.6}");
            Sample::new(
                &self.with_label,
                SAMPLE_VALUE,
                [first_label.as_str(), SECOND_LABEL_VALUE],
            )
        });
        iter::once(Sample::unlabeled(&self.without_label, SAMPLE_VALUE))
            .chain(labeled)
            .collect::<Result<_, _>>()
            .unwrap_or_else(|err| {
                tracing::error!(%err, "Example collector produced a malformed sample");
                vec![]
            })
    }
}
