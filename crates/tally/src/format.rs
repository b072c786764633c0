//! Support for various metrics encoding formats.

/// Metrics export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Format {
    /// [OpenMetrics text format][om]. Counter samples are suffixed with `_total`, and the output
    /// is terminated with `# EOF`.
    ///
    /// [om]: https://github.com/OpenObservability/OpenMetrics/blob/main/specification/OpenMetrics.md
    OpenMetrics,
    /// [Prometheus text format][prom], version 0.0.4. Differs from the OpenMetrics format
    /// in that counter samples have no `_total` suffix, there are no `# UNIT` comments,
    /// and there is no `# EOF` terminator.
    ///
    /// [prom]: https://prometheus.io/docs/instrumenting/exposition_formats/
    Prometheus,
    /// OpenMetrics text format as understood by Prometheus.
    ///
    /// Prometheus *mostly* understands the OpenMetrics format. The notable exception is counter
    /// definitions; OpenMetrics requires to append `_total` to the counter name, but Prometheus
    /// doesn't understand this.
    OpenMetricsForPrometheus,
}

impl Format {
    /// Content type for OpenMetrics text format.
    pub const OPEN_METRICS_CONTENT_TYPE: &'static str =
        "application/openmetrics-text; version=1.0.0; charset=utf-8";
    /// Content type for Prometheus text format.
    pub const PROMETHEUS_CONTENT_TYPE: &'static str = "text/plain; version=0.0.4; charset=utf-8";

    /// Returns the HTTP content type for this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Prometheus => Self::PROMETHEUS_CONTENT_TYPE,
            Self::OpenMetrics | Self::OpenMetricsForPrometheus => Self::OPEN_METRICS_CONTENT_TYPE,
        }
    }

    pub(crate) fn counter_suffix(self) -> &'static str {
        match self {
            Self::OpenMetrics => "_total",
            Self::Prometheus | Self::OpenMetricsForPrometheus => "",
        }
    }

    pub(crate) fn is_open_metrics(self) -> bool {
        !matches!(self, Self::Prometheus)
    }
}
