//! Metric descriptors.

use prometheus_client::{metrics::MetricType, registry::Unit};

use std::{borrow::Cow, collections::HashSet, fmt};

use crate::validation::{validate_label_name, validate_metric_name};

/// Descriptor for a single metric: its name, help and label schema.
///
/// Descriptors are immutable once created and are shared between a [`Collector`](crate::Collector)
/// and the [`Sample`](crate::Sample)s it produces via `Arc`s.
///
/// # Examples
///
/// ```
/// use tally::{MetricDescriptor, MetricType, Unit};
///
/// let descriptor = MetricDescriptor::new("http_requests", "Number of HTTP requests.")
///     .with_labels(["method", "code"])
///     .with_type(MetricType::Counter);
/// assert_eq!(descriptor.label_names(), ["method", "code"]);
///
/// let latency = MetricDescriptor::new("http_latency", "Latency of the last request.")
///     .with_unit(Unit::Seconds);
/// assert_eq!(latency.full_name(), "http_latency_seconds");
/// ```
#[derive(Debug)]
pub struct MetricDescriptor {
    name: String,
    help: String,
    label_names: Vec<String>,
    metric_type: MetricType,
    unit: Option<Unit>,
}

impl MetricDescriptor {
    /// Creates a gauge descriptor without labels or unit.
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            label_names: Vec::new(),
            metric_type: MetricType::Gauge,
            unit: None,
        }
    }

    /// Sets label names. Their order is the order of label values in [`Sample`](crate::Sample)s
    /// and in the exposition output.
    #[must_use]
    pub fn with_labels<I>(mut self, label_names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.label_names = label_names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the metric type. Only counters and gauges can be rendered; by default,
    /// a descriptor is a gauge.
    #[must_use]
    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    /// Sets the measurement unit. The unit is appended to the exposed metric name.
    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Name of the metric **excluding** the unit suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help for the metric.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Ordered label names.
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Type of the metric.
    pub fn metric_type(&self) -> &MetricType {
        &self.metric_type
    }

    /// Measurement unit, if any.
    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    /// Name of the metric as it is exposed, i.e. with the unit suffix.
    pub fn full_name(&self) -> Cow<'_, str> {
        let Some(unit) = &self.unit else {
            return Cow::Borrowed(&self.name);
        };
        let unit = unit.as_str();
        let has_suffix = self
            .name
            .strip_suffix(unit)
            .is_some_and(|prefix| prefix.ends_with('_'));
        if has_suffix {
            Cow::Borrowed(&self.name)
        } else {
            Cow::Owned(format!("{}_{unit}", self.name))
        }
    }

    pub(crate) fn is_counter(&self) -> bool {
        matches!(self.metric_type, MetricType::Counter)
    }

    /// Checks whether this descriptor declares the same metric as `other`: same exposed name,
    /// help, label names (including their order), type and unit.
    pub fn has_same_schema(&self, other: &Self) -> bool {
        self.full_name() == other.full_name()
            && self.help == other.help
            && self.label_names == other.label_names
            && self.metric_type.as_str() == other.metric_type.as_str()
            && self.unit.as_ref().map(Unit::as_str) == other.unit.as_ref().map(Unit::as_str)
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        validate_metric_name(&self.full_name())?;
        if !(self.is_counter() || matches!(self.metric_type, MetricType::Gauge)) {
            return Err("only counters and gauges are supported");
        }

        let mut unique_labels = HashSet::with_capacity(self.label_names.len());
        for label in &self.label_names {
            validate_label_name(label)?;
            if !unique_labels.insert(label) {
                return Err("label names must be unique");
            }
        }
        Ok(())
    }
}

/// Human-readable form of the schema, e.g. `requests{method, code} counter`.
impl fmt::Display for MetricDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.full_name())?;
        if !self.label_names.is_empty() {
            write!(formatter, "{{{}}}", self.label_names.join(", "))?;
        }
        write!(formatter, " {}", self.metric_type.as_str())?;
        if !self.help.is_empty() {
            write!(formatter, " {:?}", self.help)?;
        }
        Ok(())
    }
}
