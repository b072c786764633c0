//! Metric samples and their grouping into families.

use std::{error, fmt, sync::Arc};

use crate::descriptors::MetricDescriptor;

/// Error constructing a [`Sample`]: the number of label values doesn't match the label schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleError {
    metric: String,
    expected: usize,
    actual: usize,
}

impl fmt::Display for SampleError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "metric `{}` expects {} label value(s), got {}",
            self.metric, self.expected, self.actual
        )
    }
}

impl error::Error for SampleError {}

/// Single reading for a [`MetricDescriptor`] with bound label values.
#[derive(Debug, Clone)]
pub struct Sample {
    descriptor: Arc<MetricDescriptor>,
    value: f64,
    label_values: Vec<String>,
}

impl Sample {
    /// Creates a sample. Label values are bound to the descriptor's label names positionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of label values differs from the number of label names
    /// in the descriptor.
    pub fn new<I>(
        descriptor: &Arc<MetricDescriptor>,
        value: f64,
        label_values: I,
    ) -> Result<Self, SampleError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let label_values: Vec<String> = label_values.into_iter().map(Into::into).collect();
        let expected = descriptor.label_names().len();
        if label_values.len() != expected {
            return Err(SampleError {
                metric: descriptor.full_name().into_owned(),
                expected,
                actual: label_values.len(),
            });
        }
        Ok(Self {
            descriptor: Arc::clone(descriptor),
            value,
            label_values,
        })
    }

    /// Creates a sample for a descriptor without labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor declares labels.
    pub fn unlabeled(descriptor: &Arc<MetricDescriptor>, value: f64) -> Result<Self, SampleError> {
        Self::new(descriptor, value, Vec::<String>::new())
    }

    /// Descriptor of this sample.
    pub fn descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.descriptor
    }

    /// Sample value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Label values in the order of [`MetricDescriptor::label_names()`].
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Iterates over `(label_name, label_value)` pairs.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let names = self.descriptor.label_names().iter();
        names
            .zip(&self.label_values)
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// All samples gathered for a single descriptor during a scrape.
#[derive(Debug, Clone)]
pub struct MetricFamily {
    pub(crate) descriptor: Arc<MetricDescriptor>,
    pub(crate) samples: Vec<Sample>,
}

impl MetricFamily {
    /// Descriptor of the family.
    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    /// Samples in the order they were produced by collectors. May be empty if the collector
    /// is degraded.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}
