//! Registry of collectors.

use std::{
    collections::HashMap,
    error, fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    collector::Collector,
    descriptors::MetricDescriptor,
    encoding,
    format::Format,
    sample::{MetricFamily, Sample},
};

/// Error registering a [`Collector`] in a [`Registry`].
#[derive(Debug)]
#[non_exhaustive]
pub enum RegistrationError {
    /// A descriptor has the same name as an already registered descriptor, but a different schema.
    DuplicateDescriptor {
        /// Already registered descriptor.
        existing: Arc<MetricDescriptor>,
        /// Conflicting descriptor.
        new: Arc<MetricDescriptor>,
    },
    /// Descriptor has an invalid metric or label name, or an unsupported type.
    InvalidDescriptor {
        /// Invalid descriptor.
        descriptor: Arc<MetricDescriptor>,
        /// Human-readable reason.
        reason: &'static str,
    },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateDescriptor { existing, new } => write!(
                formatter,
                "descriptor `{new}` conflicts with already registered descriptor `{existing}`"
            ),
            Self::InvalidDescriptor { descriptor, reason } => {
                write!(formatter, "invalid descriptor `{descriptor}`: {reason}")
            }
        }
    }
}

impl error::Error for RegistrationError {}

/// Metrics registry.
///
/// A registry is populated with [`Collector`]s once, at startup, and is read-only afterwards.
/// It is `Sync`, so a single registry (usually wrapped in an `Arc`) can serve concurrent scrapes.
pub struct Registry {
    collectors: Vec<Box<dyn Collector>>,
    descriptors: Vec<Arc<MetricDescriptor>>,
    indices_by_name: HashMap<String, usize>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self
            .descriptors
            .iter()
            .map(|descriptor| descriptor.full_name())
            .collect();
        formatter
            .debug_struct("Registry")
            .field("collectors", &self.collectors.len())
            .field("metrics", &names)
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::empty()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            collectors: Vec::new(),
            descriptors: Vec::new(),
            indices_by_name: HashMap::new(),
        }
    }

    /// Registers a collector.
    ///
    /// Re-declaring a metric with exactly the same schema is allowed; samples for such a metric
    /// from all collectors are merged into a single family.
    ///
    /// # Errors
    ///
    /// Returns an error if a descriptor is invalid, or conflicts with an already registered
    /// descriptor (or another descriptor of the same collector). In this case, nothing
    /// is registered.
    pub fn register(&mut self, collector: impl Collector) -> Result<(), RegistrationError> {
        let mut new_descriptors: Vec<Arc<MetricDescriptor>> = vec![];
        for descriptor in collector.describe() {
            if let Err(reason) = descriptor.validate() {
                return Err(RegistrationError::InvalidDescriptor { descriptor, reason });
            }

            let full_name = descriptor.full_name().into_owned();
            let existing = self
                .indices_by_name
                .get(&full_name)
                .map(|&idx| &self.descriptors[idx])
                .or_else(|| {
                    new_descriptors
                        .iter()
                        .find(|new| new.full_name() == full_name)
                });
            match existing {
                Some(existing) if existing.has_same_schema(&descriptor) => { /* idempotent */ }
                Some(existing) => {
                    return Err(RegistrationError::DuplicateDescriptor {
                        existing: Arc::clone(existing),
                        new: descriptor,
                    });
                }
                None => new_descriptors.push(descriptor),
            }
        }

        for descriptor in new_descriptors {
            let full_name = descriptor.full_name().into_owned();
            self.indices_by_name.insert(full_name, self.descriptors.len());
            self.descriptors.push(descriptor);
        }
        self.collectors.push(Box::new(collector));
        Ok(())
    }

    /// Returns descriptors of all registered metrics in the registration order.
    pub fn descriptors(&self) -> &[Arc<MetricDescriptor>] {
        &self.descriptors
    }

    /// Returns the number of registered collectors.
    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    /// Collects samples from all registered collectors and groups them by descriptor.
    ///
    /// Each registered descriptor gets a family, even if no samples were collected for it.
    /// A panicking collector contributes no samples; samples referring to undeclared metrics
    /// are dropped.
    pub fn gather(&self) -> Vec<MetricFamily> {
        let mut families: Vec<_> = self
            .descriptors
            .iter()
            .map(|descriptor| MetricFamily {
                descriptor: Arc::clone(descriptor),
                samples: vec![],
            })
            .collect();

        for collector in &self.collectors {
            for sample in Self::collect_isolated(collector.as_ref()) {
                let idx = self
                    .indices_by_name
                    .get(sample.descriptor().full_name().as_ref())
                    .copied()
                    .filter(|&idx| families[idx].descriptor.has_same_schema(sample.descriptor()));
                if let Some(idx) = idx {
                    families[idx].samples.push(sample);
                } else {
                    tracing::warn!(
                        metric = %sample.descriptor().full_name(),
                        ?collector,
                        "Dropped sample for a metric not declared by the collector"
                    );
                }
            }
        }
        families
    }

    fn collect_isolated(collector: &dyn Collector) -> Vec<Sample> {
        panic::catch_unwind(AssertUnwindSafe(|| collector.collect())).unwrap_or_else(|_| {
            tracing::error!(
                ?collector,
                "Collector panicked; its metrics are skipped for this scrape"
            );
            vec![]
        })
    }

    /// Gathers metrics from all collectors and encodes them in the specified format.
    ///
    /// # Errors
    ///
    /// Proxies formatting errors of the provided `writer`.
    pub fn encode<W: fmt::Write>(&self, writer: &mut W, format: Format) -> fmt::Result {
        encoding::encode_families(writer, &self.gather(), format)
    }
}
