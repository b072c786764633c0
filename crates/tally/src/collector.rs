//! Collector abstraction.

use std::{fmt, sync::Arc};

use crate::{descriptors::MetricDescriptor, sample::Sample};

/// Source of metrics computed during scraping.
///
/// A collector declares the fixed set of metrics it can ever emit via [`Self::describe()`], and
/// produces fresh [`Sample`]s for them each time a [`Registry`](crate::Registry) it's registered
/// in is scraped via [`Self::collect()`].
///
/// # Failure handling
///
/// `collect()` cannot fail. If the underlying data source is unavailable, the collector should
/// report this (e.g., by logging it, possibly de-duplicated with [`LastError`](crate::LastError))
/// and return no samples. The descriptors are still declared in the exposition output, so
/// the scrape as a whole stays valid.
///
/// # Examples
///
/// ```
/// use std::sync::{atomic::{AtomicU64, Ordering}, Arc};
/// use tally::{Collector, MetricDescriptor, Registry, Sample};
///
/// #[derive(Debug)]
/// struct QueueCollector {
///     queue_len: Arc<AtomicU64>,
///     descriptor: Arc<MetricDescriptor>,
/// }
///
/// impl Collector for QueueCollector {
///     fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
///         vec![self.descriptor.clone()]
///     }
///
///     fn collect(&self) -> Vec<Sample> {
///         let len = self.queue_len.load(Ordering::Relaxed) as f64;
///         Sample::unlabeled(&self.descriptor, len).into_iter().collect()
///     }
/// }
///
/// let queue_len = Arc::new(AtomicU64::new(5));
/// let descriptor = MetricDescriptor::new("queue_len", "Number of queued tasks.");
/// let mut registry = Registry::empty();
/// registry.register(QueueCollector {
///     queue_len,
///     descriptor: Arc::new(descriptor),
/// })?;
/// assert_eq!(registry.gather()[0].samples()[0].value(), 5.0);
/// # Ok::<_, tally::RegistrationError>(())
/// ```
pub trait Collector: fmt::Debug + Send + Sync + 'static {
    /// Returns descriptors of all metrics this collector can emit. Must return the same set
    /// of descriptors on each call.
    fn describe(&self) -> Vec<Arc<MetricDescriptor>>;

    /// Produces samples for the current scrape. Every sample must refer to a descriptor
    /// returned from [`Self::describe()`]; other samples are dropped by the registry.
    fn collect(&self) -> Vec<Sample>;
}

impl<C: Collector> Collector for Arc<C> {
    fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
        (**self).describe()
    }

    fn collect(&self) -> Vec<Sample> {
        (**self).collect()
    }
}
