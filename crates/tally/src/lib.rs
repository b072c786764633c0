//! Collector / registry engine for pull-based metrics exporters.
//!
//! # Overview
//!
//! - A metric is declared once with a [`MetricDescriptor`]: its name, help, ordered label names,
//!   and optionally a type ([`MetricType`]) and a [`Unit`].
//! - A [`Collector`] declares the descriptors it can ever emit, and produces fresh [`Sample`]s
//!   for them on every scrape. Collectors never fail; a degraded data source results in
//!   no samples, which can be reported once per error transition using [`LastError`].
//! - Collectors are registered in a [`Registry`] at startup. On each scrape, the registry
//!   [gathers](Registry::gather()) samples from all collectors, groups them by descriptor
//!   and [encodes](Registry::encode()) them in one of the text [`Format`]s.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tally::{Collector, Format, LastError, MetricDescriptor, Registry, Sample};
//!
//! #[derive(Debug)]
//! struct TemperatureCollector {
//!     temperature: Arc<MetricDescriptor>,
//!     last_error: LastError,
//! }
//!
//! impl TemperatureCollector {
//!     fn new() -> Self {
//!         let temperature = MetricDescriptor::new("room_temperature", "Temperature per room.")
//!             .with_labels(["room"]);
//!         Self {
//!             temperature: Arc::new(temperature),
//!             last_error: LastError::new(),
//!         }
//!     }
//!
//!     fn read_sensors(&self) -> Result<Vec<(&'static str, f64)>, String> {
//!         Ok(vec![("kitchen", 21.5), ("attic", 17.0)])
//!     }
//! }
//!
//! impl Collector for TemperatureCollector {
//!     fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
//!         vec![self.temperature.clone()]
//!     }
//!
//!     fn collect(&self) -> Vec<Sample> {
//!         match self.read_sensors() {
//!             Ok(readings) => {
//!                 self.last_error.clear();
//!                 readings
//!                     .into_iter()
//!                     .filter_map(|(room, value)| {
//!                         Sample::new(&self.temperature, value, [room]).ok()
//!                     })
//!                     .collect()
//!             }
//!             Err(err) => {
//!                 if self.last_error.replace(&err) {
//!                     eprintln!("Failed reading sensors: {err}");
//!                 }
//!                 vec![]
//!             }
//!         }
//!     }
//! }
//!
//! let mut registry = Registry::empty();
//! registry.register(TemperatureCollector::new())?;
//!
//! let mut buffer = String::new();
//! registry.encode(&mut buffer, Format::Prometheus)?;
//! assert!(buffer.contains(r#"room_temperature{room="kitchen"} 21.5"#));
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub use prometheus_client::{metrics::MetricType, registry::Unit};

mod collector;
pub mod descriptors;
mod encoding;
mod format;
mod last_error;
mod registry;
mod sample;
mod validation;

pub use crate::{
    collector::Collector,
    descriptors::MetricDescriptor,
    format::Format,
    last_error::LastError,
    registry::{RegistrationError, Registry},
    sample::{MetricFamily, Sample, SampleError},
};

#[cfg(test)]
mod tests;
