use assert_matches::assert_matches;
use tracing::subscriber::Subscriber;
use tracing_capture::{CaptureLayer, SharedStorage};
use tracing_subscriber::layer::SubscriberExt;

use std::{sync::Arc, thread};

use super::*;

#[derive(Debug, Clone)]
struct StaticCollector {
    descriptors: Vec<Arc<MetricDescriptor>>,
    samples: Vec<Sample>,
}

impl StaticCollector {
    fn new(descriptors: impl IntoIterator<Item = Arc<MetricDescriptor>>) -> Self {
        Self {
            descriptors: descriptors.into_iter().collect(),
            samples: vec![],
        }
    }

    fn with_samples(mut self, samples: impl IntoIterator<Item = Sample>) -> Self {
        self.samples = samples.into_iter().collect();
        self
    }
}

impl Collector for StaticCollector {
    fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
        self.descriptors.clone()
    }

    fn collect(&self) -> Vec<Sample> {
        self.samples.clone()
    }
}

#[derive(Debug)]
struct PanickingCollector(Arc<MetricDescriptor>);

impl Collector for PanickingCollector {
    fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![self.0.clone()]
    }

    fn collect(&self) -> Vec<Sample> {
        panic!("data source exploded");
    }
}

fn labeled_gauge(name: &str, labels: &[&str]) -> Arc<MetricDescriptor> {
    Arc::new(MetricDescriptor::new(name, "Test gauge.").with_labels(labels.iter().copied()))
}

fn tracing_subscriber(storage: &SharedStorage) -> impl Subscriber {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .finish()
        .with(CaptureLayer::new(storage))
}

fn encode(registry: &Registry) -> String {
    let mut buffer = String::new();
    registry.encode(&mut buffer, Format::Prometheus).unwrap();
    buffer
}

#[test]
fn conflicting_label_schema_is_rejected() {
    let mut registry = Registry::empty();
    let original = labeled_gauge("requests", &["method"]);
    registry.register(StaticCollector::new([original])).unwrap();

    let conflicting = labeled_gauge("requests", &["method", "code"]);
    let other = labeled_gauge("other", &[]);
    let err = registry
        .register(StaticCollector::new([other, conflicting]))
        .unwrap_err();
    assert_matches!(
        &err,
        RegistrationError::DuplicateDescriptor { existing, new }
            if existing.label_names() == ["method"] && new.label_names() == ["method", "code"]
    );
    let message = err.to_string();
    assert!(message.contains("requests{method, code}"), "{message}");

    // Registration is all-or-nothing.
    assert_eq!(registry.collector_count(), 1);
    assert_eq!(registry.descriptors().len(), 1);
}

#[test]
fn conflicts_within_single_collector_are_rejected() {
    let mut registry = Registry::empty();
    let collector = StaticCollector::new([
        labeled_gauge("requests", &["method"]),
        labeled_gauge("requests", &[]),
    ]);
    let err = registry.register(collector).unwrap_err();
    assert_matches!(err, RegistrationError::DuplicateDescriptor { .. });
    assert_eq!(registry.collector_count(), 0);
}

#[test]
fn invalid_descriptors_are_rejected() {
    let mut registry = Registry::empty();
    let err = registry
        .register(StaticCollector::new([labeled_gauge("bad-name", &[])]))
        .unwrap_err();
    assert_matches!(err, RegistrationError::InvalidDescriptor { .. });

    let err = registry
        .register(StaticCollector::new([labeled_gauge("good", &["__reserved"])]))
        .unwrap_err();
    assert_matches!(
        err,
        RegistrationError::InvalidDescriptor { reason, .. } if reason.contains("reserved")
    );
}

#[test]
fn identical_descriptors_are_registered_idempotently() {
    let first = labeled_gauge("shared", &["source"]);
    let second = labeled_gauge("shared", &["source"]);
    let first_collector = StaticCollector::new([first.clone()])
        .with_samples([Sample::new(&first, 1.0, ["first"]).unwrap()]);
    let second_collector = StaticCollector::new([second.clone()])
        .with_samples([Sample::new(&second, 2.0, ["second"]).unwrap()]);

    let mut registry = Registry::empty();
    registry.register(first_collector).unwrap();
    registry.register(second_collector).unwrap();
    assert_eq!(registry.collector_count(), 2);
    assert_eq!(registry.descriptors().len(), 1);

    let families = registry.gather();
    assert_eq!(families.len(), 1);
    let values: Vec<_> = families[0].samples().iter().map(Sample::value).collect();
    assert_eq!(values, [1.0, 2.0]);

    let output = encode(&registry);
    let help_lines = output
        .lines()
        .filter(|line| line.starts_with("# HELP shared "))
        .count();
    assert_eq!(help_lines, 1, "{output}");
}

#[test]
fn degraded_collector_still_declares_metrics() {
    let with_label = labeled_gauge("example_metric_with_label", &["label_1", "label_2"]);
    let without_label = labeled_gauge("example_metric_without_label", &[]);
    let mut registry = Registry::empty();
    registry
        .register(StaticCollector::new([with_label, without_label]))
        .unwrap();

    let families = registry.gather();
    assert_eq!(families.len(), 2);
    assert!(families.iter().all(|family| family.samples().is_empty()));

    let output = encode(&registry);
    let lines: Vec<_> = output.lines().collect();
    assert_eq!(
        lines,
        [
            "# HELP example_metric_with_label Test gauge.",
            "# TYPE example_metric_with_label gauge",
            "# HELP example_metric_without_label Test gauge.",
            "# TYPE example_metric_without_label gauge",
        ]
    );
}

#[test]
fn samples_preserve_collection_order_and_arity() {
    let descriptor = labeled_gauge("ordered", &["idx", "parity"]);
    let samples = (0..5).map(|i| {
        let parity = if i % 2 == 0 { "even" } else { "odd" };
        Sample::new(&descriptor, f64::from(i), [i.to_string(), parity.to_owned()]).unwrap()
    });
    let collector = StaticCollector::new([descriptor.clone()]).with_samples(samples);
    let mut registry = Registry::empty();
    registry.register(collector).unwrap();

    for family in registry.gather() {
        let arity = family.descriptor().label_names().len();
        assert!(family
            .samples()
            .iter()
            .all(|sample| sample.label_values().len() == arity));
        let values: Vec<_> = family.samples().iter().map(Sample::value).collect();
        assert_eq!(values, [0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}

#[test]
fn undeclared_samples_are_dropped() {
    let storage = SharedStorage::default();
    let _subscriber_guard = tracing::subscriber::set_default(tracing_subscriber(&storage));

    let declared = labeled_gauge("declared", &[]);
    let undeclared = labeled_gauge("undeclared", &[]);
    let impostor = labeled_gauge("declared", &["extra"]);
    let collector = StaticCollector::new([declared.clone()]).with_samples([
        Sample::unlabeled(&declared, 1.0).unwrap(),
        Sample::unlabeled(&undeclared, 2.0).unwrap(),
        Sample::new(&impostor, 3.0, ["x"]).unwrap(),
    ]);
    let mut registry = Registry::empty();
    registry.register(collector).unwrap();

    let output = encode(&registry);
    assert!(output.contains("declared 1.0\n"), "{output}");
    assert!(!output.contains("undeclared"), "{output}");
    assert!(!output.contains("extra"), "{output}");

    let storage = storage.lock();
    let warnings: Vec<_> = storage
        .all_events()
        .filter(|event| *event.metadata().level() == tracing::Level::WARN)
        .collect();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0]
        .message()
        .unwrap()
        .contains("not declared by the collector"));
}

#[test]
fn panicking_collector_is_isolated() {
    let storage = SharedStorage::default();
    let _subscriber_guard = tracing::subscriber::set_default(tracing_subscriber(&storage));

    let healthy = labeled_gauge("healthy", &[]);
    let healthy_collector = StaticCollector::new([healthy.clone()])
        .with_samples([Sample::unlabeled(&healthy, 1.0).unwrap()]);
    let mut registry = Registry::empty();
    registry
        .register(PanickingCollector(labeled_gauge("exploding", &[])))
        .unwrap();
    registry.register(healthy_collector).unwrap();

    let output = encode(&registry);
    assert!(output.contains("# TYPE exploding gauge\n"), "{output}");
    assert!(output.contains("healthy 1.0\n"), "{output}");

    let storage = storage.lock();
    let errors: Vec<_> = storage
        .all_events()
        .filter(|event| *event.metadata().level() == tracing::Level::ERROR)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message().unwrap().contains("Collector panicked"));
}

#[test]
fn registry_serves_concurrent_scrapes() {
    let descriptor = labeled_gauge("concurrent", &["thread"]);
    let collector = StaticCollector::new([descriptor.clone()])
        .with_samples([Sample::new(&descriptor, 7.0, ["main"]).unwrap()]);
    let mut registry = Registry::empty();
    registry.register(collector).unwrap();
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || encode(&registry))
        })
        .collect();
    for handle in handles {
        let output = handle.join().unwrap();
        assert!(output.contains("concurrent{thread=\"main\"} 7.0\n"), "{output}");
    }
}
