use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use lazylibrarian_common::error::{ExporterError, Result};

use crate::metrics::types::{CollectedMetric, MetricDescriptor, MetricSample, MetricType, MetricValue};

type LabelValues = Vec<String>;

trait RegisteredMetric: Send + Sync {
    fn descriptor(&self) -> MetricDescriptor;
    fn collect(&self) -> Vec<MetricSample>;
}

/// Process-wide set of named instruments, rendered in the Prometheus text
/// format on demand.
pub struct MetricsRegistry {
    namespace: Option<String>,
    metrics: RwLock<HashMap<String, Arc<dyn RegisteredMetric>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            namespace: None,
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// Every metric registered afterwards is named `<namespace>_<name>`.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            metrics: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        variable_labels: &[&str],
    ) -> Result<Arc<CounterMetric>> {
        let descriptor = self.descriptor(name, help, MetricType::Counter, variable_labels);
        let metric = Arc::new(CounterMetric {
            series: SeriesMap::new(descriptor),
        });
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        variable_labels: &[&str],
    ) -> Result<Arc<GaugeMetric>> {
        let descriptor = self.descriptor(name, help, MetricType::Gauge, variable_labels);
        let metric = Arc::new(GaugeMetric {
            series: SeriesMap::new(descriptor),
        });
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn collect_all(&self) -> Vec<CollectedMetric> {
        let metrics = match self.metrics.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        let mut collected = metrics
            .values()
            .map(|metric| CollectedMetric {
                descriptor: metric.descriptor(),
                samples: metric.collect(),
            })
            .collect::<Vec<_>>();

        collected.sort_by(|left, right| left.descriptor.name.cmp(&right.descriptor.name));
        collected
    }

    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        for metric in self.collect_all() {
            let name = &metric.descriptor.name;
            let _ = writeln!(output, "# HELP {name} {}", escape_help(&metric.descriptor.help));
            let _ = writeln!(
                output,
                "# TYPE {name} {}",
                metric.descriptor.metric_type.as_prometheus_type()
            );

            for sample in metric.samples {
                output.push_str(&render_sample_line(name, &sample.labels, sample.value.as_f64()));
            }
        }

        output
    }

    fn descriptor(
        &self,
        name: &str,
        help: &str,
        metric_type: MetricType,
        variable_labels: &[&str],
    ) -> MetricDescriptor {
        let name = match &self.namespace {
            Some(namespace) => format!("{namespace}_{name}"),
            None => name.to_string(),
        };

        MetricDescriptor {
            name,
            help: help.to_string(),
            metric_type,
            variable_labels: variable_labels.iter().map(|label| (*label).to_string()).collect(),
        }
    }

    fn register<M: RegisteredMetric + 'static>(&self, metric: Arc<M>) -> Result<()> {
        let name = metric.descriptor().name;
        let mut metrics = self.metrics.write().map_err(|_| {
            ExporterError::InternalError("failed to acquire metrics registry lock".to_string())
        })?;

        if metrics.contains_key(&name) {
            return Err(ExporterError::InvalidArgument(format!(
                "metric already registered: {name}"
            )));
        }

        metrics.insert(name, metric);
        Ok(())
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic counter. Negative and NaN increments are dropped.
pub struct CounterMetric {
    series: SeriesMap,
}

impl CounterMetric {
    pub fn add(&self, labels: &[&str], value: f64) {
        if value.is_nan() || value < 0.0 {
            return;
        }
        self.series.get_or_create(labels).add(value);
    }

    pub fn inc_one(&self, labels: &[&str]) {
        self.add(labels, 1.0);
    }

    /// Exposes the series at zero before the first increment.
    pub fn init(&self, labels: &[&str]) {
        self.series.get_or_create(labels);
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        self.series.get(labels)
    }
}

impl RegisteredMetric for CounterMetric {
    fn descriptor(&self) -> MetricDescriptor {
        self.series.descriptor.clone()
    }

    fn collect(&self) -> Vec<MetricSample> {
        self.series.collect(MetricValue::Counter)
    }
}

/// Last-write-wins gauge.
pub struct GaugeMetric {
    series: SeriesMap,
}

impl GaugeMetric {
    pub fn set(&self, labels: &[&str], value: f64) {
        self.series.get_or_create(labels).store(value);
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        self.series.get(labels)
    }
}

impl RegisteredMetric for GaugeMetric {
    fn descriptor(&self) -> MetricDescriptor {
        self.series.descriptor.clone()
    }

    fn collect(&self) -> Vec<MetricSample> {
        self.series.collect(MetricValue::Gauge)
    }
}

struct SeriesMap {
    descriptor: MetricDescriptor,
    series: RwLock<HashMap<LabelValues, Arc<AtomicF64>>>,
}

impl SeriesMap {
    fn new(descriptor: MetricDescriptor) -> Self {
        Self {
            descriptor,
            series: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, labels: &[&str]) -> Option<f64> {
        let label_values = normalize_labels(&self.descriptor, labels);
        let guard = self.series.read().ok()?;
        guard.get(&label_values).map(|value| value.load())
    }

    fn get_or_create(&self, labels: &[&str]) -> Arc<AtomicF64> {
        let label_values = normalize_labels(&self.descriptor, labels);
        if let Ok(guard) = self.series.read()
            && let Some(existing) = guard.get(&label_values)
        {
            return existing.clone();
        }

        match self.series.write() {
            Ok(mut guard) => guard
                .entry(label_values)
                .or_insert_with(|| Arc::new(AtomicF64::new(0.0)))
                .clone(),
            Err(_) => Arc::new(AtomicF64::new(0.0)),
        }
    }

    fn collect(&self, wrap: fn(f64) -> MetricValue) -> Vec<MetricSample> {
        let series = match self.series.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        let mut entries = series.iter().collect::<Vec<_>>();
        entries.sort_by(|left, right| left.0.cmp(right.0));

        entries
            .into_iter()
            .map(|(label_values, value)| MetricSample {
                labels: materialize_labels(&self.descriptor, label_values),
                value: wrap(value.load()),
            })
            .collect()
    }
}

struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, delta: f64) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            });
    }
}

fn normalize_labels(descriptor: &MetricDescriptor, labels: &[&str]) -> LabelValues {
    let expected = descriptor.variable_labels.len();
    (0..expected)
        .map(|index| labels.get(index).copied().unwrap_or_default().to_string())
        .collect()
}

fn materialize_labels(descriptor: &MetricDescriptor, values: &[String]) -> Vec<(String, String)> {
    descriptor
        .variable_labels
        .iter()
        .zip(values.iter())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn render_sample_line(name: &str, labels: &[(String, String)], value: f64) -> String {
    let mut rendered = String::from(name);

    if !labels.is_empty() {
        let pairs = labels
            .iter()
            .map(|(key, value)| format!("{key}=\"{}\"", escape_label_value(value)))
            .collect::<Vec<_>>();
        rendered.push('{');
        rendered.push_str(&pairs.join(","));
        rendered.push('}');
    }

    rendered.push(' ');
    rendered.push_str(&format_metric_value(value));
    rendered.push('\n');
    rendered
}

fn format_metric_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}
