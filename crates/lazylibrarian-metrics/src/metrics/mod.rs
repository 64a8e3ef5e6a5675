pub mod collectors;
pub mod registry;
pub mod types;

pub use collectors::{exporter::ExporterMetrics, library::LibraryMetrics};
pub use registry::{CounterMetric, GaugeMetric, MetricsRegistry};
pub use types::{MetricDescriptor, MetricType, MetricValue};
