//! Prometheus exposition of LazyLibrarian library statistics.
//!
//! [`router::ExporterState`] wires a [`collector::LibraryCollector`] to a
//! namespaced [`metrics::MetricsRegistry`]; every scrape of the metrics
//! route runs one collection cycle and renders the registry.

pub mod collector;
pub mod handlers;
pub mod metrics;
pub mod router;

pub use collector::{CollectStep, LibraryCollector};
pub use router::{ExporterState, exporter_router};

/// Prefix of every exported metric name.
pub const NAMESPACE: &str = "lazylibrarian";
