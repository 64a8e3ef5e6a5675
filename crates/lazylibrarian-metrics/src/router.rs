use std::sync::Arc;

use axum::{Router, routing::get};
use lazylibrarian_client::LibraryApi;
use lazylibrarian_common::error::Result;
use tower_http::trace::TraceLayer;

use crate::{
    NAMESPACE,
    collector::{CollectStep, LibraryCollector},
    handlers,
    metrics::{ExporterMetrics, LibraryMetrics, MetricsRegistry},
};

pub struct ExporterState {
    pub registry: Arc<MetricsRegistry>,
    pub collector: Arc<LibraryCollector>,
    pub metrics_path: String,
}

impl ExporterState {
    pub fn new(api: Arc<dyn LibraryApi>, metrics_path: impl Into<String>) -> Result<Self> {
        let registry = Arc::new(MetricsRegistry::with_namespace(NAMESPACE));
        let steps = CollectStep::ALL.map(|step| step.as_str());
        let exporter_metrics = ExporterMetrics::register(registry.as_ref(), &steps)?;
        let library_metrics = LibraryMetrics::register(registry.as_ref())?;

        Ok(Self {
            registry,
            collector: Arc::new(LibraryCollector::new(api, exporter_metrics, library_metrics)),
            metrics_path: metrics_path.into(),
        })
    }
}

pub fn exporter_router(state: Arc<ExporterState>) -> Router {
    Router::new()
        .route("/", get(handlers::landing_page))
        .route(&state.metrics_path, get(handlers::prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
