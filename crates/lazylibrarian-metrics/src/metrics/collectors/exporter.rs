use std::{sync::Arc, time::Duration};

use lazylibrarian_common::error::Result;

use crate::metrics::registry::{CounterMetric, GaugeMetric, MetricsRegistry};

/// Health of the exporter itself: one scrape cycle at a time.
pub struct ExporterMetrics {
    up: Arc<GaugeMetric>,
    scrapes_total: Arc<CounterMetric>,
    scrape_errors_total: Arc<CounterMetric>,
    scrape_duration_seconds: Arc<GaugeMetric>,
}

impl ExporterMetrics {
    pub fn register(registry: &MetricsRegistry, collectors: &[&str]) -> Result<Self> {
        let scrape_errors_total = registry.register_counter(
            "exporter_scrape_errors_total",
            "Total number of failed scrapes of the LazyLibrarian API, by collector",
            &["collector"],
        )?;
        for collector in collectors {
            scrape_errors_total.init(&[*collector]);
        }

        let scrapes_total = registry.register_counter(
            "exporter_scrapes_total",
            "Total number of scrapes of the LazyLibrarian API",
            &[],
        )?;
        scrapes_total.init(&[]);

        Ok(Self {
            up: registry.register_gauge(
                "up",
                "Whether the last scrape of the LazyLibrarian API succeeded",
                &[],
            )?,
            scrapes_total,
            scrape_errors_total,
            scrape_duration_seconds: registry.register_gauge(
                "exporter_scrape_duration_seconds",
                "Duration of the last scrape of the LazyLibrarian API in seconds",
                &[],
            )?,
        })
    }

    pub fn record_scrape(&self) {
        self.scrapes_total.inc_one(&[]);
    }

    pub fn record_success(&self) {
        self.up.set(&[], 1.0);
    }

    pub fn record_failure(&self, collector: &str) {
        self.scrape_errors_total.inc_one(&[collector]);
        self.up.set(&[], 0.0);
    }

    pub fn record_duration(&self, elapsed: Duration) {
        self.scrape_duration_seconds
            .set(&[], elapsed.as_secs_f64());
    }

    pub fn up(&self) -> Option<f64> {
        self.up.get(&[])
    }

    pub fn scrapes(&self) -> f64 {
        self.scrapes_total.get(&[]).unwrap_or_default()
    }

    pub fn errors(&self, collector: &str) -> f64 {
        self.scrape_errors_total
            .get(&[collector])
            .unwrap_or_default()
    }

    pub fn last_duration(&self) -> Option<f64> {
        self.scrape_duration_seconds.get(&[])
    }
}
