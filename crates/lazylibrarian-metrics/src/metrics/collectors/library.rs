use std::sync::Arc;

use lazylibrarian_client::LibraryStats;
use lazylibrarian_common::error::Result;

use crate::metrics::registry::{CounterMetric, GaugeMetric, MetricsRegistry};

pub const STATUS_WANTED: &str = "wanted";
pub const DOWNLOAD_SNATCHED: &str = "snatched";
pub const DOWNLOAD_PROCESSED: &str = "processed";
pub const DOWNLOAD_FAILED: &str = "failed";

type StatField = fn(&LibraryStats) -> Option<f64>;

/// `getStats` field feeding each `books_by_status` label.
const STATUS_FIELDS: [(&str, StatField); 7] = [
    ("have", |stats: &LibraryStats| stats.have),
    ("read", |stats: &LibraryStats| stats.read),
    ("to_read", |stats: &LibraryStats| stats.to_read),
    ("skipped", |stats: &LibraryStats| stats.skipped),
    ("open", |stats: &LibraryStats| stats.open),
    (DOWNLOAD_PROCESSED, |stats: &LibraryStats| stats.processed_downloads),
    (DOWNLOAD_FAILED, |stats: &LibraryStats| stats.failed_downloads),
];

/// Library contents as reported by LazyLibrarian.
///
/// Every update is conditional: a value the API did not report leaves the
/// previous sample untouched.
pub struct LibraryMetrics {
    books_total: Arc<GaugeMetric>,
    authors_total: Arc<GaugeMetric>,
    series_total: Arc<GaugeMetric>,
    books_by_status: Arc<GaugeMetric>,
    active_jobs: Arc<GaugeMetric>,
    downloads_total: Arc<CounterMetric>,
}

impl LibraryMetrics {
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        let downloads_total = registry.register_counter(
            "downloads_total",
            "Total number of downloads, by status",
            &["status"],
        )?;
        for status in [DOWNLOAD_SNATCHED, DOWNLOAD_PROCESSED, DOWNLOAD_FAILED] {
            downloads_total.init(&[status]);
        }

        Ok(Self {
            books_total: registry.register_gauge(
                "books_total",
                "Total number of books in the library",
                &[],
            )?,
            authors_total: registry.register_gauge(
                "authors_total",
                "Total number of authors in the library",
                &[],
            )?,
            series_total: registry.register_gauge(
                "series_total",
                "Total number of series in the library",
                &[],
            )?,
            books_by_status: registry.register_gauge(
                "books_by_status",
                "Number of books, by status",
                &["status"],
            )?,
            active_jobs: registry.register_gauge(
                "active_jobs",
                "Number of active LazyLibrarian jobs",
                &[],
            )?,
            downloads_total,
        })
    }

    pub fn record_snatched(&self, count: usize) {
        self.downloads_total
            .add(&[DOWNLOAD_SNATCHED], count as f64);
    }

    pub fn record_wanted(&self, count: usize) {
        self.books_by_status.set(&[STATUS_WANTED], count as f64);
    }

    pub fn record_active_jobs(&self, count: usize) {
        self.active_jobs.set(&[], count as f64);
    }

    pub fn apply_stats(&self, stats: &LibraryStats) {
        set_if_present(&self.books_total, stats.total_books);
        set_if_present(&self.authors_total, stats.total_authors);
        set_if_present(&self.series_total, stats.total_series);

        for (status, field) in STATUS_FIELDS {
            if let Some(value) = field(stats) {
                self.books_by_status.set(&[status], value);
            }
        }

        // LazyLibrarian reports lifetime totals here, yet they are added as
        // increments on every cycle, so these two series grow by the full
        // total per scrape.
        if let Some(processed) = stats.processed_downloads {
            self.downloads_total.add(&[DOWNLOAD_PROCESSED], processed);
        }
        if let Some(failed) = stats.failed_downloads {
            self.downloads_total.add(&[DOWNLOAD_FAILED], failed);
        }
    }

    pub fn books(&self) -> Option<f64> {
        self.books_total.get(&[])
    }

    pub fn authors(&self) -> Option<f64> {
        self.authors_total.get(&[])
    }

    pub fn series(&self) -> Option<f64> {
        self.series_total.get(&[])
    }

    pub fn books_with_status(&self, status: &str) -> Option<f64> {
        self.books_by_status.get(&[status])
    }

    pub fn jobs(&self) -> Option<f64> {
        self.active_jobs.get(&[])
    }

    pub fn downloads(&self, status: &str) -> f64 {
        self.downloads_total.get(&[status]).unwrap_or_default()
    }
}

fn set_if_present(gauge: &GaugeMetric, value: Option<f64>) {
    if let Some(value) = value {
        gauge.set(&[], value);
    }
}
