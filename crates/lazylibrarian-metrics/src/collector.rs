use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use lazylibrarian_client::{
    ApiError, Command, JobsResponse, LibraryApi, SnatchedResponse, StatsResponse, VersionInfo,
    WantedResponse, fetch,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::metrics::{ExporterMetrics, LibraryMetrics};

/// Stage of a scrape cycle, used as the `collector` label on error counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStep {
    ServerInfo,
    LibraryStats,
    JobsInfo,
}

impl CollectStep {
    pub const ALL: [CollectStep; 3] = [Self::ServerInfo, Self::LibraryStats, Self::JobsInfo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerInfo => "server_info",
            Self::LibraryStats => "library_stats",
            Self::JobsInfo => "jobs_info",
        }
    }
}

impl fmt::Display for CollectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct StepFailure {
    step: CollectStep,
    error: ApiError,
}

trait InStep<T> {
    fn in_step(self, step: CollectStep) -> Result<T, StepFailure>;
}

impl<T> InStep<T> for Result<T, ApiError> {
    fn in_step(self, step: CollectStep) -> Result<T, StepFailure> {
        self.map_err(|error| StepFailure { step, error })
    }
}

/// Refreshes every instrument from the LazyLibrarian API, once per scrape.
///
/// Cycles are serialised: a scrape arriving while another is collecting
/// waits for it to finish, then runs its own cycle.
pub struct LibraryCollector {
    api: Arc<dyn LibraryApi>,
    exporter: ExporterMetrics,
    library: LibraryMetrics,
    cycle: Mutex<()>,
    version_logged: AtomicBool,
}

impl LibraryCollector {
    pub fn new(
        api: Arc<dyn LibraryApi>,
        exporter: ExporterMetrics,
        library: LibraryMetrics,
    ) -> Self {
        Self {
            api,
            exporter,
            library,
            cycle: Mutex::new(()),
            version_logged: AtomicBool::new(false),
        }
    }

    pub fn exporter_metrics(&self) -> &ExporterMetrics {
        &self.exporter
    }

    pub fn library_metrics(&self) -> &LibraryMetrics {
        &self.library
    }

    /// Runs one scrape cycle. Failures only show up in the exporter metrics.
    pub async fn collect(&self) {
        let _cycle = self.cycle.lock().await;
        let started_at = Instant::now();
        self.exporter.record_scrape();

        match self.run_steps().await {
            Ok(()) => self.exporter.record_success(),
            Err(StepFailure { step, error }) => {
                warn!(
                    collector = %step,
                    kind = error.kind(),
                    error = %error,
                    "scrape of lazylibrarian api failed"
                );
                self.exporter.record_failure(step.as_str());
            }
        }

        self.exporter.record_duration(started_at.elapsed());
    }

    // Stops at the first failing step. Earlier updates in the same cycle stay.
    async fn run_steps(&self) -> Result<(), StepFailure> {
        self.collect_server_info().await.in_step(CollectStep::ServerInfo)?;
        self.collect_library_stats().await.in_step(CollectStep::LibraryStats)?;
        self.collect_jobs_info().await.in_step(CollectStep::JobsInfo)?;
        Ok(())
    }

    async fn collect_server_info(&self) -> Result<(), ApiError> {
        let version: VersionInfo = fetch(self.api.as_ref(), Command::GetVersion, &[]).await?;

        let current = version.current_version.as_deref().unwrap_or("unknown");
        let install_type = version.install_type.as_deref().unwrap_or("unknown");
        if !self.version_logged.swap(true, Ordering::Relaxed) {
            info!(
                version = current,
                install_type,
                latest = version.latest_version.as_deref().unwrap_or("unknown"),
                commits_behind = version.commits_behind,
                "connected to lazylibrarian"
            );
        } else {
            debug!(version = current, install_type, "lazylibrarian server info");
        }

        Ok(())
    }

    async fn collect_library_stats(&self) -> Result<(), ApiError> {
        let api = self.api.as_ref();

        let snatched: SnatchedResponse = fetch(api, Command::GetSnatched, &[]).await?;
        if let Some(items) = snatched.snatched {
            self.library.record_snatched(items.len());
        }

        let wanted: WantedResponse = fetch(api, Command::GetWanted, &[]).await?;
        if let Some(books) = wanted.books {
            self.library.record_wanted(books.len());
        }

        let stats: StatsResponse = fetch(api, Command::GetStats, &[]).await?;
        if let Some(stats) = stats.stats {
            self.library.apply_stats(&stats);
        }

        Ok(())
    }

    async fn collect_jobs_info(&self) -> Result<(), ApiError> {
        let jobs: JobsResponse = fetch(self.api.as_ref(), Command::GetJobs, &[]).await?;
        if let Some(jobs) = jobs.jobs {
            self.library.record_active_jobs(jobs.len());
        }
        Ok(())
    }
}
