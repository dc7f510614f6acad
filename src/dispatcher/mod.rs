//! Bounded-concurrency batch dispatcher.
//!
//! The `Dispatcher` owns the job registry, the pending queue and the active
//! set, and advances them one cycle at a time:
//! - [`admission`] - move pending jobs into free slots by submitting them
//! - [`poll_cycle`] - poll every active job, then finish, fail or time it out
//!
//! All state is mutated by the single task driving [`Dispatcher::run`]; status
//! polls may run concurrently but their outcomes are applied in order.

mod admission;
mod poll_cycle;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::export;
use crate::registry::JobRegistry;
use crate::report::{NoopReporter, ProgressReporter};
use crate::service::SearchService;
use crate::types::{BatchSummary, Event, Job, JobSpec, ProgressRecord, Status};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Drives a batch of search jobs to completion under a concurrency ceiling
pub struct Dispatcher {
    /// Configuration (shared read-only)
    pub(crate) config: Arc<Config>,
    /// Remote search service
    pub(crate) service: Arc<dyn SearchService>,
    /// Receives the progress snapshot every cycle
    pub(crate) reporter: Arc<dyn ProgressReporter>,
    /// Every job and its progress record
    pub(crate) registry: JobRegistry,
    /// Titles waiting for a slot, in job-list order
    pub(crate) pending: VecDeque<String>,
    /// Titles currently submitted and not yet terminal
    pub(crate) active: Vec<String>,
    /// Event broadcast channel sender
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl Dispatcher {
    /// Create a dispatcher for a batch of jobs.
    ///
    /// The default time window is resolved once here, so every job in the
    /// batch without its own range shares the same bounds.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or two jobs share a title
    pub fn new(config: Config, service: Arc<dyn SearchService>, specs: Vec<JobSpec>) -> Result<Self> {
        config.validate()?;
        let (earliest, latest) = config.window.resolve()?;

        let mut registry = JobRegistry::new();
        for spec in specs {
            registry.insert(Job::from_spec(spec, &earliest, &latest))?;
        }
        let pending: VecDeque<String> = registry.titles().map(String::from).collect();

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            service,
            reporter: Arc::new(NoopReporter),
            registry,
            pending,
            active: Vec::new(),
            event_tx,
        })
    }

    /// Replace the progress reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Subscribe to batch events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Job registry (read-only)
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Titles still waiting to be submitted
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Titles currently holding a slot
    pub fn active(&self) -> &[String] {
        &self.active
    }

    /// Whether every job has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    /// Current progress table
    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        self.registry.snapshot()
    }

    /// Run cycles until the pending queue and active set are both empty.
    ///
    /// Sleeps `poll_interval` between cycles, never after the last one.
    pub async fn run(&mut self) -> BatchSummary {
        info!(
            jobs = self.registry.len(),
            ceiling = self.config.dispatch.max_concurrent_searches,
            poll_interval_secs = self.config.dispatch.poll_interval.as_secs(),
            "starting batch"
        );

        while !self.is_finished() {
            self.run_cycle().await;
            if !self.is_finished() {
                tokio::time::sleep(self.config.dispatch.poll_interval).await;
            }
        }

        self.persist_progress();
        let summary = self.registry.summary();
        info!(
            done = summary.done,
            failed = summary.failed,
            timed_out = summary.timed_out,
            "batch complete"
        );
        self.emit_event(Event::BatchComplete { summary });
        summary
    }

    /// One admission pass, one poll pass, then a redraw
    pub async fn run_cycle(&mut self) {
        self.admit_pending().await;
        self.poll_active().await;
        self.reporter.render(&self.registry.snapshot());
    }

    /// Move a job to a terminal state, release its slot and persist the snapshot
    pub(crate) fn finish(&mut self, title: &str, status: Status) {
        debug_assert!(status.is_terminal());
        if let Err(e) = self.registry.transition(title, status) {
            warn!(title = %title, error = %e, "rejected status change");
        }
        self.release(title);
    }

    /// Evict a terminal job from the active set and persist the snapshot
    pub(crate) fn release(&mut self, title: &str) {
        self.active.retain(|t| t != title);
        self.persist_progress();
    }

    /// Overwrite the progress file with the current snapshot.
    ///
    /// A failed write is logged; the batch carries on.
    pub(crate) fn persist_progress(&self) {
        let path = &self.config.output.progress_file;
        if let Err(e) = export::write_progress(path, &self.registry.snapshot()) {
            warn!(path = %path.display(), error = %e, "failed to write progress snapshot");
        }
    }

    /// Broadcast an event to all subscribers
    pub(crate) fn emit_event(&self, event: Event) {
        // no receivers is fine
        self.event_tx.send(event).ok();
    }
}
