//! ViolationsWatcher - location-driven poll coordinator
//!
//! Holds at most one poll task. Every location event cancels the held task
//! first; if the new location is under the violations prefix a fresh task is
//! started with filters parsed from that location.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::WatcherStats;
use crate::config::PollConfig;
use crate::domain::{LocationEvent, ParsedFilters};
use crate::events::Selection;
use crate::poll::{PollTask, PollTaskHandle};
use crate::service::AlertService;
use crate::sink::{DispatchGate, NotificationSink, new_gate};

/// The live poll task and the filters it was started with
struct ActivePoll {
    handle: PollTaskHandle,
    filters: ParsedFilters,
}

/// Watches locations and keeps exactly one poll task for the violations view
pub struct ViolationsWatcher {
    prefix: String,
    poll: PollConfig,
    service: Arc<dyn AlertService>,
    selection: Selection,
    sink: NotificationSink,
    gate: DispatchGate,
    shutdown: CancellationToken,
    active: Option<ActivePoll>,
    stats: WatcherStats,
}

impl ViolationsWatcher {
    pub fn new(
        prefix: impl Into<String>,
        poll: PollConfig,
        service: Arc<dyn AlertService>,
        selection: Selection,
        sink: NotificationSink,
        shutdown: CancellationToken,
    ) -> Self {
        let prefix = prefix.into();
        debug!(%prefix, interval_ms = poll.interval_ms, "ViolationsWatcher::new: called");
        Self {
            prefix,
            poll,
            service,
            selection,
            sink,
            gate: new_gate(),
            shutdown,
            active: None,
            stats: WatcherStats::default(),
        }
    }

    /// Handle one navigation
    ///
    /// Returns true if a new poll task was started.
    pub async fn handle_event(&mut self, event: &LocationEvent) -> bool {
        debug!(pathname = %event.pathname, search = %event.search, "ViolationsWatcher::handle_event: called");
        self.stats.events += 1;

        // Cancel polling in any case
        if let Some(prev) = self.active.take() {
            debug!(id = %prev.handle.id(), "Cancelling poll task");
            prev.handle.shutdown().await;
            self.stats.cancelled += 1;
        }

        if !event.matches_prefix(&self.prefix) {
            return false;
        }

        if self.shutdown.is_cancelled() {
            debug!("Shutdown requested, not starting a poll task");
            return false;
        }

        let filters = event.filters();
        let handle = PollTask::spawn(
            filters.clone(),
            &self.poll,
            self.service.clone(),
            self.selection.clone(),
            self.sink.clone(),
            self.gate.clone(),
            &self.shutdown,
        );
        info!(id = %handle.id(), ?filters, "Started violations poll task");
        self.active = Some(ActivePoll { handle, filters });
        self.stats.started += 1;
        true
    }

    pub fn active_task(&self) -> Option<&PollTaskHandle> {
        self.active.as_ref().map(|a| &a.handle)
    }

    pub fn active_filters(&self) -> Option<&ParsedFilters> {
        self.active.as_ref().map(|a| &a.filters)
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }

    /// Cancel the held task, if any, and wait for it to exit
    pub async fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.shutdown().await;
            self.stats.cancelled += 1;
        }
    }

    /// Consume location events until shutdown or the bus closes
    pub async fn run(mut self, mut events: broadcast::Receiver<LocationEvent>) -> WatcherStats {
        info!(prefix = %self.prefix, "ViolationsWatcher started");
        let shutdown = self.shutdown.clone();

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = events.recv() => received,
            };

            match received {
                Ok(event) => {
                    if AssertUnwindSafe(self.handle_event(&event)).catch_unwind().await.is_err() {
                        error!(pathname = %event.pathname, "Panic while handling location event");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "ViolationsWatcher lagged behind location bus");
                    self.stats.lagged += skipped;
                }
                Err(RecvError::Closed) => {
                    debug!("Location bus closed");
                    break;
                }
            }
        }

        self.teardown().await;
        info!(stats = ?self.stats, "ViolationsWatcher stopped");
        self.stats
    }
}
