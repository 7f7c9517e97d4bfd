//! PollTask - repeating violations fetch with failure escalation
//!
//! Each cycle fetches the per-policy violation counts for the location's
//! filters and, when a policy is selected, that policy's alerts. Both run
//! concurrently and each dispatches its own outcome. A cycle with any
//! failed fetch bumps the consecutive-failure counter; reaching the
//! threshold dispatches a single "server unreachable" escalation. The task
//! then sleeps a fixed interval measured from the end of the fetch phase.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handle::PollTaskHandle;
use crate::config::PollConfig;
use crate::domain::{FetchRequest, Notification, ParsedFilters};
use crate::events::Selection;
use crate::service::AlertService;
use crate::sink::{DispatchGate, GuardedSink, NotificationSink};

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every fetch that ran succeeded
    Succeeded { fetched: usize },
    /// At least one fetch failed
    Failed { failed: usize, escalated: bool },
}

/// A cancellable repeating unit of remote fetches
pub struct PollTask {
    id: String,
    filters: ParsedFilters,
    interval: Duration,
    failure_threshold: u32,
    service: Arc<dyn AlertService>,
    selection: Selection,
    sink: GuardedSink,
    consecutive_failures: u32,
}

impl PollTask {
    pub(crate) fn new(
        filters: ParsedFilters,
        config: &PollConfig,
        service: Arc<dyn AlertService>,
        selection: Selection,
        sink: GuardedSink,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            filters,
            interval: config.interval(),
            failure_threshold: config.failure_threshold.max(1),
            service,
            selection,
            sink,
            consecutive_failures: 0,
        }
    }

    /// Spawn a poll task for `filters`
    ///
    /// The task's token is a child of `parent`, so tearing down the parent
    /// stops it too. Dispatch goes through `gate`, shared with every other
    /// task of the same stream.
    pub fn spawn(
        filters: ParsedFilters,
        config: &PollConfig,
        service: Arc<dyn AlertService>,
        selection: Selection,
        sink: NotificationSink,
        gate: DispatchGate,
        parent: &CancellationToken,
    ) -> PollTaskHandle {
        let token = parent.child_token();
        let guarded = GuardedSink::new(sink, gate.clone(), token.clone());
        let task = Self::new(filters, config, service, selection, guarded);
        let id = task.id.clone();
        debug!(%id, filters = ?task.filters, "PollTask::spawn: called");

        let join = tokio::spawn(task.run());
        PollTaskHandle::new(id, token, gate, join)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Run cycles until cancelled
    pub async fn run(mut self) {
        let token = self.sink.token().clone();
        info!(id = %self.id, interval_ms = self.interval.as_millis() as u64, "Poll task started");

        let mut cycles: u64 = 0;
        loop {
            if token.is_cancelled() {
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                outcome = self.run_cycle() => outcome,
            };
            cycles += 1;
            debug!(id = %self.id, cycle = cycles, ?outcome, "Poll cycle finished");

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(id = %self.id, cycles, "Poll task stopped");
    }

    /// Fetch once, dispatch outcomes, update the failure counter
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let mut requests = vec![FetchRequest::AlertNumsByPolicy(self.filters.clone())];
        match self.selection.current() {
            Some(policy_id) => requests.push(FetchRequest::AlertsByPolicy(policy_id)),
            None => debug!(id = %self.id, "No policy selected, skipping alerts-by-policy"),
        }

        let service = &self.service;
        let sink = &self.sink;
        let results = join_all(requests.into_iter().map(|request| async move {
            let kind = request.kind();
            let notification = match service.fetch(&request).await {
                Ok(payload) => Notification::success(kind, payload, request.context()),
                Err(e) => {
                    warn!(%kind, error = %e, "Error during alerts polling");
                    Notification::failure(kind, &e, request.context())
                }
            };
            let ok = !notification.is_failure();
            sink.dispatch(notification).await;
            ok
        }))
        .await;

        let failed = results.iter().filter(|ok| !**ok).count();
        if failed == 0 {
            self.consecutive_failures = 0;
            return CycleOutcome::Succeeded {
                fetched: results.len(),
            };
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let escalated = self.consecutive_failures == self.failure_threshold;
        if escalated {
            // Complain once the retry didn't help
            warn!(id = %self.id, failures = self.consecutive_failures, "Server unreachable");
            sink.dispatch(Notification::unreachable()).await;
        }

        CycleOutcome::Failed { failed, escalated }
    }
}
