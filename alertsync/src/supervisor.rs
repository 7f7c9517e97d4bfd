//! Supervisor - wires the bus, the selection and every watcher together
//!
//! Owns the root cancellation token. Each watcher runs in its own task with a
//! child of that token; [`Supervisor::shutdown`] cancels the root and joins
//! every watcher, so no task outlives it.

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::domain::{FetchRequest, LocationEvent};
use crate::events::{LocationBus, Selection};
use crate::service::AlertService;
use crate::sink::NotificationSink;
use crate::watcher::{BatchWatcher, LatestFetcher, ViolationsWatcher, WatcherStats};

/// Buffer for queued alert-by-ID requests
const ALERT_REQUEST_BUFFER: usize = 32;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Supervisor is shut down")]
    ShutDown,
}

/// Final counters of every watcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub violations: WatcherStats,
    pub batches: WatcherStats,
    pub selected_policy: WatcherStats,
    pub alert_requests: WatcherStats,
}

/// Running set of watchers fed from one location bus
pub struct Supervisor {
    bus: LocationBus,
    selection: Selection,
    alert_tx: mpsc::Sender<String>,
    shutdown: CancellationToken,
    violations: JoinHandle<WatcherStats>,
    batches: JoinHandle<WatcherStats>,
    selected_policy: JoinHandle<WatcherStats>,
    alert_requests: JoinHandle<WatcherStats>,
}

impl Supervisor {
    /// Spawn all watchers
    ///
    /// Subscriptions are taken before this returns, so every event published
    /// afterwards is seen by every watcher.
    pub fn spawn(config: &Config, service: Arc<dyn AlertService>, sink: NotificationSink) -> Self {
        debug!(prefix = %config.routes.violations_prefix, "Supervisor::spawn: called");
        let shutdown = CancellationToken::new();
        let bus = LocationBus::new(config.bus.capacity);
        let selection = Selection::new();

        let violations = ViolationsWatcher::new(
            config.routes.violations_prefix.clone(),
            config.poll.clone(),
            service.clone(),
            selection.clone(),
            sink.clone(),
            shutdown.child_token(),
        );
        let violations = tokio::spawn(violations.run(bus.subscribe()));

        let batches = BatchWatcher::new(
            config.routes.batches.clone(),
            service.clone(),
            sink.clone(),
            shutdown.child_token(),
        );
        let batches = tokio::spawn(batches.run(bus.subscribe()));

        let policy_requests = selection
            .changes()
            .map(|selected| selected.map(FetchRequest::AlertsByPolicy));
        let selected_policy =
            LatestFetcher::new("selected-policy", service.clone(), sink.clone(), shutdown.child_token());
        let selected_policy = tokio::spawn(selected_policy.run(policy_requests));

        let (alert_tx, alert_rx) = mpsc::channel::<String>(ALERT_REQUEST_BUFFER);
        let alert_stream = Box::pin(futures::stream::unfold(alert_rx, |mut rx| async move {
            let id = rx.recv().await?;
            Some((Some(FetchRequest::Alert(id)), rx))
        }));
        let alert_requests = LatestFetcher::new("alert-request", service, sink, shutdown.child_token());
        let alert_requests = tokio::spawn(alert_requests.run(alert_stream));

        info!("Supervisor started");
        Self {
            bus,
            selection,
            alert_tx,
            shutdown,
            violations,
            batches,
            selected_policy,
            alert_requests,
        }
    }

    /// Publish a navigation; returns the number of watchers that received it
    pub fn navigate(&self, event: LocationEvent) -> usize {
        debug!(pathname = %event.pathname, "Supervisor::navigate: called");
        self.bus.publish(event)
    }

    /// Replace the selected policy; `None` clears it
    pub fn select_policy(&self, policy_id: Option<String>) {
        debug!(?policy_id, "Supervisor::select_policy: called");
        self.selection.select(policy_id);
    }

    /// Request a single alert by identifier; newer requests supersede older ones
    pub async fn request_alert(&self, alert_id: impl Into<String>) -> Result<(), SupervisorError> {
        let alert_id = alert_id.into();
        debug!(%alert_id, "Supervisor::request_alert: called");
        if self.shutdown.is_cancelled() {
            return Err(SupervisorError::ShutDown);
        }
        self.alert_tx.send(alert_id).await.map_err(|_| SupervisorError::ShutDown)
    }

    pub fn bus(&self) -> &LocationBus {
        &self.bus
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancel everything and wait for every watcher to stop
    pub async fn shutdown(self) -> SupervisorReport {
        info!("Supervisor shutting down");
        self.shutdown.cancel();

        let report = SupervisorReport {
            violations: join_watcher("violations", self.violations).await,
            batches: join_watcher("batches", self.batches).await,
            selected_policy: join_watcher("selected-policy", self.selected_policy).await,
            alert_requests: join_watcher("alert-request", self.alert_requests).await,
        };
        info!(?report, "Supervisor stopped");
        report
    }
}

async fn join_watcher(name: &str, handle: JoinHandle<WatcherStats>) -> WatcherStats {
    match handle.await {
        Ok(stats) => stats,
        Err(e) => {
            error!(%name, error = %e, "Watcher task failed");
            WatcherStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FetchContext, FetchKind, Notification};
    use crate::service::mock::{MockAlertService, MockOutcome};
    use serde_json::json;
    use std::time::Duration;

    fn supervisor() -> (
        Supervisor,
        Arc<MockAlertService>,
        tokio::sync::mpsc::Receiver<Notification>,
    ) {
        let service = Arc::new(MockAlertService::new());
        let (sink, rx) = NotificationSink::channel(256);
        let supervisor = Supervisor::spawn(&Config::default(), service.clone(), sink);
        (supervisor, service, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_watcher_sees_navigation() {
        let (supervisor, _service, _rx) = supervisor();
        assert_eq!(supervisor.navigate(LocationEvent::new("/main/policies", "")), 2);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = supervisor.shutdown().await;
        assert_eq!(report.violations.events, 1);
        assert_eq!(report.batches.events, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_violations_poll_and_selected_policy() {
        let (supervisor, service, mut rx) = supervisor();

        supervisor.navigate(LocationEvent::new("/main/violations", "?cluster=prod"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(service.call_count(FetchKind::AlertNumsByPolicy), 1);

        supervisor.select_policy(Some("p-1".to_string()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Selection change fetches right away
        assert_eq!(service.call_count(FetchKind::AlertsByPolicy), 1);

        // Next poll cycle includes the selected policy
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(service.call_count(FetchKind::AlertNumsByPolicy), 2);
        assert_eq!(service.call_count(FetchKind::AlertsByPolicy), 2);

        let report = supervisor.shutdown().await;
        assert_eq!(report.violations.started, 1);
        assert_eq!(report.violations.cancelled, 1);
        assert_eq!(report.selected_policy.started, 1);

        let mut kinds = Vec::new();
        while let Ok(note) = rx.try_recv() {
            kinds.push(note.fetch());
        }
        assert_eq!(kinds.len(), 4);
    }

    #[tokio::test]
    async fn test_request_alert() {
        let (supervisor, service, mut rx) = supervisor();
        service.set(FetchKind::Alert, MockOutcome::Ok(json!({"id": "a-7"})));

        supervisor.request_alert("a-7").await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            Notification::success(FetchKind::Alert, json!({"id": "a-7"}), FetchContext::AlertId("a-7".to_string()))
        );
        supervisor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling() {
        let (supervisor, service, _rx) = supervisor();
        supervisor.navigate(LocationEvent::new("/main/violations", ""));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!supervisor.is_shut_down());

        supervisor.shutdown().await;
        let calls = service.calls().len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(service.calls().len(), calls);
    }
}
