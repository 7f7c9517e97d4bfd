//! LatestFetcher - one fetch per request, newest request wins
//!
//! Every incoming request supersedes the in-flight fetch of the same
//! stream. A superseded fetch is cancelled before its replacement starts,
//! so a slow stale response can never overwrite a newer one. A `None`
//! request (selection cleared) cancels without starting anything.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::WatcherStats;
use crate::domain::{FetchRequest, Notification};
use crate::poll::PollTaskHandle;
use crate::service::AlertService;
use crate::sink::{DispatchGate, GuardedSink, NotificationSink, new_gate};

pub struct LatestFetcher {
    name: String,
    service: Arc<dyn AlertService>,
    sink: NotificationSink,
    gate: DispatchGate,
    shutdown: CancellationToken,
    current: Option<PollTaskHandle>,
    stats: WatcherStats,
}

impl LatestFetcher {
    pub fn new(
        name: impl Into<String>,
        service: Arc<dyn AlertService>,
        sink: NotificationSink,
        shutdown: CancellationToken,
    ) -> Self {
        let name = name.into();
        debug!(%name, "LatestFetcher::new: called");
        Self {
            name,
            service,
            sink,
            gate: new_gate(),
            shutdown,
            current: None,
            stats: WatcherStats::default(),
        }
    }

    /// Supersede the in-flight fetch with `request`
    ///
    /// Returns true if a fetch was started.
    pub async fn handle_request(&mut self, request: Option<FetchRequest>) -> bool {
        debug!(name = %self.name, ?request, "LatestFetcher::handle_request: called");
        self.stats.events += 1;

        if let Some(prev) = self.current.take() {
            if !prev.is_finished() {
                debug!(name = %self.name, id = %prev.id(), "Superseding in-flight fetch");
                self.stats.cancelled += 1;
            }
            prev.shutdown().await;
        }

        let Some(request) = request else {
            return false;
        };
        if self.shutdown.is_cancelled() {
            return false;
        }

        let id = Uuid::now_v7().to_string();
        let token = self.shutdown.child_token();
        let sink = GuardedSink::new(self.sink.clone(), self.gate.clone(), token.clone());
        let join = tokio::spawn(fetch_once(request, self.service.clone(), sink));
        self.current = Some(PollTaskHandle::new(id, token, self.gate.clone(), join));
        self.stats.started += 1;
        true
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }

    pub fn in_flight(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Consume requests until shutdown or the stream ends
    pub async fn run<S>(mut self, mut requests: S) -> WatcherStats
    where
        S: Stream<Item = Option<FetchRequest>> + Unpin,
    {
        info!(name = %self.name, "LatestFetcher started");
        let shutdown = self.shutdown.clone();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = requests.next() => next,
            };
            match next {
                Some(request) => {
                    if AssertUnwindSafe(self.handle_request(request)).catch_unwind().await.is_err() {
                        error!(name = %self.name, "Panic while handling fetch request");
                    }
                }
                None => {
                    debug!(name = %self.name, "Request stream ended");
                    break;
                }
            }
        }

        // Let the latest fetch land unless we are shutting down
        if let Some(mut handle) = self.current.take() {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {}
                _ = handle.wait() => {}
            }
            handle.shutdown().await;
        }
        info!(name = %self.name, stats = ?self.stats, "LatestFetcher stopped");
        self.stats
    }
}

async fn fetch_once(request: FetchRequest, service: Arc<dyn AlertService>, sink: GuardedSink) {
    let kind = request.kind();
    let token = sink.token().clone();
    let result = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        result = service.fetch(&request) => result,
    };

    let notification = match result {
        Ok(payload) => Notification::success(kind, payload, request.context()),
        Err(e) => {
            warn!(%kind, error = %e, "Fetch failed");
            Notification::failure(kind, &e, request.context())
        }
    };
    sink.dispatch(notification).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FetchContext, FetchKind};
    use crate::service::mock::{MockAlertService, MockOutcome};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn fetcher() -> (LatestFetcher, Arc<MockAlertService>, mpsc::Receiver<Notification>) {
        let service = Arc::new(MockAlertService::new());
        let (sink, rx) = NotificationSink::channel(64);
        let fetcher = LatestFetcher::new("selected-policy", service.clone(), sink, CancellationToken::new());
        (fetcher, service, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_dropped() {
        let (mut fetcher, service, mut rx) = fetcher();
        // First request answers slowly, second quickly
        service.push(FetchKind::AlertsByPolicy, MockOutcome::Ok(json!("stale")), Duration::from_secs(3));
        service.push(FetchKind::AlertsByPolicy, MockOutcome::Ok(json!("fresh")), Duration::from_millis(10));

        fetcher
            .handle_request(Some(FetchRequest::AlertsByPolicy("p-1".to_string())))
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(fetcher.in_flight());

        fetcher
            .handle_request(Some(FetchRequest::AlertsByPolicy("p-2".to_string())))
            .await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let note = rx.try_recv().unwrap();
        assert_eq!(
            note,
            Notification::success(
                FetchKind::AlertsByPolicy,
                json!("fresh"),
                FetchContext::PolicyId("p-2".to_string())
            )
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(fetcher.stats().cancelled, 1);
        assert_eq!(service.call_count(FetchKind::AlertsByPolicy), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_selection_cancels_without_fetching() {
        let (mut fetcher, service, mut rx) = fetcher();
        service.push(FetchKind::AlertsByPolicy, MockOutcome::Ok(json!("late")), Duration::from_secs(1));

        fetcher
            .handle_request(Some(FetchRequest::AlertsByPolicy("p-1".to_string())))
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!fetcher.handle_request(None).await);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
        assert!(!fetcher.in_flight());
        assert_eq!(service.call_count(FetchKind::AlertsByPolicy), 1);
    }

    #[tokio::test]
    async fn test_failure_carries_identifier() {
        let (mut fetcher, service, mut rx) = fetcher();
        service.set(FetchKind::Alert, MockOutcome::Err(404));

        fetcher.handle_request(Some(FetchRequest::Alert("alert-1".to_string()))).await;

        match rx.recv().await.unwrap() {
            Notification::Failure { fetch, context, error } => {
                assert_eq!(fetch, FetchKind::Alert);
                assert_eq!(context, FetchContext::AlertId("alert-1".to_string()));
                assert!(error.contains("404"));
            }
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_until_stream_ends() {
        let (fetcher, service, mut rx) = fetcher();
        let requests = futures::stream::iter(vec![
            Some(FetchRequest::Alert("a-1".to_string())),
            None,
            Some(FetchRequest::Alert("a-2".to_string())),
        ]);

        let stats = fetcher.run(requests).await;
        assert_eq!(stats.events, 3);
        assert_eq!(stats.started, 2);

        // Only the last request lands; it was allowed to finish
        let note = rx.try_recv().unwrap();
        assert_eq!(
            note,
            Notification::success(
                FetchKind::Alert,
                json!({"kind": "alert"}),
                FetchContext::AlertId("a-2".to_string())
            )
        );
        assert!(rx.try_recv().is_err());
        assert!(service.call_count(FetchKind::Alert) >= 1);
    }
}
