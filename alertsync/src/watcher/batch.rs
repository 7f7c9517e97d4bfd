//! BatchWatcher - one-shot fetch batches on navigation
//!
//! When a location enters one of the configured routes every fetch of that
//! route is fired concurrently. Nothing is retained: no handle, no
//! cancellation on the next navigation, no failure counting.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::WatcherStats;
use crate::config::BatchRoute;
use crate::domain::{FetchRequest, LocationEvent, Notification};
use crate::service::AlertService;
use crate::sink::NotificationSink;

/// Fires route batches; independent of the violations watcher
pub struct BatchWatcher {
    routes: Vec<BatchRoute>,
    service: Arc<dyn AlertService>,
    sink: NotificationSink,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    stats: WatcherStats,
}

impl BatchWatcher {
    pub fn new(
        routes: Vec<BatchRoute>,
        service: Arc<dyn AlertService>,
        sink: NotificationSink,
        shutdown: CancellationToken,
    ) -> Self {
        debug!(routes = routes.len(), "BatchWatcher::new: called");
        Self {
            routes,
            service,
            sink,
            shutdown,
            tracker: TaskTracker::new(),
            stats: WatcherStats::default(),
        }
    }

    /// Handle one navigation
    ///
    /// Returns the number of fetches fired.
    pub fn handle_event(&mut self, event: &LocationEvent) -> usize {
        debug!(pathname = %event.pathname, "BatchWatcher::handle_event: called");
        self.stats.events += 1;

        if self.shutdown.is_cancelled() {
            return 0;
        }

        let requests: Vec<FetchRequest> = self
            .routes
            .iter()
            .filter(|route| event.matches_prefix(&route.prefix))
            .flat_map(|route| route.requests())
            .collect();

        if requests.is_empty() {
            return 0;
        }

        info!(pathname = %event.pathname, fetches = requests.len(), "Firing route batch");
        let fired = requests.len();
        for request in requests {
            self.tracker.spawn(fire(
                request,
                self.service.clone(),
                self.sink.clone(),
                self.shutdown.clone(),
            ));
        }
        self.stats.started += fired as u64;
        fired
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }

    /// Number of batch fetches still in flight
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Consume location events until shutdown or the bus closes
    pub async fn run(mut self, mut events: broadcast::Receiver<LocationEvent>) -> WatcherStats {
        info!(routes = self.routes.len(), "BatchWatcher started");
        let shutdown = self.shutdown.clone();

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = events.recv() => received,
            };

            match received {
                Ok(event) => {
                    if std::panic::catch_unwind(AssertUnwindSafe(|| self.handle_event(&event))).is_err() {
                        error!(pathname = %event.pathname, "Panic while handling location event");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Skipped navigations are gone; any batch they would have fired is lost
                    let prefixes: Vec<&str> = self.routes.iter().map(|r| r.prefix.as_str()).collect();
                    warn!(
                        skipped,
                        ?prefixes,
                        "BatchWatcher lagged behind location bus, skipped navigations fire no batch"
                    );
                    self.stats.lagged += skipped;
                }
                Err(RecvError::Closed) => {
                    debug!("Location bus closed");
                    break;
                }
            }
        }

        // In-flight fetches observe the shutdown token; wait for them
        self.tracker.close();
        self.tracker.wait().await;
        info!(stats = ?self.stats, "BatchWatcher stopped");
        self.stats
    }
}

async fn fire(request: FetchRequest, service: Arc<dyn AlertService>, sink: NotificationSink, shutdown: CancellationToken) {
    let kind = request.kind();
    let result = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            debug!(%kind, "Batch fetch abandoned on shutdown");
            return;
        }
        result = service.fetch(&request) => result,
    };

    let notification = match result {
        Ok(payload) => Notification::success(kind, payload, request.context()),
        Err(e) => {
            warn!(%kind, error = %e, "Batch fetch failed");
            Notification::failure(kind, &e, request.context())
        }
    };
    sink.send(notification).await;
}
