//! Notification dispatch
//!
//! `NotificationSink` is the cloneable sending half of the result channel.
//! `GuardedSink` wraps it for one cancellable task: dispatch and cancel
//! serialize on a gate shared by every task of the same logical stream, so
//! a cancelled task can never dispatch once `cancel` has returned. Channel
//! capacity is reserved before the gate is taken, so a full sink never
//! holds the gate and cancel never waits on a slow consumer.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::Notification;

/// Sending side of the result channel
#[derive(Clone)]
pub struct NotificationSink {
    tx: mpsc::Sender<Notification>,
}

impl NotificationSink {
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver that drains it
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        debug!(buffer, "NotificationSink::channel: called");
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Deliver a notification
    ///
    /// Returns false if the receiving side is gone; never errors.
    pub async fn send(&self, notification: Notification) -> bool {
        debug!(fetch = ?notification.fetch(), failure = notification.is_failure(), "NotificationSink::send: called");
        match self.tx.send(notification).await {
            Ok(()) => true,
            Err(_) => {
                warn!("Notification sink closed, dropping notification");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Serialization point shared by all tasks of one stream
pub type DispatchGate = Arc<Mutex<()>>;

/// Create a gate for a new stream
pub fn new_gate() -> DispatchGate {
    Arc::new(Mutex::new(()))
}

/// Sink bound to one task's cancellation token and its stream's gate
#[derive(Clone)]
pub struct GuardedSink {
    sink: NotificationSink,
    gate: DispatchGate,
    token: CancellationToken,
}

impl GuardedSink {
    pub fn new(sink: NotificationSink, gate: DispatchGate, token: CancellationToken) -> Self {
        Self { sink, gate, token }
    }

    /// Dispatch unless the owning task was cancelled
    ///
    /// Returns whether the notification was delivered.
    pub async fn dispatch(&self, notification: Notification) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!(fetch = ?notification.fetch(), "GuardedSink::dispatch: cancelled while waiting for capacity");
                return false;
            }
            permit = self.sink.tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Notification sink closed, dropping notification");
                    return false;
                }
            },
        };

        let _guard = self.gate.lock().await;
        if self.token.is_cancelled() {
            debug!(fetch = ?notification.fetch(), "GuardedSink::dispatch: task cancelled, dropping");
            return false;
        }
        debug!(fetch = ?notification.fetch(), failure = notification.is_failure(), "GuardedSink::dispatch: sending");
        permit.send(notification);
        true
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Cancel `token` while holding `gate`
///
/// Once this returns no dispatch through a `GuardedSink` bound to `token`
/// can reach the sink.
pub async fn cancel_guarded(gate: &DispatchGate, token: &CancellationToken) {
    let _guard = gate.lock().await;
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FetchContext, FetchKind};
    use serde_json::json;
    use std::time::Duration;

    fn note() -> Notification {
        Notification::success(FetchKind::AlertsByTimeseries, json!([]), FetchContext::None)
    }

    #[tokio::test]
    async fn test_send_to_closed_sink_returns_false() {
        let (sink, rx) = NotificationSink::channel(4);
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.send(note()).await);
    }

    #[tokio::test]
    async fn test_guarded_dispatch_stops_after_cancel() {
        let (sink, mut rx) = NotificationSink::channel(4);
        let gate = new_gate();
        let token = CancellationToken::new();
        let guarded = GuardedSink::new(sink, gate.clone(), token.clone());

        assert!(guarded.dispatch(note()).await);
        cancel_guarded(&gate, &token).await;
        assert!(!guarded.dispatch(note()).await);

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_does_not_wait_on_full_sink() {
        let (sink, mut rx) = NotificationSink::channel(1);
        let gate = new_gate();
        let token = CancellationToken::new();
        let guarded = GuardedSink::new(sink, gate.clone(), token.clone());

        // Fill the only slot, then park a second dispatch on capacity
        assert!(guarded.dispatch(note()).await);
        let parked = tokio::spawn({
            let guarded = guarded.clone();
            async move { guarded.dispatch(note()).await }
        });
        tokio::task::yield_now().await;
        assert!(!parked.is_finished());

        tokio::time::timeout(Duration::from_secs(1), cancel_guarded(&gate, &token))
            .await
            .expect("cancel blocked behind a full sink");
        assert!(!parked.await.unwrap());

        // Freed capacity does not let the cancelled task through
        assert!(rx.recv().await.is_some());
        assert!(!guarded.dispatch(note()).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_to_closed_sink_returns_false() {
        let (sink, rx) = NotificationSink::channel(1);
        drop(rx);
        let guarded = GuardedSink::new(sink, new_gate(), CancellationToken::new());
        assert!(!guarded.dispatch(note()).await);
    }
}
