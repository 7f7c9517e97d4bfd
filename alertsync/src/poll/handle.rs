//! PollTaskHandle - owner's grip on a running background fetch task

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sink::{DispatchGate, cancel_guarded};

/// Cancellable handle to a spawned task
///
/// Exclusively owned by the watcher that spawned the task. Dropping the
/// handle cancels the task's token as well, but only [`cancel`](Self::cancel)
/// guarantees no notification is dispatched afterwards.
pub struct PollTaskHandle {
    id: String,
    token: CancellationToken,
    gate: DispatchGate,
    join: Option<JoinHandle<()>>,
}

impl PollTaskHandle {
    pub(crate) fn new(id: String, token: CancellationToken, gate: DispatchGate, join: JoinHandle<()>) -> Self {
        debug!(%id, "PollTaskHandle::new: called");
        Self {
            id,
            token,
            gate,
            join: Some(join),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the task has exited (cancelled, finished or panicked)
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Request cancellation
    ///
    /// Idempotent. When this returns the task can no longer dispatch; it
    /// exits at its next suspension point.
    pub async fn cancel(&mut self) {
        if self.token.is_cancelled() {
            debug!(id = %self.id, "PollTaskHandle::cancel: already cancelled");
            return;
        }
        debug!(id = %self.id, "PollTaskHandle::cancel: called");
        cancel_guarded(&self.gate, &self.token).await;
    }

    /// Wait for the task to exit on its own, without cancelling it
    pub async fn wait(&mut self) {
        if let Some(join) = self.join.as_mut() {
            let result = join.await;
            self.join = None;
            if let Err(e) = result
                && e.is_panic()
            {
                warn!(id = %self.id, "Task panicked");
            }
        }
    }

    /// Cancel and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.cancel().await;
        if let Some(join) = self.join.take()
            && let Err(e) = join.await
            && e.is_panic()
        {
            warn!(id = %self.id, "Task panicked before shutdown");
        }
    }
}

impl Drop for PollTaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for PollTaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollTaskHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
