//! Currently selected policy
//!
//! Backed by a tokio watch channel: poll tasks read the value synchronously
//! at cycle start, and the latest-wins fetcher consumes it as a change stream.

use futures::Stream;
use tokio::sync::watch;
use tracing::debug;

/// Shared, externally-driven selection (nullable identifier)
#[derive(Clone)]
pub struct Selection {
    tx: watch::Sender<Option<String>>,
}

impl Selection {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Replace the selection; every call counts as a change, even if the
    /// identifier is the same
    pub fn select(&self, id: Option<String>) {
        debug!(?id, "Selection::select: called");
        self.tx.send_replace(id);
    }

    pub fn clear(&self) {
        self.select(None);
    }

    /// Read the selection without waiting
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    /// Stream of selection changes made after this call
    ///
    /// Rapid changes may coalesce into the most recent value. The stream ends
    /// when every `Selection` clone has been dropped.
    pub fn changes(&self) -> impl Stream<Item = Option<String>> + Send + Unpin + 'static {
        let rx = self.subscribe();
        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let value = rx.borrow_and_update().clone();
            Some((value, rx))
        }))
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_current_starts_empty() {
        let selection = Selection::new();
        assert_eq!(selection.current(), None);
        selection.select(Some("policy-1".to_string()));
        assert_eq!(selection.current().as_deref(), Some("policy-1"));
        selection.clear();
        assert_eq!(selection.current(), None);
    }

    #[tokio::test]
    async fn test_changes_stream() {
        let selection = Selection::new();
        let mut changes = selection.changes();

        selection.select(Some("policy-1".to_string()));
        assert_eq!(changes.next().await, Some(Some("policy-1".to_string())));

        selection.clear();
        assert_eq!(changes.next().await, Some(None));
    }

    #[tokio::test]
    async fn test_changes_end_when_dropped() {
        let selection = Selection::new();
        let mut changes = selection.changes();
        drop(selection);
        assert_eq!(changes.next().await, None);
    }
}
