//! AlertStore - actor that owns AlertState
//!
//! Drains the notification channel, folds every notification into the
//! state, and rebroadcasts it to live subscribers. Snapshots are served
//! over a command channel.

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use super::dispatch::NotificationSink;
use super::state::AlertState;
use crate::domain::Notification;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Channel error")]
    ChannelError,
}

/// Commands sent to the AlertStore actor
#[derive(Debug)]
enum StoreCommand {
    Snapshot { reply: oneshot::Sender<AlertState> },
    Shutdown,
}

/// Handle to the AlertStore actor
#[derive(Clone)]
pub struct AlertStore {
    tx: mpsc::Sender<StoreCommand>,
    event_tx: broadcast::Sender<Notification>,
}

impl AlertStore {
    /// Spawn the actor and return its handle plus the sink that feeds it
    pub fn spawn(buffer: usize) -> (Self, NotificationSink) {
        debug!(buffer, "AlertStore::spawn: called");
        let (sink, notifications) = NotificationSink::channel(buffer);
        let (tx, rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(buffer.max(1));

        tokio::spawn(actor_loop(notifications, rx, event_tx.clone()));

        info!("AlertStore spawned");
        (Self { tx, event_tx }, sink)
    }

    /// Receive every notification applied after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.event_tx.subscribe()
    }

    /// Current state
    pub async fn snapshot(&self) -> Result<AlertState, StoreError> {
        debug!("AlertStore::snapshot: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }

    /// Stop the actor; notifications queued ahead of the command are applied first
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        debug!("AlertStore::shutdown: called");
        self.tx
            .send(StoreCommand::Shutdown)
            .await
            .map_err(|_| StoreError::ChannelError)
    }
}

async fn actor_loop(
    mut notifications: mpsc::Receiver<Notification>,
    mut commands: mpsc::Receiver<StoreCommand>,
    event_tx: broadcast::Sender<Notification>,
) {
    let mut state = AlertState::default();
    let mut notifications_open = true;

    loop {
        // Queued notifications are applied before any command is served
        tokio::select! {
            biased;
            maybe = notifications.recv(), if notifications_open => {
                match maybe {
                    Some(notification) => {
                        state.apply(&notification);
                        // No subscribers is fine
                        let _ = event_tx.send(notification);
                    }
                    None => {
                        debug!("AlertStore: all sinks dropped");
                        notifications_open = false;
                    }
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(StoreCommand::Snapshot { reply }) => {
                        let _ = reply.send(state.clone());
                    }
                    Some(StoreCommand::Shutdown) | None => break,
                }
            }
        }
    }

    info!(applied = state.notifications_applied, "AlertStore stopped");
}
