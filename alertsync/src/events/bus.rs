//! Location bus - fan-out of router navigations to every watcher
//!
//! Uses a tokio broadcast channel so each watcher sees every event in
//! arrival order while keeping its own state.

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::LocationEvent;

/// Default channel capacity (events)
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// Broadcast source of location changes
#[derive(Clone)]
pub struct LocationBus {
    tx: broadcast::Sender<LocationEvent>,
}

impl LocationBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "LocationBus::new: called");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a navigation to all current subscribers
    ///
    /// Returns the number of subscribers that received it. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: LocationEvent) -> usize {
        debug!(pathname = %event.pathname, search = %event.search, "LocationBus::publish: called");
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to navigations published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LocationEvent> {
        debug!("LocationBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocationBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = LocationBus::default();
        assert_eq!(bus.publish(LocationEvent::new("/main/dashboard", "")), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_events_in_order() {
        let bus = LocationBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(LocationEvent::new("/main/violations", "?cluster=prod"));
        bus.publish(LocationEvent::new("/main/policies", ""));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().pathname, "/main/violations");
            assert_eq!(rx.recv().await.unwrap().pathname, "/main/policies");
        }
    }
}
