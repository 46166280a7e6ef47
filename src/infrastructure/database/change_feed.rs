//! Broadcast-based change feed shared by the store adapters.

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::domain::models::{ChangeEvent, ChangeFilter};
use crate::domain::ports::ChangeFeed;

/// Default number of events buffered per subscriber before it lags.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// In-process fan-out of committed store changes.
///
/// Stores call [`BroadcastChangeFeed::publish`] after every successful commit.
/// Slow subscribers skip the events they missed and keep going.
#[derive(Debug, Clone)]
pub struct BroadcastChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl BroadcastChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a committed change. Dropped silently when nobody listens.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed for BroadcastChangeFeed {
    fn subscribe(&self, filter: ChangeFilter) -> BoxStream<'static, ChangeEvent> {
        let receiver = self.sender.subscribe();
        stream::unfold((receiver, filter), |(mut receiver, filter)| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if filter.matches(&event) => {
                        return Some((event, (receiver, filter)));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "change feed subscriber lagged; events dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Device, Installation};

    #[tokio::test]
    async fn test_subscriber_receives_matching_events_only() {
        let feed = BroadcastChangeFeed::new(16);
        let mut stream = feed.subscribe(ChangeFilter::installations_by("inst-1"));

        feed.publish(ChangeEvent::DeviceUpdated(Device::new("DEV-0")));
        feed.publish(ChangeEvent::InstallationCreated(Installation::new(
            "DEV-2", "inst-2", "1", 10.0,
        )));
        let mine = Installation::new("DEV-1", "inst-1", "1", 10.0);
        feed.publish(ChangeEvent::InstallationCreated(mine.clone()));

        let event = stream.next().await.expect("event");
        assert_eq!(event, ChangeEvent::InstallationCreated(mine));
    }

    #[tokio::test]
    async fn test_stream_ends_when_feed_dropped() {
        let feed = BroadcastChangeFeed::new(4);
        let mut stream = feed.subscribe(ChangeFilter::default());
        assert_eq!(feed.subscriber_count(), 1);
        drop(feed);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let feed = BroadcastChangeFeed::new(2);
        let mut stream = feed.subscribe(ChangeFilter::default());
        for i in 0..5 {
            feed.publish(ChangeEvent::DeviceUpdated(Device::new(format!("DEV-{i}"))));
        }
        let event = stream.next().await.expect("event after lag");
        assert!(matches!(event, ChangeEvent::DeviceUpdated(_)));
    }
}
