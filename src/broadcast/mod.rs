use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::debate::protocol::Outbound;

const TOPIC_CAPACITY: usize = 256;

/// Topic-keyed fan-out for room-scoped events.
///
/// `publish` is fire-and-forget: a topic with no live subscribers swallows
/// the event without error. WebSocket connections (and tests) attach with
/// `subscribe` and receive every frame published afterwards.
pub struct Broadcaster {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<Outbound>>>>,
}

impl Broadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub async fn publish(&self, topic: &str, event: Outbound) {
        let sender = {
            let topics = self.topics.read().await;
            topics.get(topic).cloned()
        };

        let Some(sender) = sender else {
            tracing::debug!(topic = %topic, "No subscribers for topic, dropping event");
            return;
        };

        if sender.send(event).is_err() {
            // Every receiver is gone; forget the channel so the map does not
            // accumulate dead topics for deleted rooms.
            tracing::debug!(topic = %topic, "All subscribers gone, dropping topic");
            let mut topics = self.topics.write().await;
            if topics
                .get(topic)
                .map(|s| s.receiver_count() == 0)
                .unwrap_or(false)
            {
                topics.remove(topic);
            }
        }
    }

    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<Outbound> {
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Number of live subscribers on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().await;
        topics.get(topic).map(|s| s.receiver_count()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::protocol::{Outbound, ServerEvent};

    fn event(content: &str) -> Outbound {
        Outbound::Event(ServerEvent::system("SYSTEM", content, 1))
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish("room/1", event("nobody listening")).await;
        assert_eq!(broadcaster.subscriber_count("room/1").await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_then_publish_delivers() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe("room/1").await;
        broadcaster.publish("room/1", event("hello")).await;

        match rx.recv().await.unwrap() {
            Outbound::Event(e) => assert_eq!(e.content, "hello"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let broadcaster = Broadcaster::new();
        let mut room_rx = broadcaster.subscribe("room/1").await;
        let mut error_rx = broadcaster.subscribe("error/1").await;

        broadcaster.publish("error/1", event("bad turn")).await;

        match error_rx.recv().await.unwrap() {
            Outbound::Event(e) => assert_eq!(e.content, "bad turn"),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(room_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let broadcaster = Broadcaster::new();
        let mut first = broadcaster.subscribe("chat/1").await;
        let mut second = broadcaster.subscribe("chat/1").await;

        broadcaster.publish("chat/1", event("to everyone")).await;

        assert!(matches!(first.recv().await.unwrap(), Outbound::Event(_)));
        assert!(matches!(second.recv().await.unwrap(), Outbound::Event(_)));
    }
}
