use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::models::DomainEvent;

/// Fan-out point for domain events.
///
/// The engine publishes; the surrounding application (notification
/// service, auto-message sender) drains the receiver. Publishing never
/// blocks and never fails an engine operation: with no subscriber the
/// event is dropped with a trace log.
#[derive(Clone)]
pub struct EventBus {
    tx: UnboundedSender<DomainEvent>,
}

impl EventBus {
    /// Create a bus and the receiver the application drains.
    pub fn channel() -> (Self, UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: DomainEvent) {
        tracing::debug!(?event, "publishing domain event");
        if self.tx.send(event).is_err() {
            tracing::trace!("no event subscriber, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_subscriber() {
        let (bus, mut rx) = EventBus::channel();
        bus.publish(DomainEvent::MemberJoined {
            match_id: "m1".to_string(),
            user_id: "carol".to_string(),
        });

        match rx.recv().await {
            Some(DomainEvent::MemberJoined { match_id, user_id }) => {
                assert_eq!(match_id, "m1");
                assert_eq!(user_id, "carol");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscriber_is_silent() {
        let (bus, rx) = EventBus::channel();
        drop(rx);
        // Must not panic or error
        bus.publish(DomainEvent::MatchCreated {
            match_id: "m1".to_string(),
            users: vec!["a".to_string(), "b".to_string()],
        });
    }
}
