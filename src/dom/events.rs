use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::dom::types::NodeHandle;

/// Raw notifications raised by the page. They carry just enough context for
/// the signal producers to decide whether a scan is warranted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    KeyDown {
        target: NodeHandle,
        key: String,
    },
    /// Raised before the page reacts to the activation, like a capture-phase listener.
    Activated {
        target: NodeHandle,
        tag: String,
        label: String,
        /// Label of the closest enclosing control (the target itself included).
        control_label: Option<String>,
    },
    NodesAdded {
        added: Vec<NodeHandle>,
    },
}

pub struct EventBus {
    tx: broadcast::Sender<PageEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }

    /// Publishes to every live subscriber. An event nobody listens to is dropped.
    pub fn publish(&self, event: PageEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("page event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(PageEvent::KeyDown {
            target: NodeHandle::new(0, 3),
            key: "Enter".into(),
        });

        match rx.recv().await.unwrap() {
            PageEvent::KeyDown { target, key } => {
                assert_eq!(target, NodeHandle::new(0, 3));
                assert_eq!(key, "Enter");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        bus.publish(PageEvent::NodesAdded { added: Vec::new() });
    }
}
