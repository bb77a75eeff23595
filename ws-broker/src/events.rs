use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::model::BrokerEvent;

/// Where broker status reports come from.
pub trait BrokerEventSource: Send + Sync {
    /// Receive every report of `workspace_id` published from now on.
    fn subscribe(&self, workspace_id: &str) -> mpsc::UnboundedReceiver<BrokerEvent>;
}

/// In-process delivery of broker reports, keyed by workspace.
///
/// Each subscriber gets its own unbounded queue, so reports of one workspace
/// are never displaced by traffic of another. Dropped subscribers are pruned
/// on the next publish for their workspace.
#[derive(Debug, Clone, Default)]
pub struct BrokerEventBus {
    subscribers: Arc<DashMap<String, Vec<mpsc::UnboundedSender<BrokerEvent>>>>,
}

impl BrokerEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a report. Returns how many subscribers received it.
    pub fn publish(&self, event: BrokerEvent) -> usize {
        let workspace_id = event.workspace_id.clone();
        let delivered = match self.subscribers.get_mut(&workspace_id) {
            Some(mut senders) => {
                senders.retain(|tx| tx.send(event.clone()).is_ok());
                senders.len()
            }
            None => 0,
        };

        if delivered == 0 {
            self.subscribers
                .remove_if(&workspace_id, |_, senders| senders.is_empty());
            debug!(workspace = %workspace_id, "No subscriber for broker event, dropping");
        }
        delivered
    }

    /// Number of live subscriptions across all workspaces.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .iter()
            .map(|entry| entry.value().iter().filter(|tx| !tx.is_closed()).count())
            .sum()
    }
}

impl BrokerEventSource for BrokerEventBus {
    fn subscribe(&self, workspace_id: &str) -> mpsc::UnboundedReceiver<BrokerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .entry(workspace_id.to_string())
            .or_default()
            .push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_only_matching_subscribers() {
        let bus = BrokerEventBus::new();
        assert_eq!(bus.publish(BrokerEvent::started("ws1")), 0);

        let mut rx1 = bus.subscribe("ws1");
        let mut rx2 = bus.subscribe("ws2");
        assert_eq!(bus.publish(BrokerEvent::started("ws1")), 1);
        assert_eq!(rx1.recv().await.unwrap(), BrokerEvent::started("ws1"));
        assert!(rx2.try_recv().is_err());

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(BrokerEvent::started("ws1")), 0);
    }

    #[tokio::test]
    async fn test_other_workspaces_cannot_crowd_out_reports() {
        let bus = BrokerEventBus::new();
        let mut rx = bus.subscribe("ws1");
        let _other = bus.subscribe("ws2");

        bus.publish(BrokerEvent::done("ws1", Vec::new()));
        for _ in 0..1000 {
            bus.publish(BrokerEvent::started("ws2"));
        }

        assert_eq!(rx.recv().await.unwrap(), BrokerEvent::done("ws1", Vec::new()));
    }
}
