//! Order event fan-out.
//!
//! Events are published after the transaction that caused them commits.
//! Slow receivers lag and lose old events; they never block a writer.

use chrono::{DateTime, Utc};
use galley_core::{OfferingId, OrderId, OrderItem, OrderItemId, OrderStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// What happened to an order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEventKind {
    /// A new item was placed.
    Placed { offering_id: OfferingId, quantity: u32 },
    /// The item moved one edge along the state graph.
    StatusChanged { from: OrderStatus, to: OrderStatus },
    /// A pending item had its quantity changed in place.
    QuantityChanged { from: u32, to: u32 },
    /// The item was flagged as archived.
    Archived,
}

/// A change to one order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub order_item_id: OrderItemId,
    #[serde(flatten)]
    pub kind: OrderEventKind,
    pub at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn placed(item: &OrderItem) -> Self {
        Self {
            order_id: item.order_id,
            order_item_id: item.id,
            kind: OrderEventKind::Placed {
                offering_id: item.offering_id,
                quantity: item.quantity,
            },
            at: item.created_at,
        }
    }

    pub fn status_changed(item: &OrderItem, from: OrderStatus) -> Self {
        Self {
            order_id: item.order_id,
            order_item_id: item.id,
            kind: OrderEventKind::StatusChanged {
                from,
                to: item.status,
            },
            at: item.updated_at,
        }
    }

    pub fn quantity_changed(item: &OrderItem, from: u32) -> Self {
        Self {
            order_id: item.order_id,
            order_item_id: item.id,
            kind: OrderEventKind::QuantityChanged {
                from,
                to: item.quantity,
            },
            at: item.updated_at,
        }
    }
}

/// Filter for event receivers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only events of this order.
    pub order_id: Option<OrderId>,
    /// Only events of this item.
    pub order_item_id: Option<OrderItemId>,
}

impl EventFilter {
    /// Create a filter for one order.
    pub fn order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    /// Create a filter for one item.
    pub fn item(order_item_id: OrderItemId) -> Self {
        Self {
            order_item_id: Some(order_item_id),
            ..Default::default()
        }
    }

    /// Check if an event matches this filter.
    pub fn matches(&self, event: &OrderEvent) -> bool {
        if self.order_id.map_or(false, |id| id != event.order_id) {
            return false;
        }
        if self.order_item_id.map_or(false, |id| id != event.order_item_id) {
            return false;
        }
        true
    }
}

/// Broadcast channel for order events.
#[derive(Clone)]
pub struct OrderEvents {
    sender: broadcast::Sender<OrderEvent>,
}

impl OrderEvents {
    /// Create a channel that buffers up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no receivers is not an error.
    pub fn publish(&self, event: OrderEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for OrderEvents {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(order: u64, item: u64) -> OrderEvent {
        OrderEvent {
            order_id: OrderId(order),
            order_item_id: OrderItemId(item),
            kind: OrderEventKind::StatusChanged {
                from: OrderStatus::Pending,
                to: OrderStatus::Preparing,
            },
            at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_order() {
        let filter = EventFilter::order(OrderId(7));
        assert!(filter.matches(&event(7, 1)));
        assert!(!filter.matches(&event(8, 1)));
        assert!(EventFilter::default().matches(&event(8, 1)));
    }

    #[test]
    fn test_filter_item() {
        let filter = EventFilter::item(OrderItemId(3));
        assert!(filter.matches(&event(1, 3)));
        assert!(!filter.matches(&event(1, 4)));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(event(1, 2)).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["from"], "pending");
        assert_eq!(json["to"], "preparing");
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let events = OrderEvents::new(16);
        let mut rx = events.subscribe();
        assert_eq!(events.receiver_count(), 1);

        events.publish(event(1, 2));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.order_item_id, OrderItemId(2));
    }

    #[test]
    fn test_publish_without_receivers() {
        let events = OrderEvents::default();
        events.publish(event(1, 2));
    }
}
