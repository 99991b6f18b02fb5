//! Domain events for the order lifecycle
//!
//! One event per successful transition. Publishing is best-effort: a failed
//! publish is logged and never undoes the transition.

use crate::contract::model::Order;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain event types for orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum OrderEvent {
    /// Owner submitted the draft
    OrderFormed(OrderEventData),
    /// Traffic calculation dispatched to the external calculator
    CompletionRequested(OrderEventData),
    /// Dispatch failed or the callback never arrived
    CompletionCancelled(OrderEventData),
    /// Order completed with a traffic total
    OrderCompleted(OrderCompletedEvent),
    /// Moderator rejected the order
    OrderRejected(OrderEventData),
    /// Order soft-deleted
    OrderDeleted(OrderEventData),
}

/// Common event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEventData {
    pub order_id: i32,
    pub client_id: i32,
    /// Account that triggered the change; `None` for the sweep
    pub actor_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

/// Event data for order completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order_id: i32,
    pub client_id: i32,
    pub moderator_id: Option<i32>,
    pub total_traffic: f64,
    /// `true` when the total came from the external calculator
    pub via_callback: bool,
    pub timestamp: DateTime<Utc>,
}

/// Event publisher trait for publishing domain events
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an audit event
    async fn publish(&self, event: OrderEvent) -> anyhow::Result<()>;
}

/// No-op event publisher for testing or when events are disabled
pub struct NoOpEventPublisher;

#[async_trait::async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: OrderEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Publisher writing events to the `smart_orders::audit` tracing target
pub struct TracingEventPublisher;

#[async_trait::async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: OrderEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&event)?;
        tracing::info!(target: "smart_orders::audit", event = %payload, "order event");
        Ok(())
    }
}

impl OrderEvent {
    fn data(order: &Order, actor_id: Option<i32>) -> OrderEventData {
        OrderEventData {
            order_id: order.id,
            client_id: order.client_id,
            actor_id,
            timestamp: Utc::now(),
        }
    }

    pub fn formed(order: &Order, actor_id: i32) -> Self {
        OrderEvent::OrderFormed(Self::data(order, Some(actor_id)))
    }

    pub fn completion_requested(order: &Order, moderator_id: i32) -> Self {
        OrderEvent::CompletionRequested(Self::data(order, Some(moderator_id)))
    }

    pub fn completion_cancelled(order: &Order) -> Self {
        OrderEvent::CompletionCancelled(Self::data(order, None))
    }

    pub fn completed(order: &Order, via_callback: bool) -> Self {
        OrderEvent::OrderCompleted(OrderCompletedEvent {
            order_id: order.id,
            client_id: order.client_id,
            moderator_id: order.moderator_id,
            total_traffic: order.total_traffic,
            via_callback,
            timestamp: Utc::now(),
        })
    }

    pub fn rejected(order: &Order, moderator_id: i32) -> Self {
        OrderEvent::OrderRejected(Self::data(order, Some(moderator_id)))
    }

    pub fn deleted(order: &Order, actor_id: i32) -> Self {
        OrderEvent::OrderDeleted(Self::data(order, Some(actor_id)))
    }

    pub fn order_id(&self) -> i32 {
        match self {
            OrderEvent::OrderFormed(e)
            | OrderEvent::CompletionRequested(e)
            | OrderEvent::CompletionCancelled(e)
            | OrderEvent::OrderRejected(e)
            | OrderEvent::OrderDeleted(e) => e.order_id,
            OrderEvent::OrderCompleted(e) => e.order_id,
        }
    }
}
