//! Order state machine
//!
//! ```text
//! draft ──form──▶ formed ──complete──────────────────────▶ completed
//!   │               │  └──request──▶ pending_completion ──callback──▶ completed
//!   │               │                  └──cancel / sweep──▶ formed
//!   │               └──reject──▶ rejected
//!   └──delete──▶ deleted ◀──delete── formed
//! ```
//!
//! Storage applies a transition as one conditional update guarded by
//! [`Transition::allowed_from`].

use crate::contract::{Order, OrderStatus};
use chrono::{DateTime, Utc};

/// A status change together with the fields it writes
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Owner submits the draft
    Form { at: DateTime<Utc> },
    /// Synchronous completion with an inline total
    Complete {
        moderator_id: i32,
        total_traffic: f64,
        at: DateTime<Utc>,
    },
    /// Async completion dispatched; waiting for the callback
    RequestCompletion {
        moderator_id: i32,
        at: DateTime<Utc>,
    },
    /// Dispatch failed or timed out; back to `formed`
    CancelCompletion,
    /// Callback from the external calculator
    ApplyTrafficResult {
        total_traffic: f64,
        at: DateTime<Utc>,
    },
    Reject {
        moderator_id: i32,
        at: DateTime<Utc>,
    },
    Delete,
}

impl Transition {
    /// Statuses the transition may start from
    pub fn allowed_from(&self) -> &'static [OrderStatus] {
        match self {
            Transition::Form { .. } => &[OrderStatus::Draft],
            Transition::Complete { .. }
            | Transition::RequestCompletion { .. }
            | Transition::Reject { .. } => &[OrderStatus::Formed],
            Transition::CancelCompletion | Transition::ApplyTrafficResult { .. } => {
                &[OrderStatus::PendingCompletion]
            }
            Transition::Delete => &[OrderStatus::Draft, OrderStatus::Formed],
        }
    }

    pub fn target(&self) -> OrderStatus {
        match self {
            Transition::Form { .. } => OrderStatus::Formed,
            Transition::Complete { .. } | Transition::ApplyTrafficResult { .. } => {
                OrderStatus::Completed
            }
            Transition::RequestCompletion { .. } => OrderStatus::PendingCompletion,
            Transition::CancelCompletion => OrderStatus::Formed,
            Transition::Reject { .. } => OrderStatus::Rejected,
            Transition::Delete => OrderStatus::Deleted,
        }
    }

    pub fn can_apply(&self, status: OrderStatus) -> bool {
        self.allowed_from().contains(&status)
    }

    /// Short verb used in messages and logs
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Form { .. } => "form",
            Transition::Complete { .. } => "complete",
            Transition::RequestCompletion { .. } => "request_completion",
            Transition::CancelCompletion => "cancel_completion",
            Transition::ApplyTrafficResult { .. } => "apply_traffic_result",
            Transition::Reject { .. } => "reject",
            Transition::Delete => "delete",
        }
    }

    /// Apply the field changes to an in-memory order. Callers check
    /// [`Transition::can_apply`] first.
    pub fn apply(&self, order: &mut Order) {
        order.status = self.target();
        match *self {
            Transition::Form { at } => {
                order.formed_at = Some(at);
            }
            Transition::Complete {
                moderator_id,
                total_traffic,
                at,
            } => {
                order.moderator_id = Some(moderator_id);
                order.total_traffic = total_traffic;
                order.traffic_calculated = true;
                order.completed_at = Some(at);
                order.completion_requested_at = None;
            }
            Transition::RequestCompletion { moderator_id, at } => {
                order.moderator_id = Some(moderator_id);
                order.completion_requested_at = Some(at);
            }
            Transition::CancelCompletion => {
                order.moderator_id = None;
                order.completion_requested_at = None;
            }
            Transition::ApplyTrafficResult { total_traffic, at } => {
                order.total_traffic = total_traffic;
                order.traffic_calculated = true;
                order.completed_at = Some(at);
                order.completion_requested_at = None;
            }
            Transition::Reject { moderator_id, at } => {
                order.moderator_id = Some(moderator_id);
                order.completed_at = Some(at);
            }
            Transition::Delete => {}
        }
    }
}

/// Human-readable guard failure for a transition attempted from `status`
pub fn guard_message(transition: &Transition, status: OrderStatus) -> String {
    match transition {
        Transition::Form { .. } => format!("only draft orders can be formed (status: {})", status),
        Transition::Complete { .. } | Transition::RequestCompletion { .. } => {
            format!("only formed orders can be completed (status: {})", status)
        }
        Transition::Reject { .. } => {
            format!("only formed orders can be rejected (status: {})", status)
        }
        Transition::CancelCompletion => {
            format!("order is not awaiting completion (status: {})", status)
        }
        Transition::ApplyTrafficResult { .. } => {
            format!("order is not awaiting a traffic result (status: {})", status)
        }
        Transition::Delete => format!("order cannot be deleted (status: {})", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formed_order() -> Order {
        let now = Utc::now();
        Order {
            id: 7,
            status: OrderStatus::Formed,
            client_id: 3,
            address: "Baumanskaya 5".to_string(),
            created_at: now,
            formed_at: Some(now),
            completed_at: None,
            completion_requested_at: None,
            moderator_id: None,
            total_traffic: 0.0,
            traffic_calculated: false,
        }
    }

    #[test]
    fn test_only_draft_and_formed_can_be_deleted() {
        for status in OrderStatus::ALL {
            let expected = matches!(status, OrderStatus::Draft | OrderStatus::Formed);
            assert_eq!(Transition::Delete.can_apply(status), expected, "{status}");
        }
    }

    #[test]
    fn test_callback_accepted_from_pending_only() {
        let t = Transition::ApplyTrafficResult {
            total_traffic: 1.0,
            at: Utc::now(),
        };
        for status in OrderStatus::ALL {
            let expected = status == OrderStatus::PendingCompletion;
            assert_eq!(t.can_apply(status), expected, "{status}");
        }
    }

    #[test]
    fn test_request_then_cancel_restores_formed() {
        let mut order = formed_order();
        Transition::RequestCompletion {
            moderator_id: 1,
            at: Utc::now(),
        }
        .apply(&mut order);
        assert_eq!(order.status, OrderStatus::PendingCompletion);
        assert_eq!(order.moderator_id, Some(1));

        Transition::CancelCompletion.apply(&mut order);
        assert_eq!(order.status, OrderStatus::Formed);
        assert_eq!(order.moderator_id, None);
        assert_eq!(order.completion_requested_at, None);
    }

    #[test]
    fn test_callback_keeps_requesting_moderator() {
        let mut order = formed_order();
        Transition::RequestCompletion {
            moderator_id: 9,
            at: Utc::now(),
        }
        .apply(&mut order);
        Transition::ApplyTrafficResult {
            total_traffic: 12.5,
            at: Utc::now(),
        }
        .apply(&mut order);

        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.moderator_id, Some(9));
        assert!(order.traffic_calculated);
        assert_eq!(order.total_traffic, 12.5);
        assert!(order.completed_at.is_some());
    }
}
