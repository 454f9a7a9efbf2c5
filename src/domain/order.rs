/// Order state machine
///
/// ```text
/// PENDING ──► FILLED     (driven by the simulated-execution task)
///    │
///    └──────► REJECTED   (reserved, no path drives it yet)
/// ```
///
/// Everything except `status` is fixed at admission.

use crate::domain::validation::OrderTicket;
use crate::shared::protocol::{Order, OrderId, OrderStatus};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

/// Attempted transition not allowed by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("order {id}: illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    /// FILLED 和 REJECTED 为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// Whether `self -> next` is a legal, one-directional step.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Filled) | (OrderStatus::Pending, OrderStatus::Rejected)
        )
    }
}

impl Order {
    /// Admits a validated ticket: fresh id, `created_at = now`, status PENDING.
    pub fn admit(ticket: OrderTicket) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: ticket.symbol,
            side: ticket.side,
            order_type: ticket.order_type,
            quantity: ticket.quantity,
            price: ticket.price,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Moves the order to `next`, leaving every other field untouched.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
