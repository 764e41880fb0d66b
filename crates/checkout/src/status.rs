//! Order status transitions.

use common::{OrderId, OrderStatus};
use store::{Order, Store};

use crate::error::StatusError;

/// Moves orders through the status state machine.
pub struct OrderStatusService<S: Store> {
    store: S,
}

impl<S: Store> OrderStatusService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Parses `requested` and applies it if the order's current status
    /// allows that transition.
    ///
    /// The write is a compare-and-set on the status that was read, so two
    /// admins racing on the same order cannot both win.
    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        requested: &str,
    ) -> Result<Order, StatusError> {
        let next: OrderStatus = requested.parse()?;

        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(StatusError::OrderNotFound(order_id))?;

        if !order.status.can_transition_to(next) {
            return Err(StatusError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        let applied = self
            .store
            .compare_and_set_status(order_id, order.status, next)
            .await?;
        if !applied {
            return Err(StatusError::ConcurrentUpdate(order_id));
        }

        tracing::info!(
            from = %order.status,
            to = %next,
            terminal = next.is_terminal(),
            "order status updated"
        );
        order.status = next;
        Ok(order)
    }
}
