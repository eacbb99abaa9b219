use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::dispatch::DispatchEngine;
use crate::error::AppError;
use crate::models::order::{DeliveryOrder, OrderStatus};

impl DispatchEngine {
    /// Records a courier's answer to the open offer on `order_id` and wakes
    /// the run waiting on it.
    ///
    /// Only the current candidate may answer. Once the offer expired, or was
    /// already answered, the courier is no longer the candidate and the call
    /// fails with `NotAuthorized`.
    pub async fn respond(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
        accept: bool,
    ) -> Result<DeliveryOrder, AppError> {
        let mut order = self.repo().get_order(order_id).await?;

        if order.status != OrderStatus::Searching || order.candidate_courier != Some(courier_id) {
            warn!(
                order_id = %order_id,
                courier_id = %courier_id,
                status = order.status.as_str(),
                "response from a courier without an open offer"
            );
            return Err(AppError::NotAuthorized(format!(
                "courier {courier_id} holds no open offer for order {order_id}"
            )));
        }

        if accept {
            order.assigned_courier = Some(courier_id);
            order.status = OrderStatus::Assigned;
        }
        order.candidate_courier = None;

        let order = self.repo().save_order(order).await?;

        info!(
            order_id = %order_id,
            courier_id = %courier_id,
            accepted = accept,
            "courier responded"
        );

        if !self.supervisor().signal(order_id, courier_id) {
            debug!(order_id = %order_id, "no dispatch run waiting on this order");
        }

        Ok(order)
    }
}
