use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::dispatch::DispatchEngine;
use crate::error::AppError;
use crate::state::AppState;

/// Queues `order_id` for dispatch. The queue gauge is raised before the send
/// so the loop's decrement can never observe it below zero.
pub async fn enqueue_order(state: &AppState, order_id: Uuid) -> Result<(), AppError> {
    state.metrics.orders_in_queue.inc();

    if let Err(err) = state.order_tx.send(order_id).await {
        state.metrics.orders_in_queue.dec();
        return Err(AppError::Internal(format!("order queue send failed: {err}")));
    }

    Ok(())
}

/// Starts one concurrent dispatch run per queued order id.
pub async fn run_dispatch_loop(engine: Arc<DispatchEngine>, mut order_rx: mpsc::Receiver<Uuid>) {
    info!("dispatch loop started");

    while let Some(order_id) = order_rx.recv().await {
        engine.metrics().orders_in_queue.dec();
        engine.spawn(order_id);
    }

    warn!("dispatch loop stopped: queue channel closed");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::{enqueue_order, run_dispatch_loop};
    use crate::config::DispatchSettings;
    use crate::error::AppError;
    use crate::state::AppState;

    #[tokio::test]
    async fn closed_queue_rejects_order_and_leaves_gauge_at_zero() {
        let (state, order_rx) = AppState::new(4, 16, DispatchSettings::default());
        drop(order_rx);

        let result = enqueue_order(&state, Uuid::new_v4()).await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(state.metrics.orders_in_queue.get(), 0);
    }

    #[tokio::test]
    async fn gauge_counts_orders_until_the_loop_takes_them() {
        let (state, order_rx) = AppState::new(4, 16, DispatchSettings::default());

        // Unknown ids: the runs end as soon as they start.
        enqueue_order(&state, Uuid::new_v4()).await.unwrap();
        enqueue_order(&state, Uuid::new_v4()).await.unwrap();
        assert_eq!(state.metrics.orders_in_queue.get(), 2);

        let dispatch = tokio::spawn(run_dispatch_loop(state.engine.clone(), order_rx));
        for _ in 0..500 {
            if state.metrics.orders_in_queue.get() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(state.metrics.orders_in_queue.get(), 0);
        dispatch.abort();
    }
}
