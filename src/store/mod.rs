//! Persistence seam of the dispatch engine.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::Courier;
use crate::models::order::DeliveryOrder;
use crate::models::restaurant::Restaurant;

#[derive(Debug, Clone)]
pub struct OrderWithRestaurant {
    pub order: DeliveryOrder,
    pub restaurant: Restaurant,
}

/// Storage operations the dispatch engine and the response handler rely on.
///
/// `save_order` is a compare-and-swap on [`DeliveryOrder::version`]: it fails
/// with [`AppError::Conflict`] when the stored order changed since it was read,
/// and returns the committed order with its new version otherwise.
#[async_trait]
pub trait DispatchRepository: Send + Sync {
    async fn get_order_with_restaurant(&self, order_id: Uuid)
        -> Result<OrderWithRestaurant, AppError>;
    async fn list_available_couriers(&self) -> Result<Vec<Courier>, AppError>;
    async fn save_order(&self, order: DeliveryOrder) -> Result<DeliveryOrder, AppError>;
    async fn get_order(&self, order_id: Uuid) -> Result<DeliveryOrder, AppError>;
}
