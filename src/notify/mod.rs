//! Outbound notifications. Delivery is advisory: the engine logs failures
//! and keeps going, the persisted order stays the source of truth.

pub mod broadcast;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::GeoPoint;
use crate::models::order::OrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferPayload {
    pub order_id: Uuid,
    pub restaurant_location: GeoPoint,
    pub attempt_count: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchEvent {
    NewOffer {
        courier_id: Uuid,
        offer: OfferPayload,
    },
    OrderUpdate {
        order_id: Uuid,
        status: OrderStatus,
        audience: String,
    },
}

impl DispatchEvent {
    pub fn audience(&self) -> String {
        match self {
            DispatchEvent::NewOffer { courier_id, .. } => courier_audience(*courier_id),
            DispatchEvent::OrderUpdate { audience, .. } => audience.clone(),
        }
    }
}

pub fn courier_audience(courier_id: Uuid) -> String {
    format!("courier_{courier_id}")
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_courier_offer(
        &self,
        courier_id: Uuid,
        offer: OfferPayload,
    ) -> Result<(), AppError>;

    async fn notify_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        audience: &str,
    ) -> Result<(), AppError>;
}
