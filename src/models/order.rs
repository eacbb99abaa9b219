use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Searching,
    Assigned,
    NoCourierFound,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Searching)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Searching => "SEARCHING",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::NoCourierFound => "NO_COURIER_FOUND",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub status: OrderStatus,
    pub assigned_courier: Option<Uuid>,
    /// Courier holding the open offer, if any.
    pub candidate_courier: Option<Uuid>,
    pub offer_sent_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    /// Bumped by the store on every successful save.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryOrder {
    pub fn new(restaurant_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            restaurant_id,
            status: OrderStatus::Searching,
            assigned_courier: None,
            candidate_courier: None,
            offer_sent_at: None,
            attempt_count: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
