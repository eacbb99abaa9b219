use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub created_at: DateTime<Utc>,
}

impl Restaurant {
    pub fn audience_key(&self) -> String {
        restaurant_audience(self.id)
    }
}

pub fn restaurant_audience(restaurant_id: Uuid) -> String {
    format!("restaurant_{restaurant_id}")
}
