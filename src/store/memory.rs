use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::{Courier, GeoPoint};
use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::models::restaurant::Restaurant;
use crate::store::{DispatchRepository, OrderWithRestaurant};

#[derive(Debug, Default)]
pub struct MemoryStore {
    couriers: DashMap<Uuid, Courier>,
    restaurants: DashMap<Uuid, Restaurant>,
    orders: DashMap<Uuid, DeliveryOrder>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_courier(&self, courier: Courier) {
        self.couriers.insert(courier.id, courier);
    }

    pub fn insert_restaurant(&self, restaurant: Restaurant) {
        self.restaurants.insert(restaurant.id, restaurant);
    }

    /// Stores a new order as-is. Later writes go through `save_order`.
    pub fn insert_order(&self, order: DeliveryOrder) -> Result<(), AppError> {
        if !self.restaurants.contains_key(&order.restaurant_id) {
            return Err(AppError::NotFound(format!(
                "restaurant {} not found",
                order.restaurant_id
            )));
        }

        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "order {} already exists",
                order.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    pub fn remove_order(&self, order_id: Uuid) -> Option<DeliveryOrder> {
        self.orders.remove(&order_id).map(|(_, order)| order)
    }

    pub fn list_couriers(&self) -> Vec<Courier> {
        self.couriers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn list_restaurants(&self) -> Vec<Restaurant> {
        self.restaurants
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn list_orders(&self) -> Vec<DeliveryOrder> {
        let mut orders: Vec<DeliveryOrder> = self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| order.created_at);
        orders
    }

    pub fn get_restaurant(&self, restaurant_id: Uuid) -> Result<Restaurant, AppError> {
        self.restaurants
            .get(&restaurant_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("restaurant {restaurant_id} not found")))
    }

    pub fn set_courier_availability(
        &self,
        courier_id: Uuid,
        available: bool,
    ) -> Result<Courier, AppError> {
        let mut courier = self
            .couriers
            .get_mut(&courier_id)
            .ok_or_else(|| AppError::NotFound(format!("courier {courier_id} not found")))?;

        courier.available = available;
        courier.updated_at = Utc::now();
        Ok(courier.clone())
    }

    pub fn set_courier_location(
        &self,
        courier_id: Uuid,
        location: GeoPoint,
    ) -> Result<Courier, AppError> {
        let mut courier = self
            .couriers
            .get_mut(&courier_id)
            .ok_or_else(|| AppError::NotFound(format!("courier {courier_id} not found")))?;

        courier.location = location;
        courier.updated_at = Utc::now();
        Ok(courier.clone())
    }

    /// Orders still searching whose open offer belongs to `courier_id`.
    pub fn offers_for_courier(&self, courier_id: Uuid) -> Result<Vec<DeliveryOrder>, AppError> {
        if !self.couriers.contains_key(&courier_id) {
            return Err(AppError::NotFound(format!("courier {courier_id} not found")));
        }

        Ok(self
            .orders
            .iter()
            .filter(|entry| {
                let order = entry.value();
                order.status == OrderStatus::Searching
                    && order.candidate_courier == Some(courier_id)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    pub fn courier_count(&self) -> usize {
        self.couriers.len()
    }

    pub fn restaurant_count(&self) -> usize {
        self.restaurants.len()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

#[async_trait]
impl DispatchRepository for MemoryStore {
    async fn get_order_with_restaurant(
        &self,
        order_id: Uuid,
    ) -> Result<OrderWithRestaurant, AppError> {
        let order = self.get_order(order_id).await?;
        let restaurant = self.get_restaurant(order.restaurant_id)?;
        Ok(OrderWithRestaurant { order, restaurant })
    }

    async fn list_available_couriers(&self) -> Result<Vec<Courier>, AppError> {
        Ok(self
            .couriers
            .iter()
            .filter(|entry| entry.value().available)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn save_order(&self, mut order: DeliveryOrder) -> Result<DeliveryOrder, AppError> {
        let mut stored = self
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order.id)))?;

        if stored.version != order.version {
            return Err(AppError::Conflict(format!(
                "order {} was modified concurrently (expected version {}, found {})",
                order.id, order.version, stored.version
            )));
        }

        order.version += 1;
        order.updated_at = Utc::now();
        *stored = order.clone();
        Ok(order)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<DeliveryOrder, AppError> {
        self.orders
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
    }
}
