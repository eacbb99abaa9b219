use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::GeoPoint;
use crate::models::restaurant::Restaurant;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/restaurants", post(create_restaurant).get(list_restaurants))
}

#[derive(Deserialize)]
pub struct CreateRestaurantRequest {
    pub name: String,
    pub location: GeoPoint,
}

async fn create_restaurant(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRestaurantRequest>,
) -> Result<Json<Restaurant>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    validate_location(&payload.location)?;

    let restaurant = Restaurant {
        id: Uuid::new_v4(),
        name: payload.name,
        location: payload.location,
        created_at: Utc::now(),
    };

    state.store.insert_restaurant(restaurant.clone());
    Ok(Json(restaurant))
}

async fn list_restaurants(State(state): State<Arc<AppState>>) -> Json<Vec<Restaurant>> {
    Json(state.store.list_restaurants())
}

pub(crate) fn validate_location(location: &GeoPoint) -> Result<(), AppError> {
    let in_range = (-90.0..=90.0).contains(&location.lat)
        && (-180.0..=180.0).contains(&location.lng);
    if !in_range {
        return Err(AppError::BadRequest(format!(
            "location ({}, {}) is out of range",
            location.lat, location.lng
        )));
    }
    Ok(())
}
