use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::queue::enqueue_order;
use crate::error::AppError;
use crate::models::order::DeliveryOrder;
use crate::state::AppState;
use crate::store::DispatchRepository;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/respond", post(respond_to_offer))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub restaurant_id: Uuid,
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub courier_id: Uuid,
    pub accept: bool,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = DeliveryOrder::new(payload.restaurant_id);

    state.store.insert_order(order.clone())?;
    enqueue_order(&state, order.id).await?;

    Ok(Json(order))
}

async fn list_orders(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryOrder>> {
    Json(state.store.list_orders())
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(state.store.get_order(id).await?))
}

async fn respond_to_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = state
        .engine
        .respond(id, payload.courier_id, payload.accept)
        .await?;
    Ok(Json(order))
}
