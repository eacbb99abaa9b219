use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::courier::GeoPoint;
use crate::models::restaurant::restaurant_audience;
use crate::notify::{courier_audience, DispatchEvent};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum CourierMessage {
    OrderResponse { order_id: Uuid, accepted: bool },
    LocationUpdate { lat: f64, lng: f64 },
    Heartbeat,
}

pub async fn courier_ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_courier_socket(socket, id, state))
}

pub async fn restaurant_ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_restaurant_socket(socket, id, state))
}

async fn handle_courier_socket(socket: WebSocket, courier_id: Uuid, state: Arc<AppState>) {
    let audience = courier_audience(courier_id);
    let (sender, mut receiver) = socket.split();
    let events = state.notifier.subscribe();
    let _session = state.notifier.connect(audience.clone());

    info!(courier_id = %courier_id, "courier websocket connected");

    let send_task = tokio::spawn(forward_events(sender, events, audience));

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else {
                continue;
            };

            match serde_json::from_str::<CourierMessage>(&text) {
                Ok(CourierMessage::OrderResponse { order_id, accepted }) => {
                    if let Err(err) = recv_state
                        .engine
                        .respond(order_id, courier_id, accepted)
                        .await
                    {
                        warn!(
                            courier_id = %courier_id,
                            order_id = %order_id,
                            error = %err,
                            "courier response rejected"
                        );
                    }
                }
                Ok(CourierMessage::LocationUpdate { lat, lng }) => {
                    let location = GeoPoint { lat, lng };
                    if let Err(err) = recv_state.store.set_courier_location(courier_id, location) {
                        warn!(courier_id = %courier_id, error = %err, "location update rejected");
                    }
                }
                Ok(CourierMessage::Heartbeat) => {}
                Err(err) => {
                    debug!(courier_id = %courier_id, error = %err, "ignoring malformed message");
                }
            }
        }
    });

    close_session(send_task, recv_task).await;

    info!(courier_id = %courier_id, "courier websocket disconnected");
}

async fn handle_restaurant_socket(socket: WebSocket, restaurant_id: Uuid, state: Arc<AppState>) {
    let audience = restaurant_audience(restaurant_id);
    let (sender, mut receiver) = socket.split();
    let events = state.notifier.subscribe();
    let _session = state.notifier.connect(audience.clone());

    info!(restaurant_id = %restaurant_id, "restaurant websocket connected");

    let (pong_tx, mut pong_rx) = tokio::sync::mpsc::channel::<()>(8);
    let send_task = tokio::spawn(async move {
        let mut sender = sender;
        let mut events = BroadcastStream::new(events);
        loop {
            tokio::select! {
                Some(()) = pong_rx.recv() => {
                    if sender.send(Message::Text("pong".into())).await.is_err() {
                        break;
                    }
                }
                event = events.next() => match event {
                    Some(Ok(event)) => {
                        if event.audience() == audience && !send_event(&mut sender, &event).await {
                            break;
                        }
                    }
                    Some(Err(err)) => warn!(error = %err, "restaurant websocket lagged"),
                    None => break,
                },
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(&msg, Message::Text(text) if text.as_str() == "ping")
                && pong_tx.send(()).await.is_err()
            {
                break;
            }
        }
    });

    close_session(send_task, recv_task).await;

    info!(restaurant_id = %restaurant_id, "restaurant websocket disconnected");
}

/// Waits for either half of a session to finish and aborts the other, so a
/// closed socket never leaves a task subscribed to the event channel.
async fn close_session(mut send_task: JoinHandle<()>, mut recv_task: JoinHandle<()>) {
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn forward_events(
    mut sender: SplitSink<WebSocket, Message>,
    events: tokio::sync::broadcast::Receiver<DispatchEvent>,
    audience: String,
) {
    let mut events = BroadcastStream::new(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(event) if event.audience() == audience => {
                if !send_event(&mut sender, &event).await {
                    break;
                }
            }
            Ok(_) => {}
            Err(err) => warn!(audience = %audience, error = %err, "websocket lagged"),
        }
    }
}

/// Returns `false` once the client is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &DispatchEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize dispatch event for ws");
            return true;
        }
    };

    sender.send(Message::Text(json.into())).await.is_ok()
}
