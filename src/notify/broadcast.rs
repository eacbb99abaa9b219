use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::OrderStatus;
use crate::notify::{courier_audience, DispatchEvent, Notifier, OfferPayload};

/// Fans dispatch events out to websocket sessions.
///
/// Every session subscribes to the same channel and keeps only the events
/// addressed to its audience key. Live sessions are counted per audience so
/// an offer to a courier without a session is reported as undeliverable.
pub struct BroadcastNotifier {
    events_tx: broadcast::Sender<DispatchEvent>,
    connections: DashMap<String, usize>,
}

impl BroadcastNotifier {
    pub fn new(buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(buffer_size);
        Self {
            events_tx,
            connections: DashMap::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events_tx.subscribe()
    }

    /// Marks `audience` as connected until the returned guard is dropped.
    pub fn connect(&self, audience: String) -> ConnectionGuard<'_> {
        *self.connections.entry(audience.clone()).or_insert(0) += 1;
        debug!(audience = %audience, "session connected");
        ConnectionGuard {
            notifier: self,
            audience,
        }
    }

    pub fn is_connected(&self, audience: &str) -> bool {
        self.connections
            .get(audience)
            .map(|count| *count > 0)
            .unwrap_or(false)
    }

    fn disconnect(&self, audience: &str) {
        self.connections.remove_if_mut(audience, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
        debug!(audience = %audience, "session disconnected");
    }

    fn publish(&self, event: DispatchEvent) -> Result<usize, AppError> {
        self.events_tx
            .send(event)
            .map_err(|_| AppError::NotificationFailure("no active subscribers".to_string()))
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify_courier_offer(
        &self,
        courier_id: Uuid,
        offer: OfferPayload,
    ) -> Result<(), AppError> {
        let audience = courier_audience(courier_id);
        if !self.is_connected(&audience) {
            return Err(AppError::NotificationFailure(format!(
                "courier {courier_id} is not connected"
            )));
        }

        self.publish(DispatchEvent::NewOffer { courier_id, offer })?;
        Ok(())
    }

    async fn notify_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        audience: &str,
    ) -> Result<(), AppError> {
        if !self.is_connected(audience) {
            debug!(order_id = %order_id, audience = %audience, "no session for status update");
            return Ok(());
        }

        self.publish(DispatchEvent::OrderUpdate {
            order_id,
            status,
            audience: audience.to_string(),
        })?;
        Ok(())
    }
}

pub struct ConnectionGuard<'a> {
    notifier: &'a BroadcastNotifier,
    audience: String,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.notifier.disconnect(&self.audience);
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::BroadcastNotifier;
    use crate::error::AppError;
    use crate::models::courier::GeoPoint;
    use crate::models::order::OrderStatus;
    use crate::notify::{courier_audience, DispatchEvent, Notifier, OfferPayload};

    fn offer() -> OfferPayload {
        OfferPayload {
            order_id: Uuid::new_v4(),
            restaurant_location: GeoPoint { lat: 0.0, lng: 0.0 },
            attempt_count: 1,
            timeout_seconds: 20,
        }
    }

    #[tokio::test]
    async fn offer_to_disconnected_courier_fails() {
        let notifier = BroadcastNotifier::new(16);
        let err = notifier
            .notify_courier_offer(Uuid::new_v4(), offer())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotificationFailure(_)));
    }

    #[tokio::test]
    async fn offer_reaches_connected_courier() {
        let notifier = BroadcastNotifier::new(16);
        let courier_id = Uuid::new_v4();
        let mut rx = notifier.subscribe();
        let _session = notifier.connect(courier_audience(courier_id));

        let payload = offer();
        notifier
            .notify_courier_offer(courier_id, payload.clone())
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.audience(), courier_audience(courier_id));
        assert_eq!(
            event,
            DispatchEvent::NewOffer {
                courier_id,
                offer: payload
            }
        );
    }

    #[tokio::test]
    async fn dropping_the_session_disconnects() {
        let notifier = BroadcastNotifier::new(16);
        let audience = "restaurant_1".to_string();

        let first = notifier.connect(audience.clone());
        let second = notifier.connect(audience.clone());
        drop(first);
        assert!(notifier.is_connected(&audience));
        drop(second);
        assert!(!notifier.is_connected(&audience));

        notifier
            .notify_status(Uuid::new_v4(), OrderStatus::Assigned, &audience)
            .await
            .unwrap();
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = DispatchEvent::OrderUpdate {
            order_id: Uuid::nil(),
            status: OrderStatus::NoCourierFound,
            audience: "restaurant_x".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ORDER_UPDATE");
        assert_eq!(json["status"], "NO_COURIER_FOUND");
    }
}
