use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DispatchSettings;
use crate::engine::coordinator::{OfferCoordinator, WaitOutcome};
use crate::engine::supervisor::DispatchSupervisor;
use crate::error::{missing_as_none, AppError};
use crate::geo::filter_by_radius;
use crate::models::courier::Courier;
use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::models::restaurant::Restaurant;
use crate::notify::{Notifier, OfferPayload};
use crate::observability::metrics::Metrics;
use crate::store::{DispatchRepository, OrderWithRestaurant};

/// Attempts at clearing an expired offer. A conflict there means the
/// courier's answer committed first, so the order is re-read and judged again.
const EXPIRE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Assigned(Uuid),
    NoCourierFound,
    /// The order was already out of `SEARCHING` when the run started.
    Skipped,
    /// The order disappeared while the run was in progress.
    Aborted,
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Assigned(_) => "assigned",
            DispatchOutcome::NoCourierFound => "no_courier_found",
            DispatchOutcome::Skipped => "skipped",
            DispatchOutcome::Aborted => "aborted",
        }
    }
}

/// Offers one order at a time to the nearest untried courier, widening the
/// search radius tier by tier until a courier accepts or the pool runs dry.
pub struct DispatchEngine {
    repo: Arc<dyn DispatchRepository>,
    notifier: Arc<dyn Notifier>,
    supervisor: Arc<DispatchSupervisor>,
    settings: DispatchSettings,
    metrics: Metrics,
}

impl DispatchEngine {
    pub fn new(
        repo: Arc<dyn DispatchRepository>,
        notifier: Arc<dyn Notifier>,
        supervisor: Arc<DispatchSupervisor>,
        settings: DispatchSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            repo,
            notifier,
            supervisor,
            settings,
            metrics,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub(crate) fn repo(&self) -> &dyn DispatchRepository {
        self.repo.as_ref()
    }

    pub(crate) fn supervisor(&self) -> &DispatchSupervisor {
        &self.supervisor
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Runs dispatch for `order_id` on its own task.
    pub fn spawn(self: &Arc<Self>, order_id: Uuid) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run_observed(order_id).await })
    }

    async fn run_observed(&self, order_id: Uuid) {
        let start = Instant::now();
        let outcome = match self.run(order_id).await {
            Ok(outcome) => outcome.label(),
            Err(err) => {
                error!(order_id = %order_id, error = %err, "dispatch run failed");
                "error"
            }
        };

        self.metrics
            .dispatch_run_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .dispatch_runs_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Drives one order from `SEARCHING` to a terminal status.
    ///
    /// Available couriers are read once at the start; couriers that go off
    /// shift or come on shift mid-run are not re-checked. Store errors abort
    /// the run and leave the order in its last committed state.
    pub async fn run(&self, order_id: Uuid) -> Result<DispatchOutcome, AppError> {
        let Some(OrderWithRestaurant { order, restaurant }) =
            missing_as_none(self.repo.get_order_with_restaurant(order_id).await)?
        else {
            return Ok(vanished(order_id));
        };

        if order.status != OrderStatus::Searching {
            debug!(
                order_id = %order_id,
                status = order.status.as_str(),
                "order is not searching; skipping dispatch"
            );
            return Ok(DispatchOutcome::Skipped);
        }

        let couriers = self.repo.list_available_couriers().await?;
        let mut tried: HashSet<Uuid> = HashSet::new();

        info!(
            order_id = %order_id,
            restaurant_id = %restaurant.id,
            available = couriers.len(),
            "dispatch started"
        );

        for &radius_km in &self.settings.search_radii_km {
            let nearby = filter_by_radius(&couriers, &restaurant.location, radius_km);
            debug!(order_id = %order_id, radius_km, nearby = nearby.len(), "searching radius tier");

            for courier in nearby {
                if !tried.insert(courier.id) {
                    continue;
                }

                if let Some(outcome) = self.offer(order_id, &restaurant, courier).await? {
                    return Ok(outcome);
                }
            }
        }

        self.give_up(order_id, &restaurant).await
    }

    /// Offers the order to `courier` and waits for the answer. `None` means
    /// the courier passed and the run moves on.
    async fn offer(
        &self,
        order_id: Uuid,
        restaurant: &Restaurant,
        courier: &Courier,
    ) -> Result<Option<DispatchOutcome>, AppError> {
        let Some(mut order) = missing_as_none(self.repo.get_order(order_id).await)? else {
            return Ok(Some(vanished(order_id)));
        };
        if order.status.is_terminal() {
            return Ok(Some(settled(&order)));
        }

        // Registered before the candidate is committed so an answer racing
        // the wait below still finds the coordinator.
        let registration = self
            .supervisor
            .register(order_id, Arc::new(OfferCoordinator::new(courier.id)));

        order.candidate_courier = Some(courier.id);
        order.offer_sent_at = Some(Utc::now());
        order.attempt_count += 1;
        let Some(order) = missing_as_none(self.repo.save_order(order).await)? else {
            return Ok(Some(vanished(order_id)));
        };

        info!(
            order_id = %order_id,
            courier_id = %courier.id,
            attempt = order.attempt_count,
            "offer sent"
        );

        let payload = OfferPayload {
            order_id,
            restaurant_location: restaurant.location,
            attempt_count: order.attempt_count,
            timeout_seconds: self.settings.offer_timeout.as_secs(),
        };
        if let Err(err) = self.notifier.notify_courier_offer(courier.id, payload).await {
            warn!(
                order_id = %order_id,
                courier_id = %courier.id,
                error = %err,
                "offer notification failed; courier can still poll"
            );
        }

        let in_flight = self.metrics.track_offer();
        let waited = registration
            .coordinator()
            .wait(self.settings.offer_timeout)
            .await;
        drop(in_flight);
        drop(registration);

        match waited {
            WaitOutcome::Responded => self.collect_answer(order_id, restaurant, courier).await,
            WaitOutcome::TimedOut => self.expire_offer(order_id, restaurant, courier).await,
        }
    }

    async fn collect_answer(
        &self,
        order_id: Uuid,
        restaurant: &Restaurant,
        courier: &Courier,
    ) -> Result<Option<DispatchOutcome>, AppError> {
        let Some(order) = missing_as_none(self.repo.get_order(order_id).await)? else {
            return Ok(Some(vanished(order_id)));
        };

        match order.status {
            OrderStatus::Assigned => Ok(Some(self.accepted(&order, restaurant, courier).await)),
            OrderStatus::NoCourierFound => Ok(Some(DispatchOutcome::NoCourierFound)),
            OrderStatus::Searching => {
                self.metrics.offers_total.with_label_values(&["declined"]).inc();
                info!(order_id = %order_id, courier_id = %courier.id, "offer declined");
                Ok(None)
            }
        }
    }

    /// Withdraws an unanswered offer. An acceptance that committed before the
    /// withdrawal wins; once the withdrawal commits, the courier's answer is
    /// rejected by the response handler.
    async fn expire_offer(
        &self,
        order_id: Uuid,
        restaurant: &Restaurant,
        courier: &Courier,
    ) -> Result<Option<DispatchOutcome>, AppError> {
        for _ in 0..EXPIRE_ATTEMPTS {
            let Some(mut order) = missing_as_none(self.repo.get_order(order_id).await)? else {
                return Ok(Some(vanished(order_id)));
            };

            match order.status {
                OrderStatus::Assigned => {
                    return Ok(Some(self.accepted(&order, restaurant, courier).await));
                }
                OrderStatus::NoCourierFound => return Ok(Some(DispatchOutcome::NoCourierFound)),
                OrderStatus::Searching => {}
            }

            if order.candidate_courier != Some(courier.id) {
                // Declined without the signal reaching us.
                self.metrics.offers_total.with_label_values(&["declined"]).inc();
                return Ok(None);
            }

            order.candidate_courier = None;
            match self.repo.save_order(order).await {
                Ok(_) => {
                    self.metrics.offers_total.with_label_values(&["timed_out"]).inc();
                    info!(order_id = %order_id, courier_id = %courier.id, "offer timed out");
                    return Ok(None);
                }
                Err(AppError::Conflict(_)) => {
                    debug!(order_id = %order_id, "offer answered while expiring; re-reading");
                }
                Err(AppError::NotFound(_)) => return Ok(Some(vanished(order_id))),
                Err(err) => return Err(err),
            }
        }

        Err(AppError::Conflict(format!(
            "order {order_id} kept changing while expiring the offer"
        )))
    }

    async fn accepted(
        &self,
        order: &DeliveryOrder,
        restaurant: &Restaurant,
        courier: &Courier,
    ) -> DispatchOutcome {
        self.metrics.offers_total.with_label_values(&["accepted"]).inc();
        let courier_id = order.assigned_courier.unwrap_or(courier.id);
        info!(
            order_id = %order.id,
            courier_id = %courier_id,
            attempts = order.attempt_count,
            "order assigned"
        );

        self.announce(order, restaurant).await;
        DispatchOutcome::Assigned(courier_id)
    }

    async fn give_up(
        &self,
        order_id: Uuid,
        restaurant: &Restaurant,
    ) -> Result<DispatchOutcome, AppError> {
        let Some(mut order) = missing_as_none(self.repo.get_order(order_id).await)? else {
            return Ok(vanished(order_id));
        };
        if order.status.is_terminal() {
            return Ok(settled(&order));
        }

        order.status = OrderStatus::NoCourierFound;
        order.candidate_courier = None;
        let Some(order) = missing_as_none(self.repo.save_order(order).await)? else {
            return Ok(vanished(order_id));
        };

        info!(order_id = %order_id, attempts = order.attempt_count, "no courier found");
        self.announce(&order, restaurant).await;
        Ok(DispatchOutcome::NoCourierFound)
    }

    async fn announce(&self, order: &DeliveryOrder, restaurant: &Restaurant) {
        if let Err(err) = self
            .notifier
            .notify_status(order.id, order.status, &restaurant.audience_key())
            .await
        {
            warn!(order_id = %order.id, error = %err, "status notification failed");
        }
    }
}

fn vanished(order_id: Uuid) -> DispatchOutcome {
    warn!(order_id = %order_id, "order vanished; aborting dispatch");
    DispatchOutcome::Aborted
}

fn settled(order: &DeliveryOrder) -> DispatchOutcome {
    match (order.status, order.assigned_courier) {
        (OrderStatus::Assigned, Some(courier_id)) => DispatchOutcome::Assigned(courier_id),
        (OrderStatus::NoCourierFound, _) => DispatchOutcome::NoCourierFound,
        _ => DispatchOutcome::Skipped,
    }
}
