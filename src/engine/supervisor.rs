//! Process-wide routing table from order id to the coordinator of its
//! in-flight offer.
//!
//! ## Rules
//! - At most one entry per order; registering again replaces the entry.
//! - A run holds an [`OfferRegistration`] while it waits. Dropping it removes
//!   the entry, on every exit path including cancellation of the run's task.
//! - Dropping a stale registration never removes a newer coordinator that
//!   was registered for the same order afterwards.
//! - A signal only wakes the coordinator of the courier that answered, so an
//!   answer to an earlier offer cannot end the next courier's offer.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::engine::coordinator::OfferCoordinator;

#[derive(Debug, Default)]
pub struct DispatchSupervisor {
    active: DashMap<Uuid, Arc<OfferCoordinator>>,
}

impl DispatchSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `coordinator` for `order_id` until the returned guard is dropped.
    pub fn register(
        &self,
        order_id: Uuid,
        coordinator: Arc<OfferCoordinator>,
    ) -> OfferRegistration<'_> {
        if self
            .active
            .insert(order_id, coordinator.clone())
            .is_some()
        {
            debug!(order_id = %order_id, "replaced coordinator of a previous offer");
        }

        OfferRegistration {
            supervisor: self,
            order_id,
            coordinator,
        }
    }

    pub fn lookup(&self, order_id: Uuid) -> Option<Arc<OfferCoordinator>> {
        self.active
            .get(&order_id)
            .map(|entry| entry.value().clone())
    }

    pub fn unregister(&self, order_id: Uuid) -> Option<Arc<OfferCoordinator>> {
        self.active.remove(&order_id).map(|(_, coordinator)| coordinator)
    }

    /// Signals the coordinator waiting on `courier_id`'s answer for
    /// `order_id`. Returns `false` when no run is waiting on that courier.
    pub fn signal(&self, order_id: Uuid, courier_id: Uuid) -> bool {
        match self.lookup(order_id) {
            Some(coordinator) if coordinator.courier_id() == courier_id => {
                coordinator.signal();
                true
            }
            Some(_) => {
                debug!(
                    order_id = %order_id,
                    courier_id = %courier_id,
                    "ignoring signal for an offer that already moved on"
                );
                false
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn unregister_exact(&self, order_id: Uuid, coordinator: &Arc<OfferCoordinator>) {
        self.active
            .remove_if(&order_id, |_, current| Arc::ptr_eq(current, coordinator));
    }
}

/// Keeps an order's coordinator reachable by the response handler.
#[must_use = "the registration is removed as soon as it is dropped"]
pub struct OfferRegistration<'a> {
    supervisor: &'a DispatchSupervisor,
    order_id: Uuid,
    coordinator: Arc<OfferCoordinator>,
}

impl OfferRegistration<'_> {
    pub fn coordinator(&self) -> &Arc<OfferCoordinator> {
        &self.coordinator
    }
}

impl Drop for OfferRegistration<'_> {
    fn drop(&mut self) {
        self.supervisor
            .unregister_exact(self.order_id, &self.coordinator);
    }
}
