use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::DispatchSettings;
use crate::engine::dispatch::DispatchEngine;
use crate::engine::supervisor::DispatchSupervisor;
use crate::notify::broadcast::BroadcastNotifier;
use crate::observability::metrics::Metrics;
use crate::store::memory::MemoryStore;

pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<BroadcastNotifier>,
    pub supervisor: Arc<DispatchSupervisor>,
    pub engine: Arc<DispatchEngine>,
    pub order_tx: mpsc::Sender<Uuid>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        order_queue_size: usize,
        event_buffer_size: usize,
        settings: DispatchSettings,
    ) -> (Self, mpsc::Receiver<Uuid>) {
        let (order_tx, order_rx) = mpsc::channel(order_queue_size);

        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(BroadcastNotifier::new(event_buffer_size));
        let supervisor = Arc::new(DispatchSupervisor::new());
        let metrics = Metrics::new();
        let engine = Arc::new(DispatchEngine::new(
            store.clone(),
            notifier.clone(),
            supervisor.clone(),
            settings,
            metrics.clone(),
        ));

        (
            Self {
                store,
                notifier,
                supervisor,
                engine,
                order_tx,
                metrics,
            },
            order_rx,
        )
    }
}
