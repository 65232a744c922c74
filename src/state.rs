use std::sync::Arc;
use std::time::Duration;

use crate::config::FlowSettings;
use crate::flow::FlowController;
use crate::map::picker::LocationPicker;
use crate::observability::metrics::Metrics;
use crate::storage::{MemoryStorage, Storage};
use crate::store::RecordStore;

pub struct AppState {
    pub store: Arc<RecordStore>,
    pub flows: FlowController,
    pub picker: LocationPicker,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        flow_settings: FlowSettings,
        pick_timeout: Duration,
        event_buffer_size: usize,
    ) -> Self {
        let metrics = Metrics::new();

        Self {
            store: Arc::new(RecordStore::open(storage, metrics.clone(), event_buffer_size)),
            flows: FlowController::new(flow_settings, metrics.clone()),
            picker: LocationPicker::new(pick_timeout),
            metrics,
        }
    }

    pub fn in_memory(flow_settings: FlowSettings) -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            flow_settings,
            Duration::from_secs(120),
            256,
        )
    }
}
