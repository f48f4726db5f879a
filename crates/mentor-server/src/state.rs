//! Shared state accessible from Axum handlers.

use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;

use mentor_engine::DeliveryOrchestrator;
use mentor_engine::producer::PendingProducer;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    /// The delivery orchestrator.
    pub orchestrator: Arc<DeliveryOrchestrator>,
    /// The pending-lesson producer (also serves the explicit endpoint).
    pub producer: Arc<PendingProducer>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle; absent in tests.
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(
        orchestrator: Arc<DeliveryOrchestrator>,
        producer: Arc<PendingProducer>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            orchestrator,
            producer,
            start_time: Instant::now(),
            metrics_handle,
        }
    }
}
