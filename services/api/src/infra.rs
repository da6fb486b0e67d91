use fiscal_host::loader::LoaderOptions;
use fiscal_host::security::SecurityCheckEngine;
use fiscal_host::storage::InMemoryStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Engine wired to the process-local store for both collaborators.
pub(crate) type StoreEngine = SecurityCheckEngine<InMemoryStore, InMemoryStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) store: Arc<InMemoryStore>,
    /// Applied to the loaders built for each request.
    pub(crate) loader_options: LoaderOptions,
    pub(crate) guest_location_threshold: i64,
}

pub(crate) fn build_engine(store: Arc<InMemoryStore>) -> StoreEngine {
    SecurityCheckEngine::new(store.clone(), store)
}
