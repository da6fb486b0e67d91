use crate::cli::ServeArgs;
use crate::demo::seed_demo_store;
use crate::infra::{build_engine, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use fiscal_host::config::AppConfig;
use fiscal_host::error::AppError;
use fiscal_host::fixtures;
use fiscal_host::storage::InMemoryStore;
use fiscal_host::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let store = if args.seed_demo {
        seed_demo_store()
    } else {
        InMemoryStore::new()
    };
    if let Some(path) = args.fixtures.as_deref() {
        fixtures::import_file(path, &store)?;
    }
    let store = Arc::new(store);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        store: store.clone(),
        loader_options: config.loaders.options(),
        guest_location_threshold: config.contributions.guest_location_threshold,
    };

    let engine = Arc::new(build_engine(store));
    info!(rules = ?engine.rule_names(), "security check engine configured");

    let app = with_service_routes(engine)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "fiscal host service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
