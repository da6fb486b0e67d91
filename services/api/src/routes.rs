use crate::infra::{AppState, StoreEngine};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use fiscal_host::contributions::GuestInfoInput;
use fiscal_host::domain::{CollectiveId, PayoutMethod};
use fiscal_host::error::AppError;
use fiscal_host::loaders::PayoutMethodLoaders;
use fiscal_host::security::security_router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub(crate) struct PayoutMethodsRequest {
    pub(crate) collective_ids: Vec<CollectiveId>,
    #[serde(default)]
    pub(crate) paypal_only: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct PayoutMethodsResponse {
    pub(crate) collective_ids: Vec<CollectiveId>,
    /// One list per requested collective, in request order.
    pub(crate) payout_methods: Vec<Vec<PayoutMethod>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GuestContributionRequest {
    pub(crate) amount: i64,
    pub(crate) guest_info: GuestInfoInput,
}

pub(crate) fn with_service_routes(engine: Arc<StoreEngine>) -> axum::Router {
    security_router(engine)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/collectives/payout-methods",
            axum::routing::post(payout_methods_endpoint),
        )
        .route(
            "/api/v1/contributions/guest",
            axum::routing::post(guest_contribution_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Loaders are built per request so nothing is memoized across callers.
pub(crate) async fn payout_methods_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<PayoutMethodsRequest>,
) -> Result<Json<PayoutMethodsResponse>, AppError> {
    let loaders = PayoutMethodLoaders::new(state.store.clone(), state.loader_options);
    let loader = if payload.paypal_only {
        &loaders.paypal_by_collective
    } else {
        &loaders.by_collective
    };

    let payout_methods = loader.load_many(&payload.collective_ids).await?;
    debug!(
        collectives = payload.collective_ids.len(),
        paypal_only = payload.paypal_only,
        max_batch_size = ?loader.options().max_batch_size,
        "payout methods loaded"
    );

    Ok(Json(PayoutMethodsResponse {
        collective_ids: payload.collective_ids,
        payout_methods,
    }))
}

pub(crate) async fn guest_contribution_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<GuestContributionRequest>,
) -> impl IntoResponse {
    if payload.amount <= 0 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "amount must be a positive number of cents" })),
        );
    }

    match payload
        .guest_info
        .validate_for_amount(payload.amount, state.guest_location_threshold)
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "accepted",
                "email": payload.guest_info.email,
                "amount": payload.amount,
            })),
        ),
        Err(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::seed_demo_store;
    use crate::infra::build_engine;
    use axum::body::Body;
    use axum::http::Request;
    use fiscal_host::contributions::guest::DEFAULT_LOCATION_THRESHOLD;
    use fiscal_host::loader::LoaderOptions;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn test_app(ready: bool) -> axum::Router {
        let store = Arc::new(seed_demo_store());
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            store: store.clone(),
            loader_options: LoaderOptions::default(),
            guest_location_threshold: DEFAULT_LOCATION_THRESHOLD,
        };
        with_service_routes(Arc::new(build_engine(store))).layer(Extension(state))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let response = test_app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = test_app(true)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn security_checks_are_mounted() {
        let response = test_app(true)
            .oneshot(
                Request::get("/api/v1/expenses/100/security-checks")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["highest_level"], "HIGH");
    }

    #[tokio::test]
    async fn payout_methods_are_aligned_with_request() {
        let response = test_app(true)
            .oneshot(post_json(
                "/api/v1/collectives/payout-methods",
                json!({ "collective_ids": [300, 999, 100], "paypal_only": true }),
            ))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        let lists = body["payout_methods"].as_array().expect("lists");
        assert_eq!(lists.len(), 3);
        assert_eq!(lists[0].as_array().map(Vec::len), Some(1));
        assert_eq!(lists[0][0]["kind"], "PAYPAL");
        assert_eq!(lists[1], json!([]));
        assert_eq!(lists[2].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn large_guest_contribution_requires_location() {
        let response = test_app(true)
            .oneshot(post_json(
                "/api/v1/contributions/guest",
                json!({ "amount": 6_000_00, "guest_info": { "email": "guest@example.org" } }),
            ))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = test_app(true)
            .oneshot(post_json(
                "/api/v1/contributions/guest",
                json!({
                    "amount": 6_000_00,
                    "guest_info": {
                        "email": "Guest@Example.org",
                        "location": { "address": "1 Main St", "country": "FR" }
                    }
                }),
            ))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["email"], "guest@example.org");
    }

    #[tokio::test]
    async fn invalid_guest_email_is_rejected() {
        let response = test_app(true)
            .oneshot(post_json(
                "/api/v1/contributions/guest",
                json!({ "amount": 10_00, "guest_info": { "email": "nobody" } }),
            ))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
