use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::domain::ExpenseId;
use crate::storage::{ExpenseResolver, ExpenseStatsStore, ResolutionError};

use super::{highest_level, CheckError, Level, SecurityCheck, SecurityCheckEngine};

/// Response body for a completed evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityCheckReport {
    pub expense_id: ExpenseId,
    pub highest_level: Option<Level>,
    pub checks: Vec<SecurityCheck>,
}

/// Router exposing the security checks of an expense.
pub fn security_router<R, S>(engine: Arc<SecurityCheckEngine<R, S>>) -> Router
where
    R: ExpenseResolver + 'static,
    S: ExpenseStatsStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/expenses/:expense_id/security-checks",
            get(security_checks_handler::<R, S>),
        )
        .with_state(engine)
}

async fn security_checks_handler<R, S>(
    State(engine): State<Arc<SecurityCheckEngine<R, S>>>,
    Path(expense_id): Path<i64>,
) -> Response
where
    R: ExpenseResolver + 'static,
    S: ExpenseStatsStore + 'static,
{
    let expense_id = ExpenseId(expense_id);
    match engine.evaluate_by_id(expense_id).await {
        Ok(checks) => {
            let report = SecurityCheckReport {
                expense_id,
                highest_level: highest_level(&checks),
                checks,
            };
            (StatusCode::OK, axum::Json(report)).into_response()
        }
        Err(CheckError::Resolution(ResolutionError::ExpenseNotFound(_))) => {
            let payload = json!({
                "error": format!("expense {expense_id} not found"),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            warn!(%expense_id, error = %other, "security checks failed");
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
