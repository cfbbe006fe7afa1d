//! HTTP request handlers for the meal benefit engine API.
//!
//! This module contains the handler functions for all API endpoints.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::{CancelSignal, RunContext, run_pipeline};

use super::request::RunRequest;
use super::response::{ApiError, ApiErrorResponse, RunResponse};
use super::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/runs", post(run_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(body),
    )
        .into_response()
}

/// Maps a body rejection to an error body.
fn rejection_error(correlation_id: Uuid, rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(correlation_id = %correlation_id, error = %body_text, "JSON data error");
            if body_text.contains("missing field") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(correlation_id = %correlation_id, error = %err, "JSON syntax error");
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    }
}

/// Handler for GET /health.
async fn health_handler() -> Response {
    json_response(StatusCode::OK, json!({"status": "ok"}))
}

/// Handler for POST /runs.
///
/// Runs the whole pipeline over the posted source tables with the server's
/// configuration and oracle clients. Every request is a fresh run with its
/// own caches and run id.
async fn run_handler(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing run request");

    let request = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                rejection_error(correlation_id, rejection),
            );
        }
    };

    // A dropped connection drops this future, which aborts the run between
    // awaits; explicit cancellation is only needed by embedders.
    let ctx = RunContext::new(
        state.config(),
        state.oracle(),
        state.resolver(),
        CancelSignal::never(),
    );
    info!(
        correlation_id = %correlation_id,
        run_id = %ctx.run_id(),
        active_rows = request.tables.active.len(),
        "Run context created"
    );

    let start_time = Instant::now();
    match run_pipeline(&ctx, &request.tables, state.store()).await {
        Ok(outcome) => {
            info!(
                correlation_id = %correlation_id,
                run_id = %outcome.run_id,
                rows = outcome.output.totals.rows,
                excluded = outcome.eligibility.report.len(),
                signed_off = outcome.audit.signed_off,
                duration_ms = start_time.elapsed().as_millis(),
                "Run completed successfully"
            );
            json_response(StatusCode::OK, RunResponse::from(outcome))
        }
        Err(err) => {
            warn!(
                correlation_id = %correlation_id,
                run_id = %ctx.run_id(),
                error = %err,
                "Run failed"
            );
            let api_error: ApiErrorResponse = err.into();
            json_response(api_error.status, api_error.error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::oracle::{MockCalendarResolver, MockClassificationOracle};
    use crate::pipeline::{MemorySnapshotStore, Stage};
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn create_test_state(store: Arc<MemorySnapshotStore>) -> AppState {
        let config = ConfigLoader::load("./config/vr_2025_05").expect("Failed to load config");

        let mut oracle = MockClassificationOracle::new();
        oracle
            .expect_classify()
            .returning(|_| Ok(json!({"excluded": false, "justification": "Regular staff"})));
        let mut resolver = MockCalendarResolver::new();
        resolver
            .expect_holidays_for()
            .returning(|_| Ok(json!({"dates": []})));

        AppState::new(config, Arc::new(oracle), Arc::new(resolver), store)
    }

    fn post_runs(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/runs")
            .header("Content-Type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn read_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_valid_run_returns_200() {
        let store = Arc::new(MemorySnapshotStore::new());
        let router = create_router(create_test_state(Arc::clone(&store)));

        let body = json!({
            "active": [
                {"employee_id": "1001", "name": "Ana", "job_title": "ANALISTA", "state": "SP"},
                {"employee_id": "1002", "job_title": "DIRETOR", "state": "SP"}
            ]
        });
        let response = router.oneshot(post_runs(body.to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert_eq!(content_type, "application/json");

        let result: RunResponse = read_body(response).await;
        // 31 days minus 8 weekend days, no holidays from the resolver
        assert_eq!(result.output.rows.len(), 1);
        assert_eq!(result.output.rows[0].employee_id, "1001");
        assert_eq!(result.output.rows[0].payable_days, 23);
        assert_eq!(result.output.totals.gross_value, dec("862.50"));
        assert_eq!(result.output.totals.employer_share, dec("690.00"));
        assert_eq!(result.output.totals.employee_share, dec("172.50"));
        assert!(result.exclusions.contains("1002"));
        assert!(result.audit.signed_off);

        assert_eq!(
            store.stages(result.run_id),
            vec![
                Stage::Consolidation,
                Stage::Eligibility,
                Stage::Calculation,
                Stage::Output,
                Stage::Audit
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_json_returns_400() {
        let store = Arc::new(MemorySnapshotStore::new());
        let router = create_router(create_test_state(store));

        let response = router.oneshot(post_runs("{invalid json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiError = read_body(response).await;
        assert_eq!(error.code, "MALFORMED_JSON");
    }

    #[tokio::test]
    async fn test_missing_active_table_returns_400() {
        let store = Arc::new(MemorySnapshotStore::new());
        let router = create_router(create_test_state(store));

        let response = router
            .oneshot(post_runs(r#"{"terminated": []}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiError = read_body(response).await;
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert!(error.message.contains("active"), "got: {}", error.message);
    }

    #[tokio::test]
    async fn test_duplicate_active_ids_return_422() {
        let store = Arc::new(MemorySnapshotStore::new());
        let router = create_router(create_test_state(Arc::clone(&store)));

        let body = json!({
            "active": [
                {"employee_id": "1001", "job_title": "ANALISTA", "state": "SP"},
                {"employee_id": "1001", "job_title": "ANALISTA", "state": "RS"}
            ]
        });
        let response = router.oneshot(post_runs(body.to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let error: ApiError = read_body(response).await;
        assert_eq!(error.code, "SOURCE_REJECTED");
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let store = Arc::new(MemorySnapshotStore::new());
        let router = create_router(create_test_state(store));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
