use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use county_desk::mail::Mailer;
use county_desk::workflows::contacts::{contact_router, ContactRepository, VerificationService};
use county_desk::workflows::requests::{request_router, RequestDispatcher};
use serde_json::json;
use std::sync::Arc;

/// Public routes of both workflows plus the operational endpoints.
pub(crate) fn application_routes<R, M>(
    contacts: Arc<VerificationService<R, M>>,
    requests: Arc<RequestDispatcher<M>>,
) -> Router
where
    R: ContactRepository + 'static,
    M: Mailer + 'static,
{
    contact_router(contacts)
        .merge(request_router(requests))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
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
