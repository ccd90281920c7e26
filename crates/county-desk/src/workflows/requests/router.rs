use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::error;

use super::domain::DispatchRequest;
use super::service::RequestDispatcher;
use crate::mail::Mailer;

pub fn request_router<M>(dispatcher: Arc<RequestDispatcher<M>>) -> Router
where
    M: Mailer + 'static,
{
    Router::new()
        .route("/api/send-requests", post(send_requests_handler::<M>))
        .with_state(dispatcher)
}

fn failure(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

pub(crate) async fn send_requests_handler<M>(
    State(dispatcher): State<Arc<RequestDispatcher<M>>>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Response
where
    M: Mailer + 'static,
{
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return failure(
                StatusCode::BAD_REQUEST,
                format!("invalid JSON: {}", rejection.body_text()),
            )
        }
    };

    match tokio::task::spawn_blocking(move || dispatcher.dispatch(request)).await {
        Ok(Ok(report)) => {
            let status = if report.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_GATEWAY
            };
            (status, Json(report)).into_response()
        }
        Ok(Err(err)) => failure(StatusCode::BAD_REQUEST, err.to_string()),
        Err(join_error) => {
            error!(error = %join_error, "dispatch task failed");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}
