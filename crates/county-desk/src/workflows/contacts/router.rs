use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use maud::{html, DOCTYPE};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::ContactSubmission;
use super::repository::ContactRepository;
use super::service::{VerificationError, VerificationService};
use crate::mail::Mailer;

/// Router exposing contact submission and the confirmation link.
pub fn contact_router<R, M>(service: Arc<VerificationService<R, M>>) -> Router
where
    R: ContactRepository + 'static,
    M: Mailer + 'static,
{
    Router::new()
        .route("/save_email", post(save_email_handler::<R, M>))
        .route("/verify", get(verify_handler::<R, M>))
        .route("/confirm_email", get(verify_handler::<R, M>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VerifyParams {
    #[serde(default)]
    pub(crate) token: String,
}

pub(crate) fn status_for(error: &VerificationError) -> StatusCode {
    match error {
        VerificationError::Validation(_)
        | VerificationError::InvalidToken
        | VerificationError::UnknownContact => StatusCode::BAD_REQUEST,
        VerificationError::ExpiredToken => StatusCode::GONE,
        VerificationError::Delivery(_) => StatusCode::BAD_GATEWAY,
        VerificationError::Token(_) | VerificationError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    let payload = json!({
        "success": false,
        "error": message,
    });
    (status, Json(payload)).into_response()
}

pub(crate) async fn save_email_handler<R, M>(
    State(service): State<Arc<VerificationService<R, M>>>,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Response
where
    R: ContactRepository + 'static,
    M: Mailer + 'static,
{
    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            return failure(
                StatusCode::BAD_REQUEST,
                format!("invalid JSON: {}", rejection.body_text()),
            )
        }
    };

    match tokio::task::spawn_blocking(move || service.submit_contact(submission)).await {
        Ok(Ok(receipt)) => {
            let payload = json!({
                "success": true,
                "message": receipt.message,
                "status": receipt.status.label(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(Err(err)) => {
            if matches!(
                err,
                VerificationError::Token(_) | VerificationError::Repository(_)
            ) {
                error!(error = ?err, "contact submission failed");
            }
            failure(status_for(&err), err.to_string())
        }
        Err(join_error) => {
            error!(error = %join_error, "contact submission task failed");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

pub(crate) async fn verify_handler<R, M>(
    State(service): State<Arc<VerificationService<R, M>>>,
    params: Result<Query<VerifyParams>, QueryRejection>,
) -> Response
where
    R: ContactRepository + 'static,
    M: Mailer + 'static,
{
    let token = match params {
        Ok(Query(params)) => params.token,
        Err(_) => {
            return page(
                StatusCode::BAD_REQUEST,
                "Verification failed",
                "This verification link is malformed. Please use the link from your email.",
            )
        }
    };
    match tokio::task::spawn_blocking(move || service.confirm_token(&token)).await {
        Ok(Ok(_receipt)) => page(
            StatusCode::OK,
            "Email verified",
            "Thank you! Your email address has been verified.",
        ),
        Ok(Err(err)) => {
            if matches!(err, VerificationError::Repository(_)) {
                error!(error = ?err, "token confirmation failed");
            }
            page(status_for(&err), "Verification failed", &err.to_string())
        }
        Err(join_error) => {
            error!(error = %join_error, "token confirmation task failed");
            page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed",
                "Something went wrong. Please try again later.",
            )
        }
    }
}

fn page(status: StatusCode, title: &str, message: &str) -> Response {
    let markup = html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (title) }
            }
            body style="font-family: Arial, sans-serif; max-width: 600px; margin: 40px auto;" {
                h2 { (title) }
                p { (message) }
            }
        }
    };
    (status, Html(markup.into_string())).into_response()
}
