use crate::config::ConfigError;
use crate::mail::MailerError;
use crate::telemetry::TelemetryError;
use crate::workflows::contacts::{RepositoryError, VerificationError};
use crate::workflows::requests::DirectoryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Storage(RepositoryError),
    Mail(MailerError),
    Contacts(VerificationError),
    Directory(DirectoryError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Storage(err) => write!(f, "contact storage error: {}", err),
            AppError::Mail(err) => write!(f, "mail error: {}", err),
            AppError::Contacts(err) => write!(f, "contact error: {}", err),
            AppError::Directory(err) => write!(f, "recipient directory error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Storage(err) => Some(err),
            AppError::Mail(err) => Some(err),
            AppError::Contacts(err) => Some(err),
            AppError::Directory(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Contacts(
                err @ (VerificationError::Validation(_)
                | VerificationError::InvalidToken
                | VerificationError::UnknownContact),
            ) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::Contacts(err @ VerificationError::ExpiredToken) => {
                (StatusCode::GONE, err.to_string())
            }
            AppError::Contacts(err @ VerificationError::Delivery(_)) => {
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };

        let body = Json(json!({ "success": false, "error": message }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Storage(value)
    }
}

impl From<MailerError> for AppError {
    fn from(value: MailerError) -> Self {
        Self::Mail(value)
    }
}

impl From<VerificationError> for AppError {
    fn from(value: VerificationError) -> Self {
        Self::Contacts(value)
    }
}

impl From<DirectoryError> for AppError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    #[tokio::test]
    async fn caller_errors_keep_their_message() {
        let response = AppError::from(VerificationError::UnknownContact).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert_eq!(body["error"], "no contact is saved for that email address");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response =
            AppError::from(RepositoryError::Corrupt("line 3 column 7".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body["error"], "internal error");
    }

    #[test]
    fn display_names_the_failing_layer() {
        let err = AppError::from(RepositoryError::Unavailable("disk full".to_string()));
        assert_eq!(
            err.to_string(),
            "contact storage error: repository unavailable: disk full"
        );
    }
}
