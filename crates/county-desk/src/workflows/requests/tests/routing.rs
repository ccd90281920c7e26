use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::requests::request_router;

fn post(body: String) -> Request<Body> {
    Request::post("/api/send-requests")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request builds")
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json payload")
}

#[tokio::test]
async fn send_requests_reports_each_office() {
    let (dispatcher, mailer) = dispatcher();
    let router = request_router(Arc::new(dispatcher));

    let response = router
        .oneshot(post(
            json!({
                "address": "440 Main St, Carrollton, KY 41008",
                "county": "Carroll",
                "city": "Carrollton",
                "property_id": "C-1021"
            })
            .to_string(),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["success"], json!(true));
    assert_eq!(payload["county"], json!("Carroll"));
    assert_eq!(payload["emails_used"]["pva"], json!("pva@carroll.example.gov"));
    assert_eq!(payload["results"]["pva"], json!({ "status": "sent" }));
    assert_eq!(payload["results"]["zoning"], json!({ "status": "sent" }));
    assert_eq!(mailer.sent().len(), 2);
}

#[tokio::test]
async fn send_requests_rejects_invalid_selection() {
    let (dispatcher, mailer) = dispatcher();
    let router = request_router(Arc::new(dispatcher));

    let response = router
        .oneshot(post(
            json!({ "address": "1 Elm St, Ghent, KY", "county": "Carroll" }).to_string(),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["success"], json!(false));
    assert!(payload["error"]
        .as_str()
        .expect("error text")
        .contains("requires a city"));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn send_requests_rejects_malformed_json() {
    let (dispatcher, _mailer) = dispatcher();
    let router = request_router(Arc::new(dispatcher));

    let response = router
        .oneshot(post("not json".to_string()))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_requests_maps_delivery_failure_to_bad_gateway() {
    let (dispatcher, mailer) = dispatcher();
    mailer.refuse("pva@carroll.example.gov");
    let router = request_router(Arc::new(dispatcher));

    let response = router
        .oneshot(post(
            json!({
                "address": "440 Main St, Carrollton, KY 41008",
                "county": "Carroll",
                "city": "Carrollton"
            })
            .to_string(),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = json_body(response).await;
    assert_eq!(payload["success"], json!(false));
    assert_eq!(payload["results"]["pva"]["status"], json!("failed"));
    assert_eq!(payload["results"]["zoning"]["status"], json!("sent"));
}
