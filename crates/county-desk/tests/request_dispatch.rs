//! Request dispatch through the public router with recipient overrides loaded from a
//! mappings file, the way the service is configured in production.

mod common {
    use std::sync::Mutex;

    use county_desk::mail::{Mailer, MailerError, OutboundEmail};

    #[derive(Default)]
    pub(super) struct Outbox {
        messages: Mutex<Vec<OutboundEmail>>,
    }

    impl Outbox {
        pub(super) fn recipients(&self) -> Vec<String> {
            self.messages
                .lock()
                .expect("outbox mutex poisoned")
                .iter()
                .map(|message| message.to.clone())
                .collect()
        }
    }

    impl Mailer for Outbox {
        fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
            self.messages
                .lock()
                .expect("outbox mutex poisoned")
                .push(email.clone());
            Ok(())
        }
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::Outbox;
use county_desk::config::DispatchConfig;
use county_desk::workflows::requests::{request_router, RecipientDirectory, RequestDispatcher};

fn configured_directory(dir: &std::path::Path) -> RecipientDirectory {
    let path = dir.join("mappings.csv");
    std::fs::write(
        &path,
        "type,key,pva_email,zoning_email\n\
         city,Sparta,pva@sparta.example.gov,zoning@sparta.example.gov\n\
         county,Trimble,,zoning@trimble.example.gov\n",
    )
    .expect("write mappings");

    RecipientDirectory::from_config(&DispatchConfig {
        mappings_csv: Some(path),
        default_pva_email: "records@county.example.gov".to_string(),
        default_zoning_email: "planning@county.example.gov".to_string(),
    })
    .expect("directory loads")
}

async fn post(router: axum::Router, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::post("/api/send-requests")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("json payload"))
}

#[tokio::test]
async fn csv_overrides_and_defaults_drive_recipients() {
    let dir = tempfile::tempdir().expect("temp dir");
    let outbox = Arc::new(Outbox::default());
    let dispatcher = RequestDispatcher::new(
        Arc::new(configured_directory(dir.path())),
        outbox.clone(),
    );
    let router = request_router(Arc::new(dispatcher));

    let (status, payload) = post(
        router.clone(),
        json!({ "address": "5 Depot St, Sparta, KY 41086", "county": "Gallatin" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["city"], json!("Sparta"));
    assert_eq!(payload["emails_used"]["pva"], json!("pva@sparta.example.gov"));

    let (status, payload) = post(
        router.clone(),
        json!({
            "address": "1 Elm St, Bedford, KY 40006",
            "county": "TRIMBLE",
            "send_to_zoning": true,
            "send_to_pva": true,
            "property_id": "T-77"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["county"], json!("Trimble"));
    assert_eq!(payload["property_id"], json!("T-77"));
    assert_eq!(
        payload["emails_used"],
        json!({
            "pva": "records@county.example.gov",
            "zoning": "zoning@trimble.example.gov"
        })
    );

    let (status, _) = post(
        router,
        json!({ "address": "9 Court St, Prestonville, KY", "county": "Carroll", "city": "Nowhere" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(
        outbox.recipients(),
        vec![
            "pva@sparta.example.gov",
            "zoning@sparta.example.gov",
            "records@county.example.gov",
            "zoning@trimble.example.gov",
        ]
    );
}
