use crate::cli::ServeArgs;
use crate::infra::{AppState, ContactStore};
use crate::routes::application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use county_desk::config::AppConfig;
use county_desk::error::AppError;
use county_desk::mail::MailTransport;
use county_desk::telemetry;
use county_desk::workflows::contacts::VerificationService;
use county_desk::workflows::requests::{RecipientDirectory, RequestDispatcher};
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

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = ContactStore::from_config(&config.storage)?;
    let persistent = store.is_persistent();
    let mailer = Arc::new(MailTransport::from_config(&config.mail)?);
    let directory = Arc::new(RecipientDirectory::from_config(&config.dispatch)?);

    let contacts = Arc::new(VerificationService::new(
        Arc::new(store),
        mailer.clone(),
        config.verification.clone(),
    ));
    let requests = Arc::new(RequestDispatcher::new(directory, mailer.clone()));

    let app = application_routes(contacts, requests)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        mail = mailer.label(),
        persistent_contacts = persistent,
        "county desk ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
