use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryCandidateRepository, InMemoryDocumentStore, InMemoryStudentRepository,
    StaticCallerResolver,
};
use crate::routes::with_certification_routes;
use academy::config::AppConfig;
use academy::error::AppError;
use academy::telemetry;
use academy::workflows::certification::{CertificationService, ModuleCatalog};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
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

    let candidates = Arc::new(InMemoryCandidateRepository::default());
    let students = Arc::new(InMemoryStudentRepository::default());
    let documents = Arc::new(InMemoryDocumentStore::default());
    let certification_service = Arc::new(CertificationService::new(
        candidates,
        students,
        documents,
        ModuleCatalog::standard(),
    ));
    let resolver = Arc::new(StaticCallerResolver::new(config.auth.admin_token.clone()));

    let app = with_certification_routes(certification_service, resolver)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "inspector academy portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
