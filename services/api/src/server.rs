use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryProgressRepository};
use crate::routes::with_progress_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use coursework::config::AppConfig;
use coursework::error::AppError;
use coursework::progress::ProgressCoordinator;
use coursework::telemetry;
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
    if let Some(threshold) = args.pass_threshold.take() {
        config.progress.pass_threshold = threshold;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryProgressRepository::default());
    let progress_service = Arc::new(ProgressCoordinator::new(
        repository,
        config.progress.clone(),
    )?);

    let app = with_progress_routes(progress_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        pass_threshold = config.progress.pass_threshold,
        "course progress service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
