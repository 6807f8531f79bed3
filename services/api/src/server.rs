use crate::cli::ServeArgs;
use crate::infra::{licence_service, seeded_store, AppState};
use crate::routes::with_licence_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use licence_rules::config::AppConfig;
use licence_rules::error::AppError;
use licence_rules::telemetry;
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

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = seeded_store(&config.licensing, args.seed_dir.as_deref()).await?;
    let service = licence_service(store, &config.licensing);

    let app = with_licence_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        default_state = %config.licensing.default_state,
        "licence requirement service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
