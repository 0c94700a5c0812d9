use crate::cli::ServeArgs;
use crate::infra::{AppState, DatasourceState};
use crate::ingest::ingest;
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use case_fusion::config::AppConfig;
use case_fusion::error::AppError;
use case_fusion::telemetry;
use std::sync::Arc;
use tracing::{error, info};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    args.sources.apply(&mut config.ingest);

    telemetry::init(&config.telemetry)?;

    let datasource_state = DatasourceState::new(config.ingest.clone());
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let app_state = AppState {
        readiness: datasource_state.store.readiness(),
        metrics: Arc::new(prometheus_handle),
    };

    // The service stays up without data; POST /api/v1/ingest retries.
    match ingest(&datasource_state.ingest, &datasource_state.fetcher).await {
        Ok(datasource) => {
            datasource_state.store.replace(datasource);
        }
        Err(err) => error!(error = %err, "initial ingestion failed"),
    }

    let app = with_service_routes(datasource_state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(?config.environment, %addr, "case fusion service listening");

    axum::serve(listener, app).await?;
    Ok(())
}
