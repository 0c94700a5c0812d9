use crate::infra::{AppState, DatasourceState};
use crate::ingest::ingest;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use case_fusion::timeseries::{
    Coordinate, DatasetTotals, Datasource, DateLabel, LocationKey, LocationRecord,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SummaryResponse<'a> {
    pub(crate) provider: &'a str,
    pub(crate) locations: usize,
    pub(crate) absolute_max_value: f64,
    pub(crate) ppm_max_value: f64,
    pub(crate) datasets: Vec<DatedTotals<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DatedTotals<'a> {
    pub(crate) date: &'a DateLabel,
    #[serde(flatten)]
    pub(crate) totals: DatasetTotals,
}

#[derive(Debug, Serialize)]
pub(crate) struct LocationHistoryResponse<'a> {
    pub(crate) location: &'a LocationKey,
    pub(crate) coordinate: Coordinate,
    pub(crate) history: Vec<LocationSnapshot<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LocationSnapshot<'a> {
    pub(crate) date: &'a DateLabel,
    #[serde(flatten)]
    pub(crate) record: &'a LocationRecord,
}

pub(crate) fn datasource_router(state: DatasourceState) -> Router {
    Router::new()
        .route("/api/v1/datasource", get(datasource_endpoint))
        .route("/api/v1/summary", get(summary_endpoint))
        .route("/api/v1/datasets/latest", get(latest_dataset_endpoint))
        .route("/api/v1/datasets/:index", get(dataset_endpoint))
        .route("/api/v1/locations/:location", get(location_endpoint))
        .route("/api/v1/ingest", post(ingest_endpoint))
        .with_state(state)
}

pub(crate) fn with_service_routes(state: DatasourceState) -> Router {
    datasource_router(state)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}

fn not_loaded() -> Response {
    error_response(StatusCode::SERVICE_UNAVAILABLE, "no datasource has been loaded yet")
}

fn loaded(state: &DatasourceState) -> Result<Arc<Datasource>, Response> {
    state.store.current().ok_or_else(not_loaded)
}

pub(crate) async fn datasource_endpoint(State(state): State<DatasourceState>) -> Response {
    match loaded(&state) {
        Ok(datasource) => Json(datasource.as_ref()).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn summary_endpoint(State(state): State<DatasourceState>) -> Response {
    let datasource = match loaded(&state) {
        Ok(datasource) => datasource,
        Err(response) => return response,
    };

    let summary = SummaryResponse {
        provider: &datasource.provider,
        locations: datasource.locations().len(),
        absolute_max_value: datasource.absolute_max_value(),
        ppm_max_value: datasource.ppm_max_value(),
        datasets: datasource
            .datasets
            .iter()
            .map(|dataset| DatedTotals {
                date: &dataset.date,
                totals: dataset.totals,
            })
            .collect(),
    };
    Json(summary).into_response()
}

pub(crate) async fn latest_dataset_endpoint(State(state): State<DatasourceState>) -> Response {
    let datasource = match loaded(&state) {
        Ok(datasource) => datasource,
        Err(response) => return response,
    };

    match datasource.latest() {
        Some(dataset) => Json(dataset).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "datasource has no dates"),
    }
}

pub(crate) async fn dataset_endpoint(
    State(state): State<DatasourceState>,
    Path(index): Path<usize>,
) -> Response {
    let datasource = match loaded(&state) {
        Ok(datasource) => datasource,
        Err(response) => return response,
    };

    match datasource.dataset(index) {
        Some(dataset) => Json(dataset).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!(
                "dataset index {index} is out of range ({} dates)",
                datasource.datasets.len()
            ),
        ),
    }
}

pub(crate) async fn location_endpoint(
    State(state): State<DatasourceState>,
    Path(location): Path<String>,
) -> Response {
    let datasource = match loaded(&state) {
        Ok(datasource) => datasource,
        Err(response) => return response,
    };

    let key = LocationKey::from(location.as_str());
    let (Some(coordinate), Some(history)) = (datasource.coordinate(&key), datasource.history(&key))
    else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("unknown location '{location}'"),
        );
    };

    let history = history
        .map(|(date, record)| LocationSnapshot { date, record })
        .collect();

    Json(LocationHistoryResponse {
        location: &key,
        coordinate,
        history,
    })
    .into_response()
}

pub(crate) async fn ingest_endpoint(State(state): State<DatasourceState>) -> Response {
    match ingest(&state.ingest, &state.fetcher).await {
        Ok(datasource) => {
            let datasource = state.store.replace(datasource);
            info!(provider = %datasource.provider, "datasource replaced");
            let payload = json!({
                "status": "ingested",
                "provider": datasource.provider,
                "dates": datasource.datasets.len(),
                "locations": datasource.locations().len(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => {
            error!(error = %err, "ingestion failed; keeping previous datasource");
            err.into_response()
        }
    }
}
