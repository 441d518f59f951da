use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, warn};

use crate::{error::ApiError, metrics::PROMETHEUS_CONTENT_TYPE, state::AppState};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub version: String,
    pub database: bool,
    pub ready: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sys/health", get(health))
        .route("/sys/health/metrics", get(metrics))
}

/// Pings every dependency once. The service is ready only when all of them
/// answered within the configured timeout.
pub async fn report(state: &AppState) -> Health {
    let timeout = state.config.database.ping_timeout();
    let database = match tokio::time::timeout(timeout, state.database.ping(timeout)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(error = %e, "database ping failed");
            false
        }
        Err(_) => {
            error!(timeout_ms = timeout.as_millis() as u64, "database ping timed out");
            false
        }
    };
    let ready = [database].into_iter().all(|ok| ok);

    Health {
        version: state.config.server.version.clone(),
        database,
        ready,
    }
}

#[instrument(skip(state))]
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let health = report(&state).await;
    let status = if health.ready {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(health))
}

async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let expected = state.config.server.api_key.as_str();
    if !expected.is_empty() {
        let given = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if given != expected {
            warn!("metrics requested without a valid api key");
            return Err(ApiError::Unauthorized("Invalid API key".into()));
        }
    }
    Ok((
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render(),
    )
        .into_response())
}
