//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use persistence::repositories::HistoryRepository;
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub history: HistoryHealth,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Whether the configured tables carry the history trigger.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HistoryHealth {
    pub tracked_tables: Vec<String>,
    pub untracked_tables: Vec<String>,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check endpoint.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let start = std::time::Instant::now();
    let db_connected = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let latency_ms = start.elapsed().as_millis() as u64;

    let mut history = HistoryHealth {
        tracked_tables: Vec::new(),
        untracked_tables: Vec::new(),
    };
    if db_connected {
        let repo = HistoryRepository::new(state.pool.clone());
        for table in &state.config.history.tracked_tables {
            match repo.is_table_tracked(table).await {
                Ok(true) => history.tracked_tables.push(table.clone()),
                Ok(false) => history.untracked_tables.push(table.clone()),
                Err(e) => {
                    tracing::warn!(table = %table, error = %e, "Could not check table tracking");
                    history.untracked_tables.push(table.clone());
                }
            }
        }
    }

    let response = HealthResponse {
        status: if db_connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            connected: db_connected,
            latency_ms: if db_connected { Some(latency_ms) } else { None },
        },
        history,
    };

    if db_connected {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Liveness probe endpoint.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint. Ready once the database answers.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let db_connected = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    persistence::metrics::record_pool_metrics(&state.pool);

    if db_connected {
        Ok(Json(StatusResponse {
            status: "ready".to_string(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
