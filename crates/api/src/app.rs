use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, require_admin, security_headers_middleware, trace_id,
};
use crate::routes::{audit_logs, health, history, settings};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
}

pub fn create_app(config: Config, pool: PgPool) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        pool,
        config: config.clone(),
    };

    let cors = if config.security.cors_origins.is_empty() {
        // Development: allow any origin
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Public routes: the site reads settings, the console mirrors audit entries
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/settings", get(settings::get_settings))
        .route("/api/v1/audit-logs", post(audit_logs::create_audit_log));

    // Admin routes (require the admin API key)
    let admin_routes = Router::new()
        .route("/api/v1/settings", put(settings::update_settings))
        .route("/api/v1/settings/entries", get(settings::get_setting_entries))
        .route(
            "/api/v1/audit-logs",
            get(audit_logs::list_audit_logs).delete(audit_logs::clear_audit_logs),
        )
        .route("/api/v1/audit-logs/stats", get(audit_logs::get_audit_stats))
        .route("/api/v1/audit-logs/export", get(audit_logs::export_audit_logs))
        .route(
            "/api/v1/history",
            get(history::list_history).delete(history::prune_history),
        )
        .route("/api/v1/history/revert", post(history::bulk_revert))
        .route(
            "/api/v1/history/records/:table_name/:record_id",
            get(history::get_change_timeline),
        )
        .route(
            "/api/v1/history/records/:table_name/:record_id/summary",
            get(history::get_record_change_summary),
        )
        .route(
            "/api/v1/history/versions/:history_id/revert",
            post(history::revert_to_version),
        )
        .route(
            "/api/v1/history/tracking/:table_name",
            get(history::get_tracking)
                .put(history::enable_tracking)
                .delete(history::disable_tracking),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
