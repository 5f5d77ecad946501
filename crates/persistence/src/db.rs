//! Database connection pool management.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use std::time::Duration;

/// Transaction-local setting read by the `record_history()` trigger.
pub const ACTING_USER_SETTING: &str = "app.current_user_id";

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Creates a PostgreSQL connection pool with the given configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    tracing::debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Creating database pool"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
}

/// Attribute every change made in the current transaction to `user_id`.
///
/// The setting is transaction-local, so it must be called on a connection
/// inside `BEGIN`. `None` clears it and trigger rows get a NULL `changed_by`.
pub async fn set_acting_user(
    conn: &mut PgConnection,
    user_id: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config($1, $2, true)")
        .bind(ACTING_USER_SETTING)
        .bind(user_id.unwrap_or(""))
        .execute(conn)
        .await?;
    Ok(())
}
