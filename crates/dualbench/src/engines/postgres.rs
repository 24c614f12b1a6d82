//! PostgreSQL engine over a single sqlx connection.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, info};

use super::RelationalEngine;
use crate::config::PostgresConfig;
use crate::error::{Error, Result};

/// PostgreSQL connection owned by the harness for the whole run.
pub struct PostgresEngine {
    conn: Option<PgConnection>,
}

impl PostgresEngine {
    /// Open the connection.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        info!(
            "Connecting to PostgreSQL at {}:{}/{}",
            config.host, config.port, config.database
        );

        let conn = PgConnection::connect_with(&connect_options(config))
            .await
            .map_err(|e| Error::RelationalConnection(e.to_string()))?;

        info!("Connected to PostgreSQL database: {}", config.database);
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::Query("PostgreSQL connection already closed".to_string()))
    }
}

fn connect_options(config: &PostgresConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .application_name("dualbench")
}

#[async_trait]
impl RelationalEngine for PostgresEngine {
    fn engine_name(&self) -> &'static str {
        "postgresql"
    }

    async fn explain_analyze(&mut self, sql: &str) -> Result<Value> {
        debug!("Explaining: {}", sql);
        let conn = self.conn()?;
        // EXPLAIN (FORMAT JSON) yields one row with one json column.
        let plan: Value = sqlx::query_scalar(sql).fetch_one(conn).await?;
        Ok(plan)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            info!("Closing PostgreSQL connection");
            conn.close().await?;
        }
        Ok(())
    }
}
