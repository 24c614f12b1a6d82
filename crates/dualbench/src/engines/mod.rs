//! Engine connections used by the harness.
//!
//! Each trait is the smallest surface the harness needs. The real
//! implementations talk to PostgreSQL and MongoDB; tests plug in fakes.

mod mongo;
mod postgres;

pub use mongo::{json_to_document, MongoEngine};
pub use postgres::PostgresEngine;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::IndexSpec;
use crate::error::Result;

/// Relational engine able to return analyzed execution plans.
#[async_trait]
pub trait RelationalEngine: Send {
    /// Engine label used in logs.
    fn engine_name(&self) -> &'static str;

    /// Run an explain statement and return its JSON plan.
    async fn explain_analyze(&mut self, sql: &str) -> Result<Value>;

    /// Release the connection. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Document engine able to explain reads and aggregation pipelines.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Engine label used in logs.
    fn engine_name(&self) -> &'static str;

    /// Explain a filtered read with execution statistics.
    async fn explain_find(&self, filter: &Map<String, Value>) -> Result<Value>;

    /// Explain an aggregation pipeline with execution statistics.
    async fn explain_aggregate(&self, pipeline: &[Value]) -> Result<Value>;

    /// Create an ascending index, returning its name.
    async fn create_index(&self, index: &IndexSpec) -> Result<String>;

    /// Release the client. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}
