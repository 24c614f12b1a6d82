//! # dualbench
//!
//! Side-by-side query timings for PostgreSQL and MongoDB.
//!
//! Each [`Scenario`] states one query intent twice: as SQL and as a MongoDB
//! filter or aggregation pipeline. The [`Harness`] runs every scenario on both
//! engines and reads the elapsed time from each engine's own explain output
//! (`EXPLAIN ANALYZE` on one side, `executionStats` on the other), so driver
//! and network overhead stay out of the comparison.
//!
//! ## Quick start
//!
//! ```bash
//! dualbench init-config --output dualbench.yaml
//! dualbench run --config dualbench.yaml
//! ```
//!
//! ## Library use
//!
//! ```rust,ignore
//! use dualbench::{run_benchmark, BenchConfig, default_scenarios};
//!
//! let config = BenchConfig::from_file("dualbench.yaml")?;
//! run_benchmark(&config, default_scenarios()).await;
//! ```

pub mod config;
pub mod engines;
pub mod error;
pub mod explain;
pub mod harness;
pub mod indexes;
pub mod report;
pub mod scenario;

pub use config::{BenchConfig, ConfigOverrides, IndexSpec, MongoConfig, PostgresConfig};
pub use engines::{DocumentEngine, MongoEngine, PostgresEngine, RelationalEngine};
pub use error::{Error, Result};
pub use harness::{run_benchmark, run_benchmark_to, run_benchmark_with, run_scenario, Harness};
pub use report::{MeasurementError, Outcome, Report, ScenarioResult};
pub use scenario::{default_scenarios, load_scenarios, DocumentMode, DocumentQuery, Scenario};
