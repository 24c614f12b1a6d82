//! The benchmark harness: connect, run every scenario on both engines, close.

use serde_json::Number;
use std::future::Future;
use std::io::Write;
use tracing::{debug, error, info, warn};

use crate::config::BenchConfig;
use crate::engines::{DocumentEngine, MongoEngine, PostgresEngine, RelationalEngine};
use crate::error::Result;
use crate::explain::{
    document_execution_millis, relational_total_time, AGGREGATE_STRATEGIES, FIND_STRATEGIES,
};
use crate::report::{emit, header, Outcome, Report, ScenarioResult, COMPLETION_MARKER};
use crate::scenario::{DocumentQuery, Scenario};

/// Runs an ordered scenario list against one relational and one document engine.
///
/// The harness owns both connections exclusively until [`Harness::run`]
/// returns. Scenarios run strictly one after another, relational measurement first.
pub struct Harness<R, D> {
    relational: R,
    document: D,
    scenarios: Vec<Scenario>,
}

impl Harness<PostgresEngine, MongoEngine> {
    /// Open both connections. Any failure here is fatal for the run.
    pub async fn connect(config: &BenchConfig, scenarios: Vec<Scenario>) -> Result<Self> {
        Self::connect_with(
            PostgresEngine::connect(&config.postgres),
            MongoEngine::connect(&config.mongo),
            scenarios,
        )
        .await
    }
}

impl<R: RelationalEngine, D: DocumentEngine> Harness<R, D> {
    #[must_use]
    pub fn new(relational: R, document: D, scenarios: Vec<Scenario>) -> Self {
        Self {
            relational,
            document,
            scenarios,
        }
    }

    /// Await the relational connection, then the document one.
    ///
    /// The document future is not polled if the relational side fails. If the
    /// document side fails, the already open relational engine is closed
    /// before the error is returned.
    pub async fn connect_with<FR, FD>(
        relational: FR,
        document: FD,
        scenarios: Vec<Scenario>,
    ) -> Result<Self>
    where
        FR: Future<Output = Result<R>>,
        FD: Future<Output = Result<D>>,
    {
        let mut relational = relational.await?;
        let document = match document.await {
            Ok(document) => document,
            Err(e) => {
                if let Err(close_err) = relational.close().await {
                    warn!(
                        "Failed to close {}: {}",
                        relational.engine_name(),
                        close_err
                    );
                }
                return Err(e);
            }
        };
        Ok(Self::new(relational, document, scenarios))
    }

    /// Run every scenario, writing each block as soon as it completes,
    /// then close both engines and write the completion marker.
    pub async fn run<W: Write>(mut self, out: &mut W) -> Report {
        let mut report = Report::default();

        for scenario in &self.scenarios {
            info!("Running scenario: {}", scenario.name);
            let result = run_scenario(&mut self.relational, &self.document, scenario).await;
            emit(out, &format!("\n{result}"));
            report.results.push(result);
        }

        self.shutdown().await;
        emit(out, &format!("\n{COMPLETION_MARKER}\n"));

        info!(
            "Benchmark finished: {}/{} scenarios fully measured",
            report.complete_count(),
            report.results.len()
        );
        report
    }

    /// Close both engines regardless of how the run went.
    async fn shutdown(&mut self) {
        if let Err(e) = self.relational.close().await {
            warn!("Failed to close {}: {}", self.relational.engine_name(), e);
        }
        if let Err(e) = self.document.close().await {
            warn!("Failed to close {}: {}", self.document.engine_name(), e);
        }
    }
}

/// Measure both engines for one scenario. Neither failure affects the other.
pub async fn run_scenario<R, D>(
    relational: &mut R,
    document: &D,
    scenario: &Scenario,
) -> ScenarioResult
where
    R: RelationalEngine,
    D: DocumentEngine,
{
    let relational_outcome = measure_relational(relational, scenario).await;
    if let Err(e) = &relational_outcome {
        warn!(
            "[{}] {} measurement failed: {}",
            scenario.name,
            relational.engine_name(),
            e
        );
    }

    let document_outcome = measure_document(document, scenario).await;
    if let Err(e) = &document_outcome {
        warn!(
            "[{}] {} measurement failed: {}",
            scenario.name,
            document.engine_name(),
            e
        );
    }

    ScenarioResult {
        name: scenario.name.clone(),
        mode: scenario.mode(),
        relational: relational_outcome,
        document: document_outcome,
    }
}

async fn measure_relational<R: RelationalEngine>(
    engine: &mut R,
    scenario: &Scenario,
) -> Outcome<f64> {
    let plan = engine.explain_analyze(&scenario.explain_sql()).await?;
    let ms = relational_total_time(&plan)?;
    debug!("[{}] relational time: {} ms", scenario.name, ms);
    Ok(ms)
}

async fn measure_document<D: DocumentEngine>(
    engine: &D,
    scenario: &Scenario,
) -> Outcome<Number> {
    let ms = match &scenario.document {
        DocumentQuery::Find { filter } => {
            let explain = engine.explain_find(filter).await?;
            document_execution_millis(&explain, FIND_STRATEGIES)?
        }
        DocumentQuery::Aggregate { pipeline } => {
            let explain = engine.explain_aggregate(pipeline).await?;
            document_execution_millis(&explain, AGGREGATE_STRATEGIES)?
        }
    };
    debug!("[{}] document time: {} ms", scenario.name, ms);
    Ok(ms)
}

/// Run the full benchmark against PostgreSQL and MongoDB, writing the report
/// to `out`.
///
/// Never fails: a connection failure is logged and ends the run before any
/// scenario, measurement failures are reported inline.
pub async fn run_benchmark_to<W: Write>(
    config: &BenchConfig,
    scenarios: Vec<Scenario>,
    out: &mut W,
) -> Option<Report> {
    run_benchmark_with(
        PostgresEngine::connect(&config.postgres),
        MongoEngine::connect(&config.mongo),
        scenarios,
        out,
    )
    .await
}

/// Same as [`run_benchmark_to`], with the engines supplied as pending
/// connections.
///
/// Returns `None` when either connection fails; the header and a `Fatal:`
/// line are the only output in that case.
pub async fn run_benchmark_with<R, D, FR, FD, W>(
    relational: FR,
    document: FD,
    scenarios: Vec<Scenario>,
    out: &mut W,
) -> Option<Report>
where
    R: RelationalEngine,
    D: DocumentEngine,
    FR: Future<Output = Result<R>>,
    FD: Future<Output = Result<D>>,
    W: Write,
{
    emit(out, &header(scenarios.len()));

    let harness = match Harness::connect_with(relational, document, scenarios).await {
        Ok(harness) => harness,
        Err(e) => {
            error!("Connection failed, no scenario was run: {}", e);
            emit(out, &format!("Fatal: {e}\n"));
            return None;
        }
    };

    Some(harness.run(out).await)
}

/// Run the full benchmark, writing the report to standard output.
pub async fn run_benchmark(config: &BenchConfig, scenarios: Vec<Scenario>) {
    let mut stdout = std::io::stdout();
    // The report has already been written line by line.
    let _ = run_benchmark_to(config, scenarios, &mut stdout).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexSpec;
    use crate::error::Error;
    use crate::scenario::default_scenarios;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    struct StaticRelational {
        plan: Value,
    }

    #[async_trait]
    impl RelationalEngine for StaticRelational {
        fn engine_name(&self) -> &'static str {
            "static-sql"
        }

        async fn explain_analyze(&mut self, sql: &str) -> Result<Value> {
            assert!(sql.starts_with("EXPLAIN (ANALYZE, FORMAT JSON)"));
            Ok(self.plan.clone())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct StaticDocument {
        find: Value,
        aggregate: Value,
    }

    #[async_trait]
    impl DocumentEngine for StaticDocument {
        fn engine_name(&self) -> &'static str {
            "static-doc"
        }

        async fn explain_find(&self, _filter: &Map<String, Value>) -> Result<Value> {
            Ok(self.find.clone())
        }

        async fn explain_aggregate(&self, _pipeline: &[Value]) -> Result<Value> {
            Ok(self.aggregate.clone())
        }

        async fn create_index(&self, index: &IndexSpec) -> Result<String> {
            Err(Error::Query(format!("read-only: {}", index.default_name())))
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_scenario_dispatches_on_mode() {
        let mut relational = StaticRelational {
            plan: json!([{ "Plan": { "Actual Total Time": 1.5 } }]),
        };
        let document = StaticDocument {
            find: json!({ "executionStats": { "executionTimeMillis": 2 } }),
            aggregate: json!({
                "stages": [{ "$cursor": { "executionStats": { "executionTimeMillis": 8 } } }]
            }),
        };

        let scenarios = default_scenarios();
        let find = run_scenario(&mut relational, &document, &scenarios[0]).await;
        assert_eq!(find.document, Ok(Number::from(2)));
        let agg = run_scenario(&mut relational, &document, &scenarios[2]).await;
        assert_eq!(agg.document, Ok(Number::from(8)));
        assert_eq!(agg.relational, Ok(1.5));
    }

    #[tokio::test]
    async fn test_run_reports_every_failed_measurement() {
        let relational = StaticRelational {
            plan: json!([{ "Plan": {} }]),
        };
        let document = StaticDocument {
            find: json!({}),
            aggregate: json!({}),
        };
        let harness = Harness::new(relational, document, default_scenarios());
        let mut out = Vec::new();
        let report = harness.run(&mut out).await;

        assert_eq!(report.results.len(), 5);
        assert_eq!(report.complete_count(), 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("\nDone.\n"));
        assert_eq!(text.matches("error (Missing field").count(), 10);
    }
}
