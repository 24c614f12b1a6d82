//! Timing extraction from each engine's explain output.
//!
//! Both extractors work on plain JSON so they can be tested without a live
//! engine. PostgreSQL returns `EXPLAIN (ANALYZE, FORMAT JSON)` as a one-element
//! array whose `Plan` node carries `Actual Total Time`. MongoDB returns
//! `executionStats.executionTimeMillis`, either at the top level or, for some
//! aggregation plans, under the first stage's `$cursor`.

use serde_json::{Number, Value};

use crate::error::{Error, Result};

const PLAN: &str = "Plan";
const ACTUAL_TOTAL_TIME: &str = "Actual Total Time";
const EXECUTION_STATS: &str = "executionStats";
const EXECUTION_TIME_MILLIS: &str = "executionTimeMillis";

/// Extract the top-level plan node's actual elapsed time, in milliseconds.
pub fn relational_total_time(explain: &Value) -> Result<f64> {
    let root = match explain {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| Error::MissingField("plan array is empty".to_string()))?,
        other => other,
    };

    let plan = root
        .get(PLAN)
        .ok_or_else(|| Error::MissingField(PLAN.to_string()))?;

    plan.get(ACTUAL_TOTAL_TIME)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::MissingField(format!("{PLAN}.{ACTUAL_TOTAL_TIME}")))
}

/// Where an explain response may keep its execution statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatsLocator {
    /// `executionStats` at the top level.
    TopLevel,
    /// `stages[0].$cursor.executionStats`.
    FirstStageCursor,
}

/// Strategies for point/range lookups.
pub const FIND_STRATEGIES: &[ExecutionStatsLocator] = &[ExecutionStatsLocator::TopLevel];

/// Strategies for aggregation pipelines, in preference order.
pub const AGGREGATE_STRATEGIES: &[ExecutionStatsLocator] = &[
    ExecutionStatsLocator::TopLevel,
    ExecutionStatsLocator::FirstStageCursor,
];

impl ExecutionStatsLocator {
    /// Dotted path of the stats document this strategy looks at.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::TopLevel => "executionStats",
            Self::FirstStageCursor => "stages[0].$cursor.executionStats",
        }
    }

    /// Locate the execution statistics sub-document, if present.
    #[must_use]
    pub fn locate(self, explain: &Value) -> Option<&Value> {
        let stats = match self {
            Self::TopLevel => explain.get(EXECUTION_STATS),
            Self::FirstStageCursor => explain
                .get("stages")?
                .get(0)?
                .get("$cursor")?
                .get(EXECUTION_STATS),
        }?;
        // An explicit null counts as absent.
        stats.is_object().then_some(stats)
    }
}

/// Extract `executionTimeMillis`, trying each strategy in order.
///
/// The number is returned as the engine reported it, so integer timings stay
/// integers.
pub fn document_execution_millis(
    explain: &Value,
    strategies: &[ExecutionStatsLocator],
) -> Result<Number> {
    for strategy in strategies {
        let millis = strategy
            .locate(explain)
            .and_then(|stats| stats.get(EXECUTION_TIME_MILLIS))
            .and_then(|v| match v {
                Value::Number(n) => Some(n.clone()),
                _ => None,
            });
        if let Some(millis) = millis {
            return Ok(millis);
        }
    }

    let tried = strategies
        .iter()
        .map(|s| format!("{}.{EXECUTION_TIME_MILLIS}", s.path()))
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::MissingField(format!("tried {tried}")))
}
