//! Per-scenario outcomes and their text rendering.
//!
//! Everything here is a plain value: the harness fills it in, `Display`
//! turns it into the report lines.

use serde_json::Number;
use std::fmt;
use std::io::Write;
use tracing::warn;

use crate::scenario::DocumentMode;

/// Printed once all scenarios have run and both connections are closed.
pub const COMPLETION_MARKER: &str = "Done.";

/// Why one engine produced no measurement for a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementError(String);

impl MeasurementError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<crate::error::Error> for MeasurementError {
    fn from(err: crate::error::Error) -> Self {
        Self(err.to_string())
    }
}

/// Outcome of one engine's measurement.
pub type Outcome<T> = Result<T, MeasurementError>;

/// Both measurements for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    pub name: String,
    pub mode: DocumentMode,
    /// `Actual Total Time` of the top plan node, in ms.
    pub relational: Outcome<f64>,
    /// `executionTimeMillis` as the engine reported it.
    pub document: Outcome<Number>,
}

impl ScenarioResult {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.relational.is_ok() && self.document.is_ok()
    }
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "> {} [{}]", self.name, self.mode)?;
        match &self.relational {
            Ok(ms) => writeln!(f, "   SQL   : {ms:.2} ms")?,
            Err(e) => writeln!(f, "   SQL   : error ({e})")?,
        }
        match &self.document {
            Ok(ms) => writeln!(f, "   MONGO : {ms} ms"),
            Err(e) => writeln!(f, "   MONGO : error ({e})"),
        }
    }
}

/// Banner printed before the first scenario.
#[must_use]
pub fn header(scenario_count: usize) -> String {
    let title = format!("Starting benchmark ({scenario_count} scenarios)");
    let rule = "=".repeat(title.len());
    format!("{title}\n{rule}\n")
}

/// Write `text` and flush. A failed write is logged, never fatal.
pub(crate) fn emit<W: Write>(out: &mut W, text: &str) {
    if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        warn!("Failed to write report output: {}", e);
    }
}

/// A complete benchmark run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub results: Vec<ScenarioResult>,
}

impl Report {
    /// Scenarios where both engines produced a measurement.
    #[must_use]
    pub fn complete_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_complete()).count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&header(self.results.len()))?;
        for result in &self.results {
            writeln!(f)?;
            write!(f, "{result}")?;
        }
        writeln!(f)?;
        writeln!(f, "{COMPLETION_MARKER}")
    }
}
