//! Benchmark scenarios: one query intent expressed for both engines.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Prefix asking PostgreSQL for an analyzed, machine-readable plan.
pub const EXPLAIN_PREFIX: &str = "EXPLAIN (ANALYZE, FORMAT JSON)";

/// Document-store execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMode {
    /// Point or range lookup through a single filter.
    Find,
    /// Multi-stage aggregation pipeline.
    Aggregate,
}

impl fmt::Display for DocumentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => f.write_str("find"),
            Self::Aggregate => f.write_str("aggregate"),
        }
    }
}

/// The document-store half of a scenario. The variant is the mode tag.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentQuery {
    Find { filter: serde_json::Map<String, Value> },
    Aggregate { pipeline: Vec<Value> },
}

impl DocumentQuery {
    #[must_use]
    pub fn mode(&self) -> DocumentMode {
        match self {
            Self::Find { .. } => DocumentMode::Find,
            Self::Aggregate { .. } => DocumentMode::Aggregate,
        }
    }
}

/// A named comparative test case.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    /// Relational query, without the explain wrapper.
    pub sql: String,
    pub document: DocumentQuery,
}

impl Scenario {
    /// Point/range lookup scenario.
    pub fn find(name: impl Into<String>, sql: impl Into<String>, filter: Value) -> Result<Self> {
        let name = name.into();
        let Value::Object(filter) = filter else {
            return Err(Error::Scenario(format!(
                "{name}: find filter must be a JSON object"
            )));
        };
        let scenario = Self {
            name,
            sql: sql.into(),
            document: DocumentQuery::Find { filter },
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// Aggregation scenario.
    pub fn aggregate(
        name: impl Into<String>,
        sql: impl Into<String>,
        pipeline: Vec<Value>,
    ) -> Result<Self> {
        let scenario = Self {
            name: name.into(),
            sql: sql.into(),
            document: DocumentQuery::Aggregate { pipeline },
        };
        scenario.validate()?;
        Ok(scenario)
    }

    #[must_use]
    pub fn mode(&self) -> DocumentMode {
        self.document.mode()
    }

    /// Relational query wrapped in the analyzed-plan request.
    ///
    /// Queries already starting with `EXPLAIN` are submitted untouched.
    #[must_use]
    pub fn explain_sql(&self) -> String {
        let sql = self.sql.trim();
        let already_explained = sql
            .get(..7)
            .is_some_and(|head| head.eq_ignore_ascii_case("EXPLAIN"));
        if already_explained {
            sql.to_string()
        } else {
            format!("{EXPLAIN_PREFIX} {sql}")
        }
    }

    /// Check the invariants a scenario must hold on its own.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Scenario("scenario name must not be empty".to_string()));
        }
        if self.sql.trim().is_empty() {
            return Err(Error::Scenario(format!("{}: sql must not be empty", self.name)));
        }
        if let DocumentQuery::Aggregate { pipeline } = &self.document {
            if pipeline.is_empty() {
                return Err(Error::Scenario(format!(
                    "{}: aggregation pipeline must have at least one stage",
                    self.name
                )));
            }
            for (i, stage) in pipeline.iter().enumerate() {
                let valid = stage
                    .as_object()
                    .is_some_and(|m| m.len() == 1 && m.keys().all(|k| k.starts_with('$')));
                if !valid {
                    return Err(Error::Scenario(format!(
                        "{}: pipeline stage {i} must be an object with a single $-operator",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// On-disk form of a scenario. Mode and query form are checked on conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScenario {
    name: String,
    sql: String,
    mode: DocumentMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pipeline: Option<Vec<Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    scenarios: Vec<RawScenario>,
}

impl TryFrom<RawScenario> for Scenario {
    type Error = Error;

    fn try_from(raw: RawScenario) -> Result<Self> {
        match (raw.mode, raw.filter, raw.pipeline) {
            (DocumentMode::Find, Some(filter), None) => Scenario::find(raw.name, raw.sql, filter),
            (DocumentMode::Aggregate, None, Some(pipeline)) => {
                Scenario::aggregate(raw.name, raw.sql, pipeline)
            }
            (mode, filter, pipeline) => Err(Error::Scenario(format!(
                "{}: mode '{mode}' requires exactly one {} (filter given: {}, pipeline given: {})",
                raw.name,
                match mode {
                    DocumentMode::Find => "filter",
                    DocumentMode::Aggregate => "pipeline",
                },
                filter.is_some(),
                pipeline.is_some()
            ))),
        }
    }
}

impl From<&Scenario> for RawScenario {
    fn from(scenario: &Scenario) -> Self {
        let (filter, pipeline) = match &scenario.document {
            DocumentQuery::Find { filter } => (Some(Value::Object(filter.clone())), None),
            DocumentQuery::Aggregate { pipeline } => (None, Some(pipeline.clone())),
        };
        Self {
            name: scenario.name.clone(),
            sql: scenario.sql.clone(),
            mode: scenario.mode(),
            filter,
            pipeline,
        }
    }
}

/// Parse a scenario list from YAML (`scenarios: [...]`).
pub fn scenarios_from_yaml(content: &str) -> Result<Vec<Scenario>> {
    let file: ScenarioFile = serde_yaml::from_str(content)?;
    let scenarios = file
        .scenarios
        .into_iter()
        .map(Scenario::try_from)
        .collect::<Result<Vec<_>>>()?;
    check_list(&scenarios)?;
    Ok(scenarios)
}

/// Load a scenario list from a YAML file.
pub fn load_scenarios(path: impl AsRef<Path>) -> Result<Vec<Scenario>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Scenario(format!("cannot read scenario file '{}': {e}", path.display()))
    })?;
    scenarios_from_yaml(&content)
}

/// Serialize a scenario list to the YAML file format.
pub fn scenarios_to_yaml(scenarios: &[Scenario]) -> Result<String> {
    let file = ScenarioFile {
        scenarios: scenarios.iter().map(RawScenario::from).collect(),
    };
    Ok(serde_yaml::to_string(&file)?)
}

fn check_list(scenarios: &[Scenario]) -> Result<()> {
    if scenarios.is_empty() {
        return Err(Error::Scenario("scenario list is empty".to_string()));
    }
    let mut seen = HashSet::new();
    for scenario in scenarios {
        if !seen.insert(scenario.name.as_str()) {
            return Err(Error::Scenario(format!(
                "duplicate scenario name '{}'",
                scenario.name
            )));
        }
    }
    Ok(())
}

/// The built-in capture dataset scenarios, in run order.
#[must_use]
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "1. Exact match (Pikachu)".to_string(),
            sql: "SELECT c.trainer_name, c.capture_date, p.name \
                  FROM fact_captures c \
                  JOIN dim_pokemons p ON c.pokedex_id = p.pokedex_id \
                  WHERE p.name = 'pikachu';"
                .to_string(),
            document: DocumentQuery::Find {
                filter: object(json!({ "pokemon_details.name": "pikachu" })),
            },
        },
        Scenario {
            name: "2. Range (Lat > 45)".to_string(),
            sql: "SELECT * FROM fact_captures WHERE latitude > 45.0;".to_string(),
            document: DocumentQuery::Find {
                filter: object(json!({ "location.lat": { "$gt": 45.0 } })),
            },
        },
        Scenario {
            name: "3. Simple aggregation (count by weather)".to_string(),
            sql: "SELECT weather, COUNT(*) FROM fact_captures GROUP BY weather;".to_string(),
            document: DocumentQuery::Aggregate {
                pipeline: vec![json!({
                    "$group": { "_id": "$weather", "count": { "$sum": 1 } }
                })],
            },
        },
        Scenario {
            name: "4. Compound filter (Electric + Rainy)".to_string(),
            sql: "SELECT c.trainer_name FROM fact_captures c \
                  JOIN dim_pokemons p ON c.pokedex_id = p.pokedex_id \
                  WHERE p.type_1 = 'electric' AND c.weather = 'Rainy';"
                .to_string(),
            document: DocumentQuery::Find {
                filter: object(json!({
                    "pokemon_details.type_1": "electric",
                    "weather": "Rainy"
                })),
            },
        },
        Scenario {
            name: "5. Heavy aggregation (avg HP by weather)".to_string(),
            sql: "SELECT c.weather, AVG(p.hp) FROM fact_captures c \
                  JOIN dim_pokemons p ON c.pokedex_id = p.pokedex_id \
                  GROUP BY c.weather;"
                .to_string(),
            document: DocumentQuery::Aggregate {
                pipeline: vec![json!({
                    "$group": { "_id": "$weather", "avg_hp": { "$avg": "$pokemon_details.hp" } }
                })],
            },
        },
    ]
}

fn object(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}
