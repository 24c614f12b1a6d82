//! MongoDB engine over the official driver.

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, IndexModel};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::DocumentEngine;
use crate::config::{IndexSpec, MongoConfig};
use crate::error::{Error, Result};

const VERBOSITY: &str = "executionStats";

/// MongoDB client handle owned by the harness for the whole run.
pub struct MongoEngine {
    client: Option<Client>,
    database: String,
    collection: String,
}

impl MongoEngine {
    /// Build the client and force a round-trip with `ping`.
    ///
    /// The driver connects lazily, so without the ping a bad URI or bad
    /// credentials would only surface on the first scenario.
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        info!("Connecting to MongoDB at {}", config.redacted_uri());

        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| Error::DocumentConnection(e.to_string()))?;
        options.app_name = Some("dualbench".to_string());

        let client =
            Client::with_options(options).map_err(|e| Error::DocumentConnection(e.to_string()))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::DocumentConnection(e.to_string()))?;

        info!(
            "Connected to MongoDB collection: {}.{}",
            config.database, config.collection
        );
        Ok(Self {
            client: Some(client),
            database: config.database.clone(),
            collection: config.collection.clone(),
        })
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Query("MongoDB client already closed".to_string()))
    }

    async fn explain(&self, command: Document) -> Result<Value> {
        debug!("Explaining on {}: {}", self.database, command);
        let reply = self
            .client()?
            .database(&self.database)
            .run_command(doc! { "explain": command, "verbosity": VERBOSITY })
            .await?;
        Ok(Bson::Document(reply).into_relaxed_extjson())
    }
}

/// Convert a JSON object (extended JSON allowed) into a BSON document.
pub fn json_to_document(value: &Map<String, Value>) -> Result<Document> {
    Document::try_from(value.clone())
        .map_err(|e| Error::Query(format!("invalid document: {e}")))
}

fn stage_to_document(index: usize, stage: &Value) -> Result<Document> {
    match stage {
        Value::Object(map) => json_to_document(map),
        _ => Err(Error::Query(format!(
            "pipeline stage {index} is not an object"
        ))),
    }
}

fn find_command(collection: &str, filter: &Map<String, Value>) -> Result<Document> {
    Ok(doc! {
        "find": collection,
        "filter": json_to_document(filter)?,
    })
}

fn aggregate_command(collection: &str, pipeline: &[Value]) -> Result<Document> {
    let stages = pipeline
        .iter()
        .enumerate()
        .map(|(i, stage)| stage_to_document(i, stage))
        .collect::<Result<Vec<_>>>()?;
    Ok(doc! {
        "aggregate": collection,
        "pipeline": stages,
        "cursor": {},
    })
}

fn index_keys(index: &IndexSpec) -> Document {
    let mut keys = Document::new();
    for field in &index.fields {
        keys.insert(field.clone(), 1);
    }
    keys
}

#[async_trait]
impl DocumentEngine for MongoEngine {
    fn engine_name(&self) -> &'static str {
        "mongodb"
    }

    async fn explain_find(&self, filter: &Map<String, Value>) -> Result<Value> {
        self.explain(find_command(&self.collection, filter)?).await
    }

    async fn explain_aggregate(&self, pipeline: &[Value]) -> Result<Value> {
        self.explain(aggregate_command(&self.collection, pipeline)?)
            .await
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String> {
        let model = IndexModel::builder().keys(index_keys(index)).build();
        let result = self
            .client()?
            .database(&self.database)
            .collection::<Document>(&self.collection)
            .create_index(model)
            .await?;
        Ok(result.index_name)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            info!("Closing MongoDB client");
            client.shutdown().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_find_command_shape() {
        let cmd = find_command("captures", &map(json!({ "location.lat": { "$gt": 45.0 } })))
            .unwrap();
        assert_eq!(cmd.get_str("find").unwrap(), "captures");
        let filter = cmd.get_document("filter").unwrap();
        let gt = filter.get_document("location.lat").unwrap();
        assert_eq!(gt.get_f64("$gt").unwrap(), 45.0);
    }

    #[test]
    fn test_aggregate_command_shape() {
        let pipeline = vec![json!({ "$group": { "_id": "$weather", "count": { "$sum": 1 } } })];
        let cmd = aggregate_command("captures", &pipeline).unwrap();
        assert_eq!(cmd.get_str("aggregate").unwrap(), "captures");
        assert_eq!(cmd.get_array("pipeline").unwrap().len(), 1);
        assert!(cmd.get_document("cursor").unwrap().is_empty());
    }

    #[test]
    fn test_aggregate_rejects_scalar_stage() {
        let err = aggregate_command("captures", &[json!(3)]).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }

    #[test]
    fn test_extended_json_filter() {
        let doc = json_to_document(&map(json!({
            "timestamp": { "$gte": { "$date": "2024-01-01T00:00:00Z" } }
        })))
        .unwrap();
        let range = doc.get_document("timestamp").unwrap();
        assert!(matches!(range.get("$gte"), Some(Bson::DateTime(_))));
    }

    #[test]
    fn test_index_keys_keep_order() {
        let keys = index_keys(&IndexSpec::new(["pokemon_details.type_1", "weather"]));
        let names: Vec<_> = keys.keys().cloned().collect();
        assert_eq!(names, vec!["pokemon_details.type_1", "weather"]);
        assert_eq!(keys.get_i32("weather").unwrap(), 1);
    }

    #[test]
    fn test_explain_reply_becomes_plain_json() {
        let reply = doc! {
            "executionStats": { "executionTimeMillis": 4_i32, "nReturned": 1_i64 },
            "ok": 1.0,
        };
        let json = Bson::Document(reply).into_relaxed_extjson();
        assert_eq!(json["executionStats"]["executionTimeMillis"], json!(4));
        assert_eq!(json["executionStats"]["nReturned"], json!(1));
    }
}
