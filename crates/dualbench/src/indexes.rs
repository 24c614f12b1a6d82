//! Document collection index setup, run before an optimised benchmark pass.

use std::future::Future;
use std::io::Write;
use tracing::{error, info, warn};

use crate::config::{BenchConfig, IndexSpec};
use crate::engines::{DocumentEngine, MongoEngine};
use crate::error::Result;
use crate::report::{emit, Outcome, COMPLETION_MARKER};

/// Create each index in order. One failure does not stop the others.
pub async fn create_indexes<D: DocumentEngine>(
    engine: &D,
    indexes: &[IndexSpec],
) -> Vec<(IndexSpec, Outcome<String>)> {
    let mut outcomes = Vec::with_capacity(indexes.len());
    for index in indexes {
        let outcome = engine.create_index(index).await.map_err(Into::into);
        match &outcome {
            Ok(name) => info!("Index ready: {}", name),
            Err(e) => warn!("Index {:?} failed: {}", index.fields, e),
        }
        outcomes.push((index.clone(), outcome));
    }
    outcomes
}

fn render(index: &IndexSpec, outcome: &Outcome<String>) -> String {
    match outcome {
        Ok(name) => format!("   INDEX {name} : ok\n"),
        Err(e) => format!("   INDEX {} : error ({e})\n", index.default_name()),
    }
}

/// Connect to MongoDB, create the configured indexes, close.
///
/// Returns the number of indexes that could not be created; a connection
/// failure counts every index as failed.
pub async fn run_index_setup<W: Write>(config: &BenchConfig, out: &mut W) -> usize {
    setup_indexes_with(MongoEngine::connect(&config.mongo), &config.indexes, out).await
}

/// [`run_index_setup`] over any document engine, supplied as a pending
/// connection.
pub async fn setup_indexes_with<D, F, W>(connect: F, indexes: &[IndexSpec], out: &mut W) -> usize
where
    D: DocumentEngine,
    F: Future<Output = Result<D>>,
    W: Write,
{
    let mut engine = match connect.await {
        Ok(engine) => engine,
        Err(e) => {
            error!("Connection failed, no index was created: {}", e);
            emit(out, &format!("Fatal: {e}\n"));
            return indexes.len();
        }
    };

    let outcomes = create_indexes(&engine, indexes).await;
    for (index, outcome) in &outcomes {
        emit(out, &render(index, outcome));
    }

    if let Err(e) = engine.close().await {
        warn!("Failed to close {}: {}", engine.engine_name(), e);
    }
    emit(out, &format!("\n{COMPLETION_MARKER}\n"));

    outcomes.iter().filter(|(_, o)| o.is_err()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_indexes;
    use crate::error::Error;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Accepts every index except those on `weather` alone.
    #[derive(Default)]
    struct RecordingEngine {
        created: Mutex<Vec<String>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl DocumentEngine for RecordingEngine {
        fn engine_name(&self) -> &'static str {
            "recording"
        }

        async fn explain_find(&self, _filter: &Map<String, Value>) -> Result<Value> {
            unreachable!()
        }

        async fn explain_aggregate(&self, _pipeline: &[Value]) -> Result<Value> {
            unreachable!()
        }

        async fn create_index(&self, index: &IndexSpec) -> Result<String> {
            if index.fields == ["weather"] {
                return Err(Error::Query("index build aborted".to_string()));
            }
            let name = index.default_name();
            self.created.lock().unwrap().push(name.clone());
            Ok(name)
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Rejects every write, like stdout after the reader went away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining_indexes() {
        let engine = RecordingEngine::default();
        let outcomes = create_indexes(&engine, &default_indexes()).await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes.iter().filter(|(_, o)| o.is_ok()).count(), 3);
        assert_eq!(
            engine.created.lock().unwrap().as_slice(),
            [
                "pokemon_details.name_1",
                "pokemon_details.type_1_1_weather_1",
                "location.lat_1",
            ]
        );
    }

    #[test]
    fn test_render_lines() {
        let index = IndexSpec::new(["weather"]);
        assert_eq!(
            render(&index, &Ok("weather_1".to_string())),
            "   INDEX weather_1 : ok\n"
        );
        let failed = render(&index, &Err(crate::report::MeasurementError::new("denied")));
        assert_eq!(failed, "   INDEX weather_1 : error (denied)\n");
    }

    #[tokio::test]
    async fn test_setup_writes_lines_and_marker() {
        let engine = RecordingEngine::default();
        let closed = Arc::clone(&engine.closed);
        let connect = async { Ok::<_, Error>(engine) };
        let mut out = Vec::new();

        let failed = setup_indexes_with(connect, &default_indexes(), &mut out).await;

        assert_eq!(failed, 1);
        assert!(closed.load(Ordering::SeqCst));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("   INDEX ").count(), 4);
        assert!(text.contains("   INDEX weather_1 : error (Query error: index build aborted)\n"));
        assert!(text.ends_with("\nDone.\n"));
    }

    #[tokio::test]
    async fn test_unwritable_output_still_creates_and_closes() {
        let engine = RecordingEngine::default();
        let closed = Arc::clone(&engine.closed);
        let connect = async { Ok::<_, Error>(engine) };

        let failed = setup_indexes_with(connect, &default_indexes(), &mut ClosedPipe).await;

        assert_eq!(failed, 1);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_connect_failure_counts_every_index() {
        let connect = async {
            Err::<RecordingEngine, _>(Error::DocumentConnection("no reachable server".to_string()))
        };
        let mut out = Vec::new();

        let failed = setup_indexes_with(connect, &default_indexes(), &mut out).await;

        assert_eq!(failed, 4);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Fatal: MongoDB connection error: no reachable server\n"
        );

        let connect = async {
            Err::<RecordingEngine, _>(Error::DocumentConnection("no reachable server".to_string()))
        };
        assert_eq!(setup_indexes_with(connect, &default_indexes(), &mut ClosedPipe).await, 4);
    }
}
