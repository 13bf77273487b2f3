//! End-to-end collector scenarios against an in-memory registry, a
//! tempdir-backed local store, and a recording notification sink.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use gridsource::collector::{CollectionStrategy, Collector};
use gridsource::error::{AppError, FetchError, Result};
use gridsource::hash::ContentHash;
use gridsource::models::{
    Candidate, CollectorConfig, Environment, RegistryPolicy, RequestSpec, RunOptions, StorageSpec,
};
use gridsource::notify::{Notification, NotificationSink};
use gridsource::registry::{DedupeRegistry, MemoryRegistry, RegistryRecord};
use gridsource::storage::{LocalStore, ObjectStore};
use gridsource::validate::{check_decomposition, ValidationOutcome};

/// What the scripted source should do for one candidate.
#[derive(Clone)]
enum Scripted {
    Payload(Vec<u8>),
    HttpStatus(u16),
    Timeout,
}

/// Strategy with pre-scripted candidates and responses.
struct ScriptedSource {
    candidates: Vec<Candidate>,
    responses: HashMap<String, Scripted>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            candidates: Vec::new(),
            responses: HashMap::new(),
        }
    }

    fn with_candidate(mut self, identifier: &str, day: u32, response: Scripted) -> Self {
        let candidate = Candidate::new(
            identifier,
            RequestSpec::new(format!("https://api.example.org/feed/{identifier}"), 30),
            StorageSpec {
                dgroup: "miso_test_feed".into(),
                file_date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
                extension: "json".into(),
            },
        )
        .with_metadata("data_type", "test_feed");
        self.candidates.push(candidate);
        self.responses.insert(identifier.to_string(), response);
        self
    }
}

#[async_trait]
impl CollectionStrategy for ScriptedSource {
    fn generate_candidates(&self, _options: &RunOptions) -> Result<Vec<Candidate>> {
        Ok(self.candidates.clone())
    }

    async fn fetch(&self, candidate: &Candidate) -> std::result::Result<Vec<u8>, FetchError> {
        match &self.responses[&candidate.identifier] {
            Scripted::Payload(bytes) => Ok(bytes.clone()),
            Scripted::HttpStatus(status) => Err(FetchError::HttpStatus {
                status: *status,
                url: candidate.request.url.clone(),
            }),
            Scripted::Timeout => Err(FetchError::Timeout {
                url: candidate.request.url.clone(),
                timeout_secs: 30,
            }),
        }
    }

    fn validate(&self, content: &[u8], _candidate: &Candidate) -> ValidationOutcome {
        // LMP-style check when the payload carries price fields.
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(content) else {
            return ValidationOutcome::fail("malformed JSON");
        };
        let mut outcome = ValidationOutcome::pass();
        if let Some(record) = body.get("data").and_then(|d| d.get(0)) {
            if record.get("lmp").is_some() {
                check_decomposition(record, "lmp", &["mec", "mcc", "mlc"], &mut outcome);
            }
        }
        outcome
    }
}

/// Sink recording every published message; optionally failing.
#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, message: &Notification) -> Result<()> {
        if self.fail {
            return Err(AppError::config("broker unavailable"));
        }
        self.messages.lock().await.push(message.clone());
        Ok(())
    }
}

/// Registry whose checks always fail.
struct BrokenRegistry;

#[async_trait]
impl DedupeRegistry for BrokenRegistry {
    async fn exists(&self, _namespace: &str, _hash: &ContentHash) -> Result<bool> {
        Err(AppError::registry("connection refused"))
    }

    async fn register(
        &self,
        _namespace: &str,
        _hash: &ContentHash,
        _ttl: std::time::Duration,
        _record: &RegistryRecord,
    ) -> Result<()> {
        Err(AppError::registry("connection refused"))
    }
}

fn lmp_payload(day: u32, losses: f64) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "data": [{
            "node": "ALTW.WELLS1",
            "date": format!("2025-01-{day:02}"),
            "lmp": 45.50, "mec": 42.00, "mcc": 2.50, "mlc": losses,
        }]
    }))
    .unwrap()
}

fn config() -> CollectorConfig {
    CollectorConfig::new("miso_test_feed", Environment::Dev)
}

struct Harness {
    registry: Arc<MemoryRegistry>,
    store: Arc<LocalStore>,
    sink: Arc<RecordingSink>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            registry: Arc::new(MemoryRegistry::new()),
            store: Arc::new(LocalStore::new(dir.path())),
            sink: Arc::new(RecordingSink::default()),
            _dir: dir,
        }
    }

    fn collector(&self, source: ScriptedSource) -> Collector<ScriptedSource> {
        Collector::new(
            config(),
            source,
            Arc::clone(&self.registry) as Arc<dyn DedupeRegistry>,
            Arc::clone(&self.store) as Arc<dyn ObjectStore>,
        )
        .unwrap()
        .with_sink(Arc::clone(&self.sink) as Arc<dyn NotificationSink>)
    }
}

fn snapshot_source() -> ScriptedSource {
    ScriptedSource::new().with_candidate(
        "test_feed_20250120.json",
        20,
        Scripted::Payload(lmp_payload(20, 1.00)),
    )
}

#[tokio::test]
async fn test_snapshot_happy_path() {
    let harness = Harness::new();
    let collector = harness.collector(snapshot_source());

    let summary = collector.run(&RunOptions::default()).await;

    assert_eq!(summary.total_candidates, 1);
    assert_eq!(summary.collected, 1);
    assert_eq!(summary.skipped_duplicate, 0);
    assert_eq!(summary.failed, 0);
    assert!(!summary.has_failures());

    // One store write under the hive-partitioned key.
    let key = "sourcing/miso_test_feed/year=2025/month=01/day=20/test_feed_20250120.json.gz";
    assert!(harness.store.exists(key).await.unwrap());

    // One registry entry.
    assert_eq!(harness.registry.len().await, 1);

    // One notification with the standard fields.
    let messages = harness.sink.messages.lock().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].dataset, "miso_test_feed");
    assert_eq!(messages[0].environment, "dev");
    assert_eq!(messages[0].urn, "test_feed_20250120.json");
    assert!(messages[0].location.ends_with(".json.gz"));
    assert!(messages[0].metadata.contains_key("original_file_md5sum"));
}

#[tokio::test]
async fn test_stored_object_is_gzipped() {
    use std::io::Read;

    let harness = Harness::new();
    let collector = harness.collector(snapshot_source());
    collector.run(&RunOptions::default()).await;

    let key = "sourcing/miso_test_feed/year=2025/month=01/day=20/test_feed_20250120.json.gz";
    let compressed = std::fs::read(harness.store.root().join(key)).unwrap();
    let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
    let mut restored = Vec::new();
    decoder.read_to_end(&mut restored).unwrap();
    assert_eq!(restored, lmp_payload(20, 1.00));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = Harness::new();

    let source = || {
        ScriptedSource::new()
            .with_candidate("feed_20250120.json", 20, Scripted::Payload(lmp_payload(20, 1.00)))
            .with_candidate("feed_20250121.json", 21, Scripted::Payload(lmp_payload(21, 1.00)))
            .with_candidate("feed_20250122.json", 22, Scripted::Payload(lmp_payload(22, 1.00)))
    };

    let first = harness.collector(source()).run(&RunOptions::default()).await;
    assert_eq!(first.collected, 3);
    assert_eq!(first.skipped_duplicate, 0);

    let second = harness.collector(source()).run(&RunOptions::default()).await;
    assert_eq!(second.collected, 0);
    assert_eq!(second.skipped_duplicate, first.collected);
    assert_eq!(second.failed, 0);

    // No extra notifications on the second run.
    assert_eq!(harness.sink.messages.lock().await.len(), 3);
}

#[tokio::test]
async fn test_partial_failure_isolation() {
    let harness = Harness::new();
    // Candidate #2 fails arithmetic validation (sum off by 0.02).
    let source = ScriptedSource::new()
        .with_candidate("feed_20250101.json", 1, Scripted::Payload(lmp_payload(1, 1.00)))
        .with_candidate("feed_20250102.json", 2, Scripted::Payload(lmp_payload(2, 1.02)))
        .with_candidate("feed_20250103.json", 3, Scripted::Payload(lmp_payload(3, 1.00)))
        .with_candidate("feed_20250104.json", 4, Scripted::Payload(lmp_payload(4, 1.00)))
        .with_candidate("feed_20250105.json", 5, Scripted::Payload(lmp_payload(5, 1.00)));

    let summary = harness.collector(source).run(&RunOptions::default()).await;

    assert_eq!(summary.total_candidates, 5);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.collected, 4);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].candidate, "feed_20250102.json");
    assert!(summary.errors[0].error.contains("validation failed"));
}

#[tokio::test]
async fn test_backfill_with_fatal_404() {
    let harness = Harness::new();
    let source = ScriptedSource::new()
        .with_candidate("feed_20250120.json", 20, Scripted::Payload(lmp_payload(20, 1.00)))
        .with_candidate("feed_20250121.json", 21, Scripted::HttpStatus(404))
        .with_candidate("feed_20250122.json", 22, Scripted::Payload(lmp_payload(22, 1.00)));

    let summary = harness.collector(source).run(&RunOptions::default()).await;

    assert_eq!(summary.total_candidates, 3);
    assert_eq!(summary.collected, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].error.contains("404"));
}

#[tokio::test]
async fn test_timeout_is_recorded_per_candidate() {
    let harness = Harness::new();
    let source = ScriptedSource::new().with_candidate(
        "feed_20250120.json",
        20,
        Scripted::Timeout,
    );

    let summary = harness.collector(source).run(&RunOptions::default()).await;
    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].error.contains("timeout"));
}

#[tokio::test]
async fn test_force_stores_despite_registered_hash() {
    let harness = Harness::new();

    let first = harness
        .collector(snapshot_source())
        .run(&RunOptions::default())
        .await;
    assert_eq!(first.collected, 1);

    let options = RunOptions {
        force: true,
        ..RunOptions::default()
    };
    let second = harness.collector(snapshot_source()).run(&options).await;
    assert_eq!(second.collected, 1);
    assert_eq!(second.skipped_duplicate, 0);
    assert_eq!(harness.sink.messages.lock().await.len(), 2);
}

#[tokio::test]
async fn test_skip_hash_check_stores_despite_registered_hash() {
    let first_harness = Harness::new();
    let first = first_harness
        .collector(snapshot_source())
        .run(&RunOptions::default())
        .await;
    assert_eq!(first.collected, 1);

    // Same registry, fresh store: the registered hash must not matter.
    let dir = tempfile::tempdir().unwrap();
    let fresh_store = Arc::new(LocalStore::new(dir.path()));
    let collector = Collector::new(
        config(),
        snapshot_source(),
        Arc::clone(&first_harness.registry) as Arc<dyn DedupeRegistry>,
        Arc::clone(&fresh_store) as Arc<dyn ObjectStore>,
    )
    .unwrap();

    let options = RunOptions {
        skip_hash_check: true,
        ..RunOptions::default()
    };
    let summary = collector.run(&options).await;
    assert_eq!(summary.collected, 1);
    assert_eq!(summary.skipped_duplicate, 0);
}

#[tokio::test]
async fn test_skip_hash_check_respects_existing_object() {
    let harness = Harness::new();
    harness
        .collector(snapshot_source())
        .run(&RunOptions::default())
        .await;

    // Same store this time: the pre-existing object stands in for the
    // skipped registry check.
    let options = RunOptions {
        skip_hash_check: true,
        ..RunOptions::default()
    };
    let summary = harness.collector(snapshot_source()).run(&options).await;
    assert_eq!(summary.collected, 0);
    assert_eq!(summary.skipped_duplicate, 1);
}

#[tokio::test]
async fn test_identical_content_across_candidates_dedupes() {
    let harness = Harness::new();
    // Two days whose upstream published byte-identical payloads.
    let source = ScriptedSource::new()
        .with_candidate("feed_20250120.json", 20, Scripted::Payload(lmp_payload(20, 1.00)))
        .with_candidate("feed_20250121.json", 21, Scripted::Payload(lmp_payload(20, 1.00)));

    let summary = harness.collector(source).run(&RunOptions::default()).await;
    assert_eq!(summary.collected, 1);
    assert_eq!(summary.skipped_duplicate, 1);
}

#[tokio::test]
async fn test_notification_failure_is_non_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let store = Arc::new(LocalStore::new(dir.path()));
    let collector = Collector::new(
        config(),
        snapshot_source(),
        Arc::clone(&registry) as Arc<dyn DedupeRegistry>,
        store as Arc<dyn ObjectStore>,
    )
    .unwrap()
    .with_sink(Arc::new(RecordingSink::failing()));

    let summary = collector.run(&RunOptions::default()).await;
    assert_eq!(summary.collected, 1);
    assert_eq!(summary.failed, 0);
    // The hash is still registered even though the sink failed.
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_registry_failure_fails_candidate_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let collector = Collector::new(
        config(),
        snapshot_source(),
        Arc::new(BrokenRegistry) as Arc<dyn DedupeRegistry>,
        Arc::new(LocalStore::new(dir.path())) as Arc<dyn ObjectStore>,
    )
    .unwrap();

    let summary = collector.run(&RunOptions::default()).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.collected, 0);
    assert!(summary.errors[0].error.contains("registry"));
}

#[tokio::test]
async fn test_registry_failure_tolerated_under_continue_policy() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config();
    cfg.registry_policy = RegistryPolicy::LogAndContinue;
    let collector = Collector::new(
        cfg,
        snapshot_source(),
        Arc::new(BrokenRegistry) as Arc<dyn DedupeRegistry>,
        Arc::new(LocalStore::new(dir.path())) as Arc<dyn ObjectStore>,
    )
    .unwrap();

    let summary = collector.run(&RunOptions::default()).await;
    assert_eq!(summary.collected, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_generation_failure_yields_empty_summary() {
    struct FailingGenerator;

    #[async_trait]
    impl CollectionStrategy for FailingGenerator {
        fn generate_candidates(&self, _options: &RunOptions) -> Result<Vec<Candidate>> {
            Err(AppError::config("feed misconfigured"))
        }

        async fn fetch(&self, _c: &Candidate) -> std::result::Result<Vec<u8>, FetchError> {
            unreachable!()
        }

        fn validate(&self, _content: &[u8], _c: &Candidate) -> ValidationOutcome {
            unreachable!()
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let collector = Collector::new(
        config(),
        FailingGenerator,
        Arc::new(MemoryRegistry::new()) as Arc<dyn DedupeRegistry>,
        Arc::new(LocalStore::new(dir.path())) as Arc<dyn ObjectStore>,
    )
    .unwrap();

    let summary = collector.run(&RunOptions::default()).await;
    assert_eq!(summary.total_candidates, 0);
    assert_eq!(summary.collected, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].candidate, "generation");
}

#[tokio::test]
async fn test_concurrent_run_preserves_counters() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config();
    cfg.max_concurrent = 4;

    let source = ScriptedSource::new()
        .with_candidate("feed_20250101.json", 1, Scripted::Payload(lmp_payload(1, 1.00)))
        .with_candidate("feed_20250102.json", 2, Scripted::Payload(lmp_payload(2, 1.00)))
        .with_candidate("feed_20250103.json", 3, Scripted::HttpStatus(500))
        .with_candidate("feed_20250104.json", 4, Scripted::Payload(lmp_payload(4, 1.00)))
        .with_candidate("feed_20250105.json", 5, Scripted::Payload(lmp_payload(5, 1.00)));

    let collector = Collector::new(
        cfg,
        source,
        Arc::new(MemoryRegistry::new()) as Arc<dyn DedupeRegistry>,
        Arc::new(LocalStore::new(dir.path())) as Arc<dyn ObjectStore>,
    )
    .unwrap();

    let summary = collector.run(&RunOptions::default()).await;
    assert_eq!(summary.total_candidates, 5);
    assert_eq!(summary.collected, 4);
    assert_eq!(summary.failed, 1);
}
