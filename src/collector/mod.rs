// src/collector/mod.rs

//! The collection orchestration core.
//!
//! A [`Collector`] drives a list of candidates through the pipeline:
//! fetch → validate → hash → dedupe-check → compress → store → register
//! → notify. Source-specific behavior lives in a [`CollectionStrategy`];
//! the collector owns the state transitions, idempotency guarantees, and
//! partial-failure handling.
//!
//! Failures are isolated per candidate: a fetch or validation failure is
//! recorded in the run summary and the loop proceeds. Nothing short of a
//! candidate-generation failure stops a run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::error::{FetchError, Result};
use crate::hash::ContentHash;
use crate::models::{
    Candidate, CollectorConfig, MetadataValue, RegistryPolicy, RunOptions, RunSummary,
};
use crate::notify::{Notification, NotificationSink};
use crate::registry::{DedupeRegistry, RegistryRecord};
use crate::storage::{gzip_compress, object_key, ObjectStore};
use crate::validate::ValidationOutcome;

/// Source-specific behavior plugged into a [`Collector`].
///
/// One implementation per data feed: it knows how to enumerate the
/// requests a run needs, how to fetch each one (including pagination and
/// retry, which are fetcher-internal concerns), and what a valid payload
/// looks like.
#[async_trait]
pub trait CollectionStrategy: Send + Sync {
    /// Produce the candidates covering every required request.
    ///
    /// Pure function of the run options: snapshot sources return one
    /// candidate, date-range sources one per calendar day. No side
    /// effects.
    fn generate_candidates(&self, options: &RunOptions) -> Result<Vec<Candidate>>;

    /// Perform the network request(s) for one candidate and return the
    /// raw payload bytes.
    async fn fetch(&self, candidate: &Candidate) -> std::result::Result<Vec<u8>, FetchError>;

    /// Judge the fetched payload. A failed outcome is recorded, never
    /// retried.
    fn validate(&self, content: &[u8], candidate: &Candidate) -> ValidationOutcome;
}

/// Terminal state of one candidate after its trip through the
/// pipeline. `Registered` means stored and registered but no sink was
/// configured or the sink failed; `Notified` means the sink accepted
/// the message too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateState {
    FetchFailed,
    ValidationFailed,
    SkippedDuplicate,
    StoreFailed,
    RegistryFailed,
    Registered,
    Notified,
}

struct CandidateOutcome {
    identifier: String,
    state: CandidateState,
    error: Option<String>,
}

impl CandidateOutcome {
    fn failed(identifier: String, state: CandidateState, error: impl Into<String>) -> Self {
        Self {
            identifier,
            state,
            error: Some(error.into()),
        }
    }

    fn done(identifier: String, state: CandidateState) -> Self {
        Self {
            identifier,
            state,
            error: None,
        }
    }
}

/// Orchestrates one data feed's collection pipeline.
pub struct Collector<S> {
    config: CollectorConfig,
    strategy: S,
    registry: Arc<dyn DedupeRegistry>,
    store: Arc<dyn ObjectStore>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl<S: CollectionStrategy> Collector<S> {
    /// Create a collector. Fails when the configuration is unusable;
    /// this is the only failure that happens before any candidate is
    /// processed.
    pub fn new(
        config: CollectorConfig,
        strategy: S,
        registry: Arc<dyn DedupeRegistry>,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            strategy,
            registry,
            store,
            sink: None,
        })
    }

    /// Attach an optional notification sink.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Run the full pipeline for the given options.
    ///
    /// Per-candidate failures are converted into summary entries; the
    /// run itself always completes.
    pub async fn run(&self, options: &RunOptions) -> RunSummary {
        info!(
            "Starting collection: dgroup={} environment={} force={} skip_hash_check={}",
            self.config.dgroup, self.config.environment, options.force, options.skip_hash_check
        );

        let candidates = match options
            .validate()
            .and_then(|_| self.strategy.generate_candidates(options))
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Failed to generate candidates: {e}");
                let mut summary = RunSummary::new(0);
                // Counted as an error entry, not a candidate failure:
                // nothing was attempted.
                summary.errors.push(crate::models::CandidateError {
                    candidate: "generation".into(),
                    error: e.to_string(),
                });
                return summary;
            }
        };

        info!("Generated {} candidates", candidates.len());
        let mut summary = RunSummary::new(candidates.len());
        let ttl = self.run_ttl(options);

        if self.config.max_concurrent > 1 {
            let mut outcomes = stream::iter(candidates)
                .map(|candidate| self.process_candidate(candidate, options, ttl))
                .buffer_unordered(self.config.max_concurrent);
            while let Some(outcome) = outcomes.next().await {
                Self::tally(&mut summary, outcome);
            }
        } else {
            for candidate in candidates {
                let outcome = self.process_candidate(candidate, options, ttl).await;
                Self::tally(&mut summary, outcome);
            }
        }

        info!(
            "Collection complete: total={} collected={} skipped_duplicate={} failed={}",
            summary.total_candidates, summary.collected, summary.skipped_duplicate, summary.failed
        );
        summary
    }

    fn run_ttl(&self, options: &RunOptions) -> Duration {
        let days = options.ttl_days.unwrap_or(self.config.hash_ttl_days);
        Duration::from_secs(u64::from(days) * 86_400)
    }

    fn tally(summary: &mut RunSummary, outcome: CandidateOutcome) {
        match outcome.state {
            CandidateState::Registered | CandidateState::Notified => summary.record_collected(),
            CandidateState::SkippedDuplicate => summary.record_duplicate(),
            CandidateState::FetchFailed
            | CandidateState::ValidationFailed
            | CandidateState::StoreFailed
            | CandidateState::RegistryFailed => {
                summary.record_failure(
                    outcome.identifier,
                    outcome.error.unwrap_or_else(|| "unknown error".into()),
                );
            }
        }
    }

    /// Drive one candidate through the state machine.
    async fn process_candidate(
        &self,
        candidate: Candidate,
        options: &RunOptions,
        ttl: Duration,
    ) -> CandidateOutcome {
        let identifier = candidate.identifier.clone();

        // Fetch. Retry, if any, already happened inside the strategy.
        let content = match self.strategy.fetch(&candidate).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Fetch failed for {identifier}: {e}");
                return CandidateOutcome::failed(
                    identifier,
                    CandidateState::FetchFailed,
                    e.to_string(),
                );
            }
        };

        // Validate. A negative outcome is final for this candidate.
        let outcome = self.strategy.validate(&content, &candidate);
        if !outcome.is_valid() {
            warn!(
                "Content validation failed for {identifier}: {}",
                outcome.summary()
            );
            return CandidateOutcome::failed(
                identifier,
                CandidateState::ValidationFailed,
                format!("content validation failed: {}", outcome.summary()),
            );
        }

        let content_hash = ContentHash::of(&content);
        let namespace = self.config.namespace();

        // Dedupe check, unless bypassed.
        if !options.force && !options.skip_hash_check {
            match self.registry.exists(&namespace, &content_hash).await {
                Ok(true) => {
                    debug!(
                        "Skipping duplicate {identifier} (hash {})",
                        content_hash.short()
                    );
                    return CandidateOutcome::done(identifier, CandidateState::SkippedDuplicate);
                }
                Ok(false) => {}
                Err(e) => match self.config.registry_policy {
                    RegistryPolicy::FailFast => {
                        warn!("Registry check failed for {identifier}: {e}");
                        return CandidateOutcome::failed(
                            identifier,
                            CandidateState::RegistryFailed,
                            e.to_string(),
                        );
                    }
                    RegistryPolicy::LogAndContinue => {
                        warn!(
                            "Registry check failed for {identifier}, proceeding without dedupe: {e}"
                        );
                    }
                },
            }
        }

        let key = object_key(&self.config.store_prefix, self.config.partition, &candidate);

        // When the registry check was skipped, a pre-existing object at
        // the key stands in for it. Force bypasses this too.
        if options.skip_hash_check && !options.force {
            match self.store.exists(&key).await {
                Ok(true) => {
                    debug!("Object already present at {key}, skipping {identifier}");
                    return CandidateOutcome::done(identifier, CandidateState::SkippedDuplicate);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Pre-existing object check failed for {identifier}: {e}");
                    return CandidateOutcome::failed(
                        identifier,
                        CandidateState::StoreFailed,
                        e.to_string(),
                    );
                }
            }
        }

        // Compress and store.
        let compressed = match gzip_compress(&content) {
            Ok(compressed) => compressed,
            Err(e) => {
                return CandidateOutcome::failed(
                    identifier,
                    CandidateState::StoreFailed,
                    e.to_string(),
                );
            }
        };
        debug!(
            "Compressed {identifier}: {} -> {} bytes",
            content.len(),
            compressed.len()
        );

        let receipt = match self.store.put(&key, &compressed, "gzip").await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Store failed for {identifier}: {e}");
                return CandidateOutcome::failed(
                    identifier,
                    CandidateState::StoreFailed,
                    e.to_string(),
                );
            }
        };

        // Register the hash so re-runs skip identical content.
        let mut record_metadata = candidate.metadata.clone();
        record_metadata.insert(
            "version_id".into(),
            MetadataValue::Text(receipt.version_id.clone()),
        );
        record_metadata.insert("etag".into(), MetadataValue::Text(receipt.etag.clone()));
        let record = RegistryRecord::new(receipt.location.clone(), record_metadata);

        if let Err(e) = self
            .registry
            .register(&namespace, &content_hash, ttl, &record)
            .await
        {
            match self.config.registry_policy {
                RegistryPolicy::FailFast => {
                    warn!("Registry registration failed for {identifier}: {e}");
                    return CandidateOutcome::failed(
                        identifier,
                        CandidateState::RegistryFailed,
                        e.to_string(),
                    );
                }
                RegistryPolicy::LogAndContinue => {
                    warn!("Registry registration failed for {identifier}, continuing: {e}");
                }
            }
        }

        // Notify. The candidate is already stored and registered; a sink
        // failure is logged, not raised.
        let mut state = CandidateState::Registered;
        if let Some(sink) = &self.sink {
            let message = Notification::for_stored(
                &self.config,
                &candidate,
                &receipt,
                &content_hash,
                content.len(),
            );
            match sink.publish(&message).await {
                Ok(()) => state = CandidateState::Notified,
                Err(e) => warn!("Notification failed for {identifier}: {e}"),
            }
        }

        info!(
            "Successfully collected {identifier} (hash {}, {})",
            content_hash.short(),
            receipt.location
        );
        CandidateOutcome::done(identifier, state)
    }
}
