// src/models/summary.rs

//! Run summary: the aggregate report returned by a collection run.

use serde::Serialize;

/// One recorded per-candidate failure.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateError {
    /// Candidate identifier, or `"generation"` when candidate
    /// generation itself failed
    pub candidate: String,
    pub error: String,
}

/// Aggregate counters for one collection run.
///
/// Created at run start, mutated by the orchestration loop, returned at
/// run end. This is the run's report only; it is never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Number of candidates the generator produced
    pub total_candidates: usize,

    /// Candidates stored (and registered) this run
    pub collected: usize,

    /// Candidates skipped because their content hash was already known
    pub skipped_duplicate: usize,

    /// Candidates that failed fetch, validation, storage, or registry
    pub failed: usize,

    /// Ordered per-candidate error descriptions
    pub errors: Vec<CandidateError>,
}

impl RunSummary {
    pub fn new(total_candidates: usize) -> Self {
        Self {
            total_candidates,
            ..Self::default()
        }
    }

    pub fn record_collected(&mut self) {
        self.collected += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.skipped_duplicate += 1;
    }

    pub fn record_failure(&mut self, candidate: impl Into<String>, error: impl Into<String>) {
        self.failed += 1;
        self.errors.push(CandidateError {
            candidate: candidate.into(),
            error: error.into(),
        });
    }

    /// Whether the run should be reported as unsuccessful (CLI exit
    /// status convention).
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
