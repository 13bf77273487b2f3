// src/models/candidate.rs

//! Candidate model: one planned unit of fetch-validate-store work.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A scalar metadata value attached to a candidate.
///
/// Metadata rides along to the stored object record and the notification
/// payload; the collector never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// How to reach the upstream endpoint for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Target URL (query parameters kept separate)
    pub url: String,

    /// Query parameters, appended to the URL at request time
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    /// Request headers, e.g. the API-key header
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl RequestSpec {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            url: url.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            timeout_secs,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Where a candidate's payload lands in the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSpec {
    /// Logical dataset group, e.g. `miso_da_exante_lmp`
    pub dgroup: String,

    /// Date used for partitioning the object key
    pub file_date: NaiveDate,

    /// File extension before compression, e.g. `json` or `csv`
    pub extension: String,
}

/// One planned unit of collection work.
///
/// Created fresh per run by the strategy's candidate generation step,
/// immutable, consumed exactly once by the pipeline. Only its result is
/// persisted, never the candidate itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique within a run; derived deterministically from the request
    /// parameters so re-running the same inputs yields the same name
    pub identifier: String,

    /// How to fetch the payload
    pub request: RequestSpec,

    /// Where to store it
    pub storage: StorageSpec,

    /// Free-form scalar metadata, passed through untouched
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Candidate {
    pub fn new(identifier: impl Into<String>, request: RequestSpec, storage: StorageSpec) -> Self {
        Self {
            identifier: identifier.into(),
            request,
            storage,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Uniform resource name used in notifications: the identifier
    /// without any compression suffix.
    pub fn urn(&self) -> &str {
        self.identifier
            .strip_suffix(".gz")
            .unwrap_or(&self.identifier)
    }
}
