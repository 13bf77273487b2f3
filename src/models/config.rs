// src/models/config.rs

//! Collector configuration structures.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Deployment environment, used to namespace the dedupe registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "staging" => Ok(Self::Staging),
            "prod" => Ok(Self::Prod),
            other => Err(AppError::config(format!(
                "invalid environment '{other}': must be one of dev, staging, prod"
            ))),
        }
    }
}

/// How dedupe registry failures are handled.
///
/// Dedupe is a stated invariant, so the default fails the candidate
/// rather than silently storing a possible duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryPolicy {
    /// A registry error fails the candidate
    #[default]
    FailFast,
    /// A registry error is logged and the candidate proceeds without
    /// the dedupe guarantee
    LogAndContinue,
}

/// Object key partitioning scheme for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionScheme {
    /// `{dgroup}/year=YYYY/month=MM/day=DD/` (the dominant convention)
    #[default]
    HiveDate,
    /// `{dgroup}/YYYY-MM-DD/`
    FlatDate,
    /// No date directory; the identifier carries the timestamp
    Flat,
}

/// Per-collector configuration, constructed once at process start and
/// passed into the collector. The core never reads ambient environment
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Dataset group identifier, e.g. `miso_fuel_mix`
    pub dgroup: String,

    /// Deployment environment
    pub environment: Environment,

    /// Key prefix inside the object store
    #[serde(default = "defaults::store_prefix")]
    pub store_prefix: String,

    /// Object key partitioning scheme
    #[serde(default)]
    pub partition: PartitionScheme,

    /// Dedupe registry TTL in days (365 canonical; some feeds use 7)
    #[serde(default = "defaults::hash_ttl_days")]
    pub hash_ttl_days: u32,

    /// Registry failure handling
    #[serde(default)]
    pub registry_policy: RegistryPolicy,

    /// Candidates processed concurrently; 1 = strictly sequential
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl CollectorConfig {
    pub fn new(dgroup: impl Into<String>, environment: Environment) -> Self {
        Self {
            dgroup: dgroup.into(),
            environment,
            store_prefix: defaults::store_prefix(),
            partition: PartitionScheme::default(),
            hash_ttl_days: defaults::hash_ttl_days(),
            registry_policy: RegistryPolicy::default(),
            max_concurrent: defaults::max_concurrent(),
        }
    }

    /// Dedupe registry namespace: `{environment}:{dgroup}`.
    pub fn namespace(&self) -> String {
        format!("{}:{}", self.environment, self.dgroup)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.dgroup.trim().is_empty() {
            return Err(AppError::validation("dgroup is empty"));
        }
        if self.dgroup.contains('/') || self.dgroup.contains(':') {
            return Err(AppError::validation(
                "dgroup must not contain '/' or ':' (used as key separators)",
            ));
        }
        if self.hash_ttl_days == 0 {
            return Err(AppError::validation("hash_ttl_days must be > 0"));
        }
        if self.max_concurrent == 0 {
            return Err(AppError::validation("max_concurrent must be > 0"));
        }
        Ok(())
    }
}

/// Per-run options, supplied by the caller (CLI or scheduler).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// First date to collect, inclusive. None for snapshot sources.
    pub start_date: Option<NaiveDate>,

    /// Last date to collect, inclusive. Defaults to `start_date`.
    pub end_date: Option<NaiveDate>,

    /// Per-dataset filters, passed through to candidate generation
    pub filters: BTreeMap<String, String>,

    /// Store even when the content hash is already registered
    pub force: bool,

    /// Skip the registry query entirely
    pub skip_hash_check: bool,

    /// Override the configured registry TTL for this run
    pub ttl_days: Option<u32>,
}

impl RunOptions {
    /// Collect a single date.
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            start_date: Some(date),
            end_date: Some(date),
            ..Self::default()
        }
    }

    /// Collect an inclusive date range.
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Self::default()
        }
    }

    /// The inclusive calendar days covered by this run, oldest first.
    /// Empty for snapshot-style runs with no dates.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let Some(start) = self.start_date else {
            return Vec::new();
        };
        let end = self.end_date.unwrap_or(start);
        let mut dates = Vec::new();
        let mut current = start;
        while current <= end {
            dates.push(current);
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        dates
    }

    /// Validate date ordering.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(AppError::validation(format!(
                    "end_date {end} is before start_date {start}"
                )));
            }
        }
        if self.ttl_days == Some(0) {
            return Err(AppError::validation("ttl_days override must be > 0"));
        }
        Ok(())
    }
}

mod defaults {
    pub fn store_prefix() -> String {
        "sourcing".into()
    }
    pub fn hash_ttl_days() -> u32 {
        365
    }
    pub fn max_concurrent() -> usize {
        1
    }
}
