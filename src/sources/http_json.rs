// src/sources/http_json.rs

//! TOML-configured HTTP JSON collection strategy.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collector::CollectionStrategy;
use crate::error::{AppError, FetchError, Result};
use crate::fetch::{build_client, HttpFetch, NotFoundPolicy, PageSettings, RetryPolicy};
use crate::models::{Candidate, RequestSpec, RunOptions, StorageSpec};
use crate::validate::{
    check_decomposition, require_fields, require_member, ValidationOutcome,
};

/// Price decomposition rule: `total_field` must equal the sum of
/// `component_fields` within the canonical tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceCheck {
    pub total_field: String,
    pub component_fields: Vec<String>,
}

/// Declarative description of one HTTP JSON feed.
///
/// `{date}` and `{date_compact}` placeholders in the URL and query
/// values are substituted per candidate (`2025-01-20` / `20250120`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed name; also the default identifier stem
    pub name: String,

    /// Endpoint URL, possibly containing date placeholders
    pub url: String,

    /// Static query parameters (values may contain placeholders)
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    /// File extension of the raw payload
    #[serde(default = "defaults::extension")]
    pub extension: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    /// Whether the endpoint paginates via `page.pageNumber`/`page.lastPage`
    #[serde(default)]
    pub paginated: bool,

    /// Whether a 404 means "no data published yet" rather than an error
    #[serde(default)]
    pub not_found_is_empty: bool,

    /// Header name carrying the API key, when the feed is key-gated
    #[serde(default)]
    pub api_key_header: Option<String>,

    /// User-Agent for requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Retry attempts for 429/5xx (1 = no retry)
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Initial retry backoff in milliseconds
    #[serde(default = "defaults::retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Fields every record must carry
    #[serde(default)]
    pub required_fields: Vec<String>,

    /// Per-field allowed value sets
    #[serde(default)]
    pub enum_fields: BTreeMap<String, Vec<String>>,

    /// Optional price decomposition rule
    #[serde(default)]
    pub price_check: Option<PriceCheck>,
}

impl FeedConfig {
    /// Load a feed description from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate feed values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("feed.name is empty"));
        }
        url::Url::parse(&self.url)
            .map_err(|e| AppError::validation(format!("feed.url is invalid: {e}")))?;
        if self.timeout_secs == 0 {
            return Err(AppError::validation("feed.timeout_secs must be > 0"));
        }
        if self.retry_attempts == 0 {
            return Err(AppError::validation("feed.retry_attempts must be > 0"));
        }
        if let Some(check) = &self.price_check {
            if check.component_fields.is_empty() {
                return Err(AppError::validation(
                    "feed.price_check.component_fields is empty",
                ));
            }
        }
        Ok(())
    }
}

fn substitute(template: &str, date: NaiveDate) -> String {
    template
        .replace("{date}", &date.format("%Y-%m-%d").to_string())
        .replace("{date_compact}", &date.format("%Y%m%d").to_string())
}

/// Generic strategy for HTTP JSON feeds described by a [`FeedConfig`].
pub struct HttpJsonSource {
    feed: FeedConfig,
    api_key: Option<String>,
    fetch: HttpFetch,
}

impl HttpJsonSource {
    pub fn new(feed: FeedConfig, api_key: Option<String>) -> Result<Self> {
        feed.validate()?;
        if feed.api_key_header.is_some() && api_key.is_none() {
            return Err(AppError::config(format!(
                "feed '{}' requires an API key ({})",
                feed.name,
                feed.api_key_header.as_deref().unwrap_or_default()
            )));
        }

        let client = build_client(&feed.user_agent)?;
        let not_found = if feed.not_found_is_empty {
            NotFoundPolicy::EmptyPayload(br#"{"data": []}"#.to_vec())
        } else {
            NotFoundPolicy::Fatal
        };
        let retry = RetryPolicy {
            max_attempts: feed.retry_attempts,
            initial_backoff: Duration::from_millis(feed.retry_backoff_ms),
        };

        Ok(Self {
            feed,
            api_key,
            fetch: HttpFetch::new(client, retry, not_found),
        })
    }

    pub fn feed(&self) -> &FeedConfig {
        &self.feed
    }

    fn candidate_for_date(
        &self,
        date: NaiveDate,
        identifier: String,
        options: &RunOptions,
    ) -> Candidate {
        let mut request = RequestSpec::new(substitute(&self.feed.url, date), self.feed.timeout_secs);
        for (key, value) in &self.feed.query {
            request.query.insert(key.clone(), substitute(value, date));
        }
        // Run-level filters land directly on the query string.
        for (key, value) in &options.filters {
            request.query.insert(key.clone(), value.clone());
        }
        request.headers.insert("Accept".into(), "application/json".into());
        if let (Some(header), Some(key)) = (&self.feed.api_key_header, &self.api_key) {
            request.headers.insert(header.clone(), key.clone());
        }

        Candidate::new(
            identifier,
            request,
            StorageSpec {
                dgroup: self.feed.name.clone(),
                file_date: date,
                extension: self.feed.extension.clone(),
            },
        )
        .with_metadata("data_type", self.feed.name.as_str())
        .with_metadata("source", "miso")
        .with_metadata("date", date.format("%Y-%m-%d").to_string())
    }

    fn validate_record(&self, record: &Value, outcome: &mut ValidationOutcome) {
        let required: Vec<&str> = self.feed.required_fields.iter().map(String::as_str).collect();
        require_fields(record, &required, outcome);

        for (field, allowed) in &self.feed.enum_fields {
            let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
            require_member(record, field, &allowed, outcome);
        }

        if let Some(check) = &self.feed.price_check {
            let components: Vec<&str> =
                check.component_fields.iter().map(String::as_str).collect();
            check_decomposition(record, &check.total_field, &components, outcome);
        }
    }
}

#[async_trait]
impl CollectionStrategy for HttpJsonSource {
    fn generate_candidates(&self, options: &RunOptions) -> Result<Vec<Candidate>> {
        let dates = options.dates();
        if dates.is_empty() {
            // Snapshot source: one candidate for the current instant.
            let now = Utc::now();
            let identifier = format!(
                "{}_{}.{}",
                self.feed.name,
                now.format("%Y%m%d_%H%M"),
                self.feed.extension
            );
            return Ok(vec![self.candidate_for_date(
                now.date_naive(),
                identifier,
                options,
            )]);
        }

        Ok(dates
            .into_iter()
            .map(|date| {
                let identifier = format!(
                    "{}_{}.{}",
                    self.feed.name,
                    date.format("%Y%m%d"),
                    self.feed.extension
                );
                self.candidate_for_date(date, identifier, options)
            })
            .collect())
    }

    async fn fetch(&self, candidate: &Candidate) -> std::result::Result<Vec<u8>, FetchError> {
        if self.feed.paginated {
            self.fetch
                .get_json_paginated(&candidate.request, &PageSettings::default())
                .await
        } else {
            self.fetch.get_bytes(&candidate.request).await
        }
    }

    fn validate(&self, content: &[u8], _candidate: &Candidate) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::pass();

        // Structural parse fails closed.
        let body: Value = match serde_json::from_slice(content) {
            Ok(body) => body,
            Err(e) => return ValidationOutcome::fail(format!("malformed JSON: {e}")),
        };

        let Some(records) = body.get("data").and_then(Value::as_array) else {
            return ValidationOutcome::fail("missing 'data' field");
        };

        // An empty data array is valid: no data published for the date.
        if let Some(first) = records.first() {
            self.validate_record(first, &mut outcome);
        }
        outcome
    }
}

mod defaults {
    pub fn extension() -> String {
        "json".into()
    }
    pub fn timeout_secs() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        "gridsource/0.1".into()
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_backoff_ms() -> u64 {
        500
    }
}
