// src/fetch/mod.rs

//! HTTP plumbing for fetcher strategies.
//!
//! Strategies own the policy decisions (what to request, how to treat a
//! 404, how hard to retry); this module supplies the mechanics: a
//! configured client, bounded exponential backoff for 429/5xx, and
//! `page.pageNumber`/`page.lastPage`-style pagination that merges all
//! pages into one logical payload.

use std::time::Duration;

use log::{debug, warn};
use serde_json::{json, Value};

use crate::error::{FetchError, Result};
use crate::models::RequestSpec;

/// Create a configured HTTP client.
///
/// Timeouts are applied per request from each candidate's
/// [`RequestSpec`], not at the client level.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder().user_agent(user_agent).build()?;
    Ok(client)
}

/// Retry schedule for transient upstream failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each retry
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// No retries: every failure is final.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Whether the error is worth retrying (rate limiting or an
    /// upstream server error).
    pub fn retryable(&self, error: &FetchError) -> bool {
        matches!(error.status(), Some(429) | Some(500..=599))
    }

    /// Backoff before the given retry (1-based retry index).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

/// Source-specific policy for HTTP 404.
///
/// Some feeds publish late or not at all for a given date; for those, a
/// 404 means "no data yet" and yields the configured empty payload.
/// Other feeds treat missing data as fatal.
#[derive(Debug, Clone)]
pub enum NotFoundPolicy {
    /// 404 fails the candidate
    Fatal,
    /// 404 yields this payload (a valid empty structure for the feed)
    EmptyPayload(Vec<u8>),
}

/// Pagination field names for JSON APIs.
#[derive(Debug, Clone)]
pub struct PageSettings {
    /// Query parameter carrying the page number
    pub page_param: String,
    /// Field holding the page's records
    pub data_field: String,
    /// Field holding the pagination envelope
    pub page_field: String,
    /// Envelope field flagging the final page
    pub last_page_field: String,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            page_param: "pageNumber".into(),
            data_field: "data".into(),
            page_field: "page".into(),
            last_page_field: "lastPage".into(),
        }
    }
}

/// HTTP fetch helper parameterized by retry and 404 policy.
pub struct HttpFetch {
    client: reqwest::Client,
    retry: RetryPolicy,
    not_found: NotFoundPolicy,
}

impl HttpFetch {
    pub fn new(client: reqwest::Client, retry: RetryPolicy, not_found: NotFoundPolicy) -> Self {
        Self {
            client,
            retry,
            not_found,
        }
    }

    /// Fetch a payload as raw bytes, applying the retry and 404
    /// policies.
    pub async fn get_bytes(&self, spec: &RequestSpec) -> std::result::Result<Vec<u8>, FetchError> {
        match self.get_with_retry(spec, None).await {
            Ok(bytes) => Ok(bytes),
            Err(FetchError::HttpStatus { status: 404, .. }) => match &self.not_found {
                NotFoundPolicy::EmptyPayload(payload) => {
                    warn!("No data available at {} (404)", spec.url);
                    Ok(payload.clone())
                }
                NotFoundPolicy::Fatal => Err(FetchError::HttpStatus {
                    status: 404,
                    url: spec.url.clone(),
                }),
            },
            Err(err) => Err(err),
        }
    }

    /// Fetch a paginated JSON endpoint, merging every page's records
    /// into one logical payload:
    ///
    /// ```text
    /// {"data": [...], "total_records": N, "total_pages": P}
    /// ```
    pub async fn get_json_paginated(
        &self,
        spec: &RequestSpec,
        paging: &PageSettings,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let mut all_records = Vec::new();
        let mut page_number: u64 = 1;

        loop {
            let page_query = (paging.page_param.as_str(), page_number.to_string());
            let bytes = match self.get_with_retry(spec, Some(&page_query)).await {
                Ok(bytes) => bytes,
                Err(FetchError::HttpStatus { status: 404, .. })
                    if matches!(self.not_found, NotFoundPolicy::EmptyPayload(_)) =>
                {
                    // No data published for this request; keep whatever
                    // pages arrived before the 404.
                    warn!("No data available at {} (404)", spec.url);
                    break;
                }
                Err(err) => return Err(err),
            };

            let body: Value = serde_json::from_slice(&bytes).map_err(|e| FetchError::Network {
                url: spec.url.clone(),
                message: format!("invalid JSON on page {page_number}: {e}"),
            })?;

            if let Some(records) = body.get(&paging.data_field).and_then(Value::as_array) {
                debug!("Page {page_number}: {} records", records.len());
                all_records.extend(records.iter().cloned());
            }

            let last_page = body
                .get(&paging.page_field)
                .and_then(|p| p.get(&paging.last_page_field))
                .and_then(Value::as_bool)
                // Missing pagination metadata means a single-page feed.
                .unwrap_or(true);

            if last_page {
                break;
            }
            page_number += 1;
        }

        let combined = json!({
            "data": all_records,
            "total_records": all_records.len(),
            "total_pages": page_number,
        });
        serde_json::to_vec_pretty(&combined).map_err(|e| FetchError::Network {
            url: spec.url.clone(),
            message: format!("failed to serialize merged payload: {e}"),
        })
    }

    /// One logical GET with bounded retries on 429/5xx.
    async fn get_with_retry(
        &self,
        spec: &RequestSpec,
        extra_query: Option<&(&str, String)>,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let mut attempt: u32 = 1;
        loop {
            match self.get_once(spec, extra_query).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if attempt < self.retry.max_attempts && self.retry.retryable(&err) => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        "Attempt {attempt}/{} failed for {}: {err}; retrying in {backoff:?}",
                        self.retry.max_attempts, spec.url
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_once(
        &self,
        spec: &RequestSpec,
        extra_query: Option<&(&str, String)>,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let mut request = self
            .client
            .get(&spec.url)
            .timeout(Duration::from_secs(spec.timeout_secs));

        for (key, value) in &spec.query {
            request = request.query(&[(key.as_str(), value.as_str())]);
        }
        if let Some((key, value)) = extra_query {
            request = request.query(&[(*key, value.as_str())]);
        }
        for (key, value) in &spec.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&spec.url, spec.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: spec.url.clone(),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::from_reqwest(&spec.url, spec.timeout_secs, e))
    }
}
