// src/validate.rs

//! Content validation support.
//!
//! Validator strategies decide what a well-formed payload looks like for
//! their feed; this module provides the recurring building blocks:
//! structural field checks, enumerated-value membership, and the price
//! decomposition arithmetic shared by every price-bearing feed.

use serde_json::Value;

/// Absolute tolerance for price component arithmetic.
///
/// Published totals are rounded to cents, so a reconstructed sum may
/// differ from the quoted total by up to one cent.
pub const PRICE_TOLERANCE: f64 = 0.01;

/// Result of validating one payload against one candidate.
///
/// A failed outcome is a normal negative result, not an error: the
/// collector records it and moves on without retrying.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    reasons: Vec<String>,
}

impl ValidationOutcome {
    /// An outcome with no recorded failures.
    pub fn pass() -> Self {
        Self::default()
    }

    /// An outcome that failed for a single reason.
    pub fn fail(reason: impl Into<String>) -> Self {
        let mut outcome = Self::default();
        outcome.reject(reason);
        outcome
    }

    /// Record a failure reason. Multiple reasons accumulate.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    pub fn is_valid(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// All reasons joined for the run summary's error list.
    pub fn summary(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Check that a total equals the sum of its components within
/// [`PRICE_TOLERANCE`].
///
/// Canonical use: LMP = MEC + MCC + MLC.
pub fn sum_matches(total: f64, components: &[f64]) -> bool {
    sum_matches_within(total, components, PRICE_TOLERANCE)
}

/// Like [`sum_matches`] but with an explicit absolute tolerance.
pub fn sum_matches_within(total: f64, components: &[f64], tolerance: f64) -> bool {
    let sum: f64 = components.iter().sum();
    (total - sum).abs() <= tolerance
}

/// Record any missing fields on the outcome.
pub fn require_fields(record: &Value, fields: &[&str], outcome: &mut ValidationOutcome) {
    for field in fields {
        if record.get(field).is_none() {
            outcome.reject(format!("missing required field: {field}"));
        }
    }
}

/// Record a failure when a string field holds a value outside the
/// allowed set.
pub fn require_member(
    record: &Value,
    field: &str,
    allowed: &[&str],
    outcome: &mut ValidationOutcome,
) {
    match record.get(field).and_then(Value::as_str) {
        Some(value) if allowed.contains(&value) => {}
        Some(value) => outcome.reject(format!(
            "field {field} has value '{value}' outside allowed set"
        )),
        None => outcome.reject(format!("field {field} is missing or not a string")),
    }
}

/// Extract a numeric field, recording a failure when absent or non-numeric.
pub fn numeric_field(record: &Value, field: &str, outcome: &mut ValidationOutcome) -> Option<f64> {
    match record.get(field).and_then(Value::as_f64) {
        Some(value) => Some(value),
        None => {
            outcome.reject(format!("field {field} is missing or not numeric"));
            None
        }
    }
}

/// Check price decomposition on a record: `total_field` must equal the
/// sum of `component_fields` within [`PRICE_TOLERANCE`].
pub fn check_decomposition(
    record: &Value,
    total_field: &str,
    component_fields: &[&str],
    outcome: &mut ValidationOutcome,
) {
    let Some(total) = numeric_field(record, total_field, outcome) else {
        return;
    };
    let mut components = Vec::with_capacity(component_fields.len());
    for field in component_fields {
        let Some(value) = numeric_field(record, field, outcome) else {
            return;
        };
        components.push(value);
    }
    if !sum_matches(total, &components) {
        let sum: f64 = components.iter().sum();
        outcome.reject(format!(
            "{total_field} arithmetic mismatch: {total_field}={total}, \
             sum({})={sum:.4}",
            component_fields.join("+")
        ));
    }
}
