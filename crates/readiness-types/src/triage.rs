//! Side-database records: tracked regressions and triage claims. These are
//! optional annotations; when the side database is unavailable the engine
//! simply runs without them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A regression the tracker has already opened for a test. Surfaced on
/// verdicts so callers can see when the regression was first detected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestRegression {
    #[serde(default)]
    pub view: String,
    pub release: String,
    pub test_id: String,
    #[serde(default)]
    pub test_name: String,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
    pub opened: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<DateTime<Utc>>,
}

impl TestRegression {
    /// Whether this record covers the given test and variant combination.
    /// Variants recorded on the regression must all match; keys the record
    /// does not mention are unconstrained.
    pub fn matches(&self, test_id: &str, variants: &BTreeMap<String, String>) -> bool {
        self.test_id == test_id
            && self
                .variants
                .iter()
                .all(|(k, v)| variants.get(k).map(|have| have == v).unwrap_or(false))
    }
}

/// One failure a triage record claims responsibility for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriagedFailure {
    pub test_id: String,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
}

/// An externally filed claim that a set of failures is explained. The
/// interval of matched failures may suppress the regression label; it never
/// changes the statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Triage {
    pub id: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    /// Set once someone claims the underlying problem is fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<DateTime<Utc>>,
    #[serde(default)]
    pub matched_failures: Vec<TriagedFailure>,
}

impl Triage {
    /// Failures this triage covers for a test within the given window.
    pub fn covered_failures(
        &self,
        test_id: &str,
        variants: &BTreeMap<String, String>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> u32 {
        self.matched_failures
            .iter()
            .filter(|f| {
                f.test_id == test_id
                    && f.variants
                        .iter()
                        .all(|(k, v)| variants.get(k).map(|have| have == v).unwrap_or(false))
                    && start.map(|s| f.started_at >= s).unwrap_or(true)
                    && end.map(|e| f.started_at <= e).unwrap_or(true)
            })
            .count() as u32
    }
}
