//! Report shapes: the internal per-test status rows handed over by the
//! query layer, the per-test comparison verdict, and the two API report
//! forms (summary matrix and per-test drill-down).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::{ColumnIdentification, Identification, RowIdentification};
use crate::stats::{Count, Stats};
use crate::status::{Comparison, Status};
use crate::triage::TestRegression;

/// One test's outcome counts in a window, as handed over by the store.
/// Component and capabilities stay empty until the mapping step fills them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestStatus {
    pub test_name: String,
    #[serde(default)]
    pub test_suite: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(flatten)]
    pub count: Count,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
}

/// All variants supported by the system, keyed by variant name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobVariants {
    pub variants: BTreeMap<String, Vec<String>>,
}

/// Stats for one side of a comparison, tagged with the release and window
/// they came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseStats {
    pub release: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub stats: Stats,
}

/// The verdict for a single (test × variants): status, the comparison mode
/// that produced it, and human-readable explanations.
///
/// The adjustment fields are working state for the middleware chain and do
/// not serialize; a cached report round-trips without them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestComparison {
    pub status: Status,
    pub comparison: Comparison,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub explanations: Vec<String>,
    pub sample_stats: ReleaseStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_stats: Option<ReleaseStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fisher_exact: Option<f64>,
    #[serde(skip)]
    pub required_confidence: u32,
    #[serde(skip)]
    pub pity_adjustment: f64,
    #[serde(skip)]
    pub required_pass_rate_adjustment: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
    /// When the regression tracker has already seen this regression, the
    /// record of when it was first detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regression: Option<TestRegression>,
}

/// A regressed test surfaced in a report column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTestSummary {
    #[serde(flatten)]
    pub identification: Identification,
    #[serde(flatten)]
    pub comparison: TestComparison,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportColumn {
    #[serde(flatten)]
    pub column: ColumnIdentification,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regressed_tests: Vec<ReportTestSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(flatten)]
    pub row: RowIdentification,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ReportColumn>,
}

/// The summary matrix: rows of components/capabilities/tests, columns of
/// variant combinations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<ReportRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

/// A raw per-job-run row from the analytical store for the details path.
/// The counts are 0 or 1 per run today, but nothing here assumes that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestJobRunRow {
    pub test_id: String,
    #[serde(default)]
    pub test_name: String,
    pub prowjob_name: String,
    pub prowjob_run_id: String,
    #[serde(default)]
    pub prowjob_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prowjob_start: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub count: Count,
    #[serde(default)]
    pub jira_component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_component_id: Option<i64>,
}

/// Per-job-run rows for a details report, keyed by prow job name, split by
/// side. The override side is populated when a fallback release was
/// promoted as the basis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRunStatuses {
    pub base_status: BTreeMap<String, Vec<TestJobRunRow>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub base_override_status: BTreeMap<String, Vec<TestJobRunRow>>,
    pub sample_status: BTreeMap<String, Vec<TestJobRunRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

/// Stats from one job run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRunStats {
    pub job_url: String,
    pub job_run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub test_stats: Stats,
}

/// Base vs sample decomposition for one job. One of the job names may be
/// absent when jobs change between releases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_job_name: Option<String>,
    pub sample_stats: Stats,
    pub base_stats: Stats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_job_run_stats: Vec<JobRunStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base_job_run_stats: Vec<JobRunStats>,
    pub significant: bool,
}

/// One analysis run for a details report; the first in a report's list is
/// the authoritative one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestDetailsAnalysis {
    #[serde(flatten)]
    pub comparison: TestComparison,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub job_stats: Vec<JobStats>,
}

/// Drill-down report for a single (test × requested variants).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestDetailsReport {
    #[serde(flatten)]
    pub identification: Identification,
    #[serde(default)]
    pub jira_component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_component_id: Option<i64>,
    pub test_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    pub analyses: Vec<TestDetailsAnalysis>,
}
