//! Request options: everything that shapes a report, plus server-side
//! views with relative time windows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A release and the concrete time window to query for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOptions {
    pub release: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl ReleaseOptions {
    pub fn new(release: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            start: None,
            end: None,
        }
    }
}

/// Release options carrying relative time expressions in place of a fixed
/// window. Views use these; the view resolver translates them into
/// concrete `ReleaseOptions` and writes the resolved window back so the
/// response can show the dates that were actually used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeReleaseOptions {
    #[serde(flatten)]
    pub release: ReleaseOptions,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relative_start: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relative_end: String,
}

/// Variant handling: which variant keys form columns, which are fetched
/// from the store, and include/compare/cross-compare filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOptions {
    #[serde(default)]
    pub column_group_by: BTreeSet<String>,
    #[serde(default)]
    pub db_group_by: BTreeSet<String>,
    #[serde(default)]
    pub include_variants: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub compare_variants: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variant_cross_compare: Vec<String>,
}

/// Statistical knobs for the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedOptions {
    pub confidence: u32,
    pub pity_factor: u32,
    pub minimum_failure: u32,
    pub pass_rate_required_new_tests: u32,
    pub pass_rate_required_all_tests: u32,
    pub ignore_missing: bool,
    pub ignore_disruption: bool,
    pub flake_as_failure: bool,
    pub include_multi_release_analysis: bool,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            confidence: 95,
            pity_factor: 5,
            minimum_failure: 3,
            pass_rate_required_new_tests: 0,
            pass_rate_required_all_tests: 0,
            ignore_missing: false,
            ignore_disruption: false,
            flake_as_failure: false,
            include_multi_release_analysis: false,
        }
    }
}

/// Cache behavior for one request. `crtime_rounding_factor` is in seconds;
/// requests landing in the same rounded bucket share a cache key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub force_refresh: bool,
    pub crtime_rounding_factor: u64,
}

/// Focuses a report on a specific test, typically for the drill-down view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestIdentificationOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub component: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub capability: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub test_id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub requested_variants: BTreeMap<String, String>,
    /// Set when a fallback release with a better pass rate was promoted to
    /// the basis; the details report then analyzes against this release too.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub base_override_release: String,
}

/// All options for one component readiness request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub base_release: ReleaseOptions,
    pub sample_release: ReleaseOptions,
    pub variant_option: VariantOptions,
    pub advanced_option: AdvancedOptions,
    pub cache_option: CacheOptions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_id_options: Vec<TestIdentificationOptions>,
}

/// A predefined server-side view over the readiness data: relative windows
/// plus the variant and advanced options a request would otherwise carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub base_release: RelativeReleaseOptions,
    pub sample_release: RelativeReleaseOptions,
    #[serde(default)]
    pub variant_options: VariantOptions,
    #[serde(default)]
    pub advanced_options: AdvancedOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_id_options: Vec<TestIdentificationOptions>,
}
