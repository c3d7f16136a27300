//! The aggregator: turns joined base/sample status maps plus per-test
//! verdicts into the two-dimensional component report.
//!
//! Row identity depends on how the request was focused: the top-level page
//! groups by component, a component page by capability, a capability page
//! adds the test, and a test page carries the full identification. Columns
//! are the variants projected onto the configured group-by keys. The
//! resulting matrix is totally ordered, so concurrent analysis order never
//! shows up in the output.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use readiness_types::{
    ColumnIdentification, ComponentReport, Identification, ReleaseStats, ReportColumn, ReportRow,
    ReportTestSummary, RequestOptions, RowIdentification, Status, TestComparison,
    TestIdentificationOptions, TestKey, TestStatus,
};

use crate::analysis;
use crate::errors::{EngineError, Result};
use crate::middleware::Middleware;
use crate::query::ComponentMapper;

#[derive(Default)]
struct ColumnBucket {
    status: Option<Status>,
    regressed: Vec<ReportTestSummary>,
}

/// Build the summary matrix. Middleware `pre_analysis` hooks run before
/// each verdict; `post_analysis` is applied by the caller outside caching.
pub fn generate_component_report(
    req: &RequestOptions,
    mapper: &dyn ComponentMapper,
    middleware: &[Arc<dyn Middleware>],
    base_status: &BTreeMap<String, TestStatus>,
    sample_status: &BTreeMap<String, TestStatus>,
    generated_at: Option<DateTime<Utc>>,
) -> Result<ComponentReport> {
    let group_by = column_group_by(req);

    let mut all_keys: BTreeSet<&String> = base_status.keys().collect();
    all_keys.extend(sample_status.keys());

    let mut all_columns: BTreeSet<ColumnIdentification> = BTreeSet::new();
    let mut buckets: BTreeMap<RowIdentification, BTreeMap<ColumnIdentification, ColumnBucket>> =
        BTreeMap::new();

    for raw_key in all_keys {
        let key = TestKey::parse(raw_key)
            .ok_or_else(|| EngineError::internal(format!("malformed test key {raw_key:?}")))?;
        let base = base_status.get(raw_key);
        let sample = sample_status.get(raw_key);
        let identity = sample.or(base).ok_or_else(|| {
            EngineError::internal(format!("test key {raw_key:?} joined with no status"))
        })?;
        let (component, capabilities) = mapper.component_and_capabilities(&key, identity);

        let column = project_variants(&key.variants, group_by);
        all_columns.insert(column.clone());

        let mut cmp = comparison_for(req, base, sample);
        for mw in middleware {
            mw.pre_analysis(&key, &mut cmp).map_err(|e| {
                EngineError::internal(format!("middleware {}: {e}", mw.name()))
            })?;
        }
        analysis::assess(&req.advanced_option, &mut cmp);
        let status = effective_status(req, cmp.status);

        let rows = rows_for_test(&req.test_id_options, &component, &capabilities, identity, &key);
        for row in rows {
            let bucket = buckets
                .entry(row)
                .or_default()
                .entry(column.clone())
                .or_default();
            bucket.status = Some(bucket.status.map_or(status, |s| s.min(status)));
            if status.is_regressed() {
                bucket.regressed.push(ReportTestSummary {
                    identification: Identification {
                        row: RowIdentification {
                            test_name: identity.test_name.clone(),
                            test_suite: identity.test_suite.clone(),
                            test_id: key.test_id.clone(),
                            ..Default::default()
                        },
                        column: ColumnIdentification {
                            variants: key.variants.clone(),
                        },
                    },
                    comparison: cmp.clone(),
                });
            }
        }
    }

    let empty_cell = effective_status(req, Status::MissingBasisAndSample);
    let rows = buckets
        .into_iter()
        .map(|(row, mut columns)| {
            let columns = all_columns
                .iter()
                .map(|column| match columns.remove(column) {
                    Some(bucket) => {
                        let mut regressed = bucket.regressed;
                        regressed.sort_by(|a, b| {
                            (a.comparison.status, &a.identification.row.test_name)
                                .cmp(&(b.comparison.status, &b.identification.row.test_name))
                        });
                        ReportColumn {
                            column: column.clone(),
                            status: bucket.status.unwrap_or(empty_cell),
                            regressed_tests: regressed,
                        }
                    }
                    None => ReportColumn {
                        column: column.clone(),
                        status: empty_cell,
                        regressed_tests: Vec::new(),
                    },
                })
                .collect();
            ReportRow { row, columns }
        })
        .collect();

    Ok(ComponentReport {
        rows,
        generated_at,
    })
}

/// The group-by keys for columns: the test page shows every variant the
/// store grouped by, other pages show the requested column grouping.
fn column_group_by(req: &RequestOptions) -> &BTreeSet<String> {
    let test_page = req
        .test_id_options
        .iter()
        .any(|opt| !opt.test_id.is_empty());
    if test_page && !req.variant_option.db_group_by.is_empty() {
        &req.variant_option.db_group_by
    } else {
        &req.variant_option.column_group_by
    }
}

pub(crate) fn project_variants(
    variants: &BTreeMap<String, String>,
    group_by: &BTreeSet<String>,
) -> ColumnIdentification {
    ColumnIdentification {
        variants: variants
            .iter()
            .filter(|(k, _)| group_by.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

fn comparison_for(
    req: &RequestOptions,
    base: Option<&TestStatus>,
    sample: Option<&TestStatus>,
) -> TestComparison {
    let flake_as_failure = req.advanced_option.flake_as_failure;
    let sample_stats = ReleaseStats {
        release: req.sample_release.release.clone(),
        start: req.sample_release.start,
        end: req.sample_release.end,
        stats: sample
            .map(|s| s.count.to_stats(flake_as_failure))
            .unwrap_or_default(),
    };
    let base_stats = base.map(|b| ReleaseStats {
        release: req.base_release.release.clone(),
        start: req.base_release.start,
        end: req.base_release.end,
        stats: b.count.to_stats(flake_as_failure),
    });
    analysis::new_comparison(
        req,
        sample_stats,
        base_stats,
        sample.and_then(|s| s.last_failure),
    )
}

fn effective_status(req: &RequestOptions, status: Status) -> Status {
    if req.advanced_option.ignore_missing
        && matches!(
            status,
            Status::MissingSample | Status::MissingBasis | Status::MissingBasisAndSample
        )
    {
        Status::NotSignificant
    } else {
        status
    }
}

/// The rows a test lands in for the requested granularity. A test with
/// several capabilities appears in one row per capability on component and
/// capability pages.
fn rows_for_test(
    opts: &[TestIdentificationOptions],
    component: &str,
    capabilities: &[String],
    identity: &TestStatus,
    key: &TestKey,
) -> Vec<RowIdentification> {
    let mut rows: BTreeSet<RowIdentification> = BTreeSet::new();
    if opts.is_empty() {
        rows.insert(RowIdentification {
            component: component.to_string(),
            ..Default::default()
        });
        return rows.into_iter().collect();
    }

    for opt in opts {
        if !opt.component.is_empty() && opt.component != component {
            continue;
        }
        if !opt.test_id.is_empty() {
            if opt.test_id != key.test_id {
                continue;
            }
            let caps: Vec<&String> = if opt.capability.is_empty() {
                capabilities.iter().collect()
            } else if capabilities.iter().any(|c| c == &opt.capability) {
                capabilities
                    .iter()
                    .filter(|c| **c == opt.capability)
                    .collect()
            } else {
                continue;
            };
            for cap in caps {
                rows.insert(test_row(component, cap, identity, key));
            }
        } else if !opt.capability.is_empty() {
            if capabilities.iter().any(|c| c == &opt.capability) {
                rows.insert(test_row(component, &opt.capability, identity, key));
            }
        } else if !opt.component.is_empty() {
            for cap in capabilities {
                rows.insert(RowIdentification {
                    component: component.to_string(),
                    capability: cap.clone(),
                    ..Default::default()
                });
            }
        } else {
            rows.insert(RowIdentification {
                component: component.to_string(),
                ..Default::default()
            });
        }
    }
    rows.into_iter().collect()
}

fn test_row(
    component: &str,
    capability: &str,
    identity: &TestStatus,
    key: &TestKey,
) -> RowIdentification {
    RowIdentification {
        component: component.to_string(),
        capability: capability.to_string(),
        test_name: identity.test_name.clone(),
        test_suite: identity.test_suite.clone(),
        test_id: key.test_id.clone(),
    }
}
