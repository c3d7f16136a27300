//! The test-details builder: for a single (test × requested variants),
//! decompose base vs sample into per-job and per-job-run detail, reusing
//! the same statistical kernel as the summary matrix.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use readiness_types::{
    ColumnIdentification, Identification, JobRunStats, JobRunStatuses, JobStats, ReleaseStats,
    RequestOptions, RowIdentification, Stats, TestComparison, TestDetailsAnalysis,
    TestDetailsReport, TestIdentificationOptions, TestJobRunRow, TestKey,
};

use crate::analysis;
use crate::errors::{EngineError, Result};
use crate::middleware::Middleware;
use crate::normalize::normalize_job_name;

/// One side of a job's rows after normalization: the raw job name seen
/// first, the summed counts, and the preserved per-run rows.
#[derive(Default)]
struct JobSide {
    raw_name: Option<String>,
    stats: Stats,
    runs: Vec<JobRunStats>,
}

/// Build the drill-down report for one test identification. `statuses`
/// holds the raw per-run rows from the store; middleware
/// `pre_test_details_analysis` hooks may prune them first, and the caller
/// applies `post_analysis` afterwards.
pub fn generate_test_details_report(
    req: &RequestOptions,
    middleware: &[Arc<dyn Middleware>],
    test: &TestIdentificationOptions,
    mut statuses: JobRunStatuses,
    generated_at: Option<DateTime<Utc>>,
) -> Result<TestDetailsReport> {
    let key = TestKey::new(test.test_id.clone(), test.requested_variants.clone());
    for mw in middleware {
        mw.pre_test_details_analysis(&key, &mut statuses)
            .map_err(|e| EngineError::internal(format!("middleware {}: {e}", mw.name())))?;
    }

    let mut analyses = Vec::new();
    // A promoted fallback basis gets its own analysis, listed first so
    // callers treat it as authoritative.
    if !statuses.base_override_status.is_empty() {
        analyses.push(analyze(
            req,
            &test.base_override_release,
            &statuses.base_override_status,
            &statuses.sample_status,
        ));
    }
    analyses.push(analyze(
        req,
        &req.base_release.release,
        &statuses.base_status,
        &statuses.sample_status,
    ));

    let (test_name, jira_component, jira_component_id) = sample_identity(&statuses);

    Ok(TestDetailsReport {
        identification: Identification {
            row: RowIdentification {
                component: test.component.clone(),
                capability: test.capability.clone(),
                test_id: test.test_id.clone(),
                ..Default::default()
            },
            column: ColumnIdentification {
                variants: test.requested_variants.clone(),
            },
        },
        jira_component,
        jira_component_id,
        test_name,
        generated_at,
        analyses,
    })
}

fn analyze(
    req: &RequestOptions,
    base_release: &str,
    base_rows: &BTreeMap<String, Vec<TestJobRunRow>>,
    sample_rows: &BTreeMap<String, Vec<TestJobRunRow>>,
) -> TestDetailsAnalysis {
    let flake_as_failure = req.advanced_option.flake_as_failure;
    let base_release_token = &req.base_release.release;
    let sample_release_token = &req.sample_release.release;

    let base_jobs = group_by_normalized(
        base_rows,
        base_release_token,
        sample_release_token,
        flake_as_failure,
    );
    let sample_jobs = group_by_normalized(
        sample_rows,
        base_release_token,
        sample_release_token,
        flake_as_failure,
    );

    let mut base_total = Stats::new(0, 0, 0, flake_as_failure);
    for side in base_jobs.values() {
        base_total = base_total.add(&side.stats, flake_as_failure);
    }
    let mut sample_total = Stats::new(0, 0, 0, flake_as_failure);
    for side in sample_jobs.values() {
        sample_total = sample_total.add(&side.stats, flake_as_failure);
    }
    let mut last_failure = None;
    for rows in sample_rows.values() {
        for row in rows {
            if row.count.failures() > 0 {
                last_failure = last_failure.max(row.prowjob_start);
            }
        }
    }

    let mut cmp = analysis::new_comparison(
        req,
        ReleaseStats {
            release: req.sample_release.release.clone(),
            start: req.sample_release.start,
            end: req.sample_release.end,
            stats: sample_total,
        },
        Some(ReleaseStats {
            release: base_release.to_string(),
            start: req.base_release.start,
            end: req.base_release.end,
            stats: base_total,
        }),
        last_failure,
    );
    analysis::assess(&req.advanced_option, &mut cmp);

    let job_stats = build_job_stats(req, base_jobs, sample_jobs, &mut cmp);
    TestDetailsAnalysis {
        comparison: cmp,
        job_stats,
    }
}

fn build_job_stats(
    req: &RequestOptions,
    base_jobs: BTreeMap<String, JobSide>,
    sample_jobs: BTreeMap<String, JobSide>,
    cmp: &mut TestComparison,
) -> Vec<JobStats> {
    let mut names: Vec<&String> = base_jobs.keys().collect();
    for name in sample_jobs.keys() {
        if !base_jobs.contains_key(name) {
            names.push(name);
        }
    }
    names.sort();

    let mut out = Vec::new();
    for name in names {
        let base = base_jobs.get(name);
        let sample = sample_jobs.get(name);
        let base_stats = base.map(|s| s.stats).unwrap_or_default();
        let sample_stats = sample.map(|s| s.stats).unwrap_or_default();

        let significant = match (base, sample) {
            (Some(base), Some(sample)) => {
                analysis::job_regressed(req, &sample.stats, &base.stats)
            }
            _ => false,
        };

        let sample_job_name = sample.and_then(|s| s.raw_name.clone());
        // The base name is only interesting when it differs from the
        // sample's, i.e. jobs renamed between releases or one side missing.
        let base_job_name = base
            .and_then(|b| b.raw_name.clone())
            .filter(|raw| sample_job_name.as_deref() != Some(raw.as_str()));
        match (sample, base) {
            (Some(_), None) => cmp
                .explanations
                .push(format!("No base job runs matched sample job {name}.")),
            (None, Some(_)) => cmp
                .explanations
                .push(format!("No sample job runs matched base job {name}.")),
            _ => {}
        }

        out.push(JobStats {
            sample_job_name,
            base_job_name,
            sample_stats,
            base_stats,
            sample_job_run_stats: sample.map(|s| s.runs.clone()).unwrap_or_default(),
            base_job_run_stats: base.map(|b| b.runs.clone()).unwrap_or_default(),
            significant,
        });
    }
    out
}

fn group_by_normalized(
    rows: &BTreeMap<String, Vec<TestJobRunRow>>,
    base_release: &str,
    sample_release: &str,
    flake_as_failure: bool,
) -> BTreeMap<String, JobSide> {
    let mut jobs: BTreeMap<String, JobSide> = BTreeMap::new();
    for (job_name, job_rows) in rows {
        let normalized = normalize_job_name(job_name, base_release, sample_release);
        let side = jobs.entry(normalized).or_default();
        if side.raw_name.is_none() {
            side.raw_name = Some(job_name.clone());
        }
        for row in job_rows {
            side.stats = side.stats.add_count(&row.count, flake_as_failure);
            side.runs.push(JobRunStats {
                job_url: row.prowjob_url.clone(),
                job_run_id: row.prowjob_run_id.clone(),
                start_time: row.prowjob_start,
                test_stats: row.count.to_stats(flake_as_failure),
            });
        }
    }
    for side in jobs.values_mut() {
        side.runs
            .sort_by(|a, b| (a.start_time, &a.job_run_id).cmp(&(b.start_time, &b.job_run_id)));
    }
    jobs
}

fn sample_identity(statuses: &JobRunStatuses) -> (String, String, Option<i64>) {
    for rows in statuses.sample_status.values() {
        if let Some(row) = rows.first() {
            return (
                row.test_name.clone(),
                row.jira_component.clone(),
                row.jira_component_id,
            );
        }
    }
    for rows in statuses.base_status.values() {
        if let Some(row) = rows.first() {
            return (
                row.test_name.clone(),
                row.jira_component.clone(),
                row.jira_component_id,
            );
        }
    }
    (String::new(), String::new(), None)
}
