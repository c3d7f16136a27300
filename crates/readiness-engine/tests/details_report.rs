//! Drill-down report generation from raw per-job-run rows.

use std::collections::BTreeMap;

use readiness_engine::details::generate_test_details_report;
use readiness_types::{
    AdvancedOptions, Count, JobRunStatuses, ReleaseOptions, RequestOptions, Status,
    TestIdentificationOptions, TestJobRunRow, VariantOptions,
};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6 || ((a - b) / b).abs() < 1e-4
}

fn request() -> RequestOptions {
    RequestOptions {
        base_release: ReleaseOptions::new("4.16"),
        sample_release: ReleaseOptions::new("4.17"),
        variant_option: VariantOptions::default(),
        advanced_option: AdvancedOptions {
            confidence: 95,
            pity_factor: 5,
            minimum_failure: 3,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn test_options() -> TestIdentificationOptions {
    let mut requested_variants = BTreeMap::new();
    requested_variants.insert("Platform".to_string(), "aws".to_string());
    requested_variants.insert("Architecture".to_string(), "amd64".to_string());
    requested_variants.insert("Network".to_string(), "ovn".to_string());
    TestIdentificationOptions {
        component: "component 1".to_string(),
        capability: "cap11".to_string(),
        test_id: "1".to_string(),
        requested_variants,
        ..Default::default()
    }
}

/// Expand (successes, failures, flakes) into one row per run, the shape
/// the store returns.
fn job_rows(job: &str, success: u32, failure: u32, flake: u32) -> Vec<TestJobRunRow> {
    let mut rows = Vec::new();
    let mut run = 0u32;
    let mut push = |count: Count, rows: &mut Vec<TestJobRunRow>| {
        run += 1;
        rows.push(TestJobRunRow {
            test_id: "1".to_string(),
            test_name: "test 1".to_string(),
            prowjob_name: job.to_string(),
            prowjob_run_id: format!("{job}-{run}"),
            jira_component: "component 1".to_string(),
            count,
            ..Default::default()
        });
    };
    for _ in 0..success {
        push(Count::new(1, 1, 0), &mut rows);
    }
    for _ in 0..failure {
        push(Count::new(1, 0, 0), &mut rows);
    }
    for _ in 0..flake {
        push(Count::new(1, 0, 1), &mut rows);
    }
    rows
}

fn statuses(
    base: Vec<(&str, u32, u32, u32)>,
    sample: Vec<(&str, u32, u32, u32)>,
) -> JobRunStatuses {
    let mut out = JobRunStatuses::default();
    for (job, s, f, fl) in base {
        out.base_status
            .insert(job.to_string(), job_rows(job, s, f, fl));
    }
    for (job, s, f, fl) in sample {
        out.sample_status
            .insert(job.to_string(), job_rows(job, s, f, fl));
    }
    out
}

#[test]
fn one_job_high_pass_rate_on_both_sides() {
    let report = generate_test_details_report(
        &request(),
        &[],
        &test_options(),
        statuses(
            vec![("ProwJob1", 1000, 100, 50)],
            vec![("ProwJob1", 100, 9, 4)],
        ),
        None,
    )
    .unwrap();

    assert_eq!(report.identification.row.component, "component 1");
    assert_eq!(report.identification.row.capability, "cap11");
    assert_eq!(report.identification.row.test_id, "1");
    assert_eq!(
        report.identification.column.variants,
        test_options().requested_variants
    );
    assert_eq!(report.test_name, "test 1");
    assert_eq!(report.jira_component, "component 1");

    assert_eq!(report.analyses.len(), 1);
    let analysis = &report.analyses[0];
    assert_eq!(analysis.comparison.status, Status::NotSignificant);
    assert!(close(
        analysis.comparison.fisher_exact.unwrap(),
        0.4807457902463764
    ));
    let sample = &analysis.comparison.sample_stats;
    assert_eq!(sample.release, "4.17");
    assert!((sample.stats.success_rate - 0.9203539823008849).abs() < 1e-9);
    let base = analysis.comparison.base_stats.as_ref().unwrap();
    assert_eq!(base.release, "4.16");
    assert!((base.stats.success_rate - 0.9130434782608695).abs() < 1e-9);

    assert_eq!(analysis.job_stats.len(), 1);
    let job = &analysis.job_stats[0];
    assert_eq!(job.sample_job_name.as_deref(), Some("ProwJob1"));
    assert_eq!(job.base_job_name, None);
    assert!(!job.significant);
    assert_eq!(job.sample_job_run_stats.len(), 113);
    assert_eq!(job.base_job_run_stats.len(), 1150);
}

#[test]
fn one_job_with_low_sample_pass_rate_is_extreme() {
    let report = generate_test_details_report(
        &request(),
        &[],
        &test_options(),
        statuses(
            vec![("ProwJob1", 1000, 100, 50)],
            vec![("ProwJob1", 50, 59, 4)],
        ),
        None,
    )
    .unwrap();

    let analysis = &report.analyses[0];
    assert_eq!(analysis.comparison.status, Status::ExtremeRegression);
    assert!(close(
        analysis.comparison.fisher_exact.unwrap(),
        8.209711662216515e-28
    ));
    assert!(
        (analysis.comparison.sample_stats.stats.success_rate - 0.4778761061946903).abs() < 1e-9
    );
    let job = &analysis.job_stats[0];
    assert!(job.significant);
}

#[test]
fn one_job_with_low_base_pass_rate_is_an_improvement() {
    let report = generate_test_details_report(
        &request(),
        &[],
        &test_options(),
        statuses(
            vec![("ProwJob1", 500, 600, 50)],
            vec![("ProwJob1", 100, 9, 4)],
        ),
        None,
    )
    .unwrap();

    let analysis = &report.analyses[0];
    assert_eq!(analysis.comparison.status, Status::SignificantImprovement);
    assert!(close(
        analysis.comparison.fisher_exact.unwrap(),
        4.911246201592593e-22
    ));
    assert!(
        (analysis.comparison.base_stats.as_ref().unwrap().stats.success_rate
            - 0.4782608695652174)
            .abs()
            < 1e-9
    );
    // Improvements are not flagged significant at the job level.
    assert!(!analysis.job_stats[0].significant);
}

#[test]
fn two_jobs_aggregate_before_the_kernel_runs() {
    let report = generate_test_details_report(
        &request(),
        &[],
        &test_options(),
        statuses(
            vec![
                ("ProwJob1", 1000, 100, 50),
                ("ProwJob2", 1000, 100, 50),
            ],
            vec![("ProwJob1", 100, 9, 4), ("ProwJob2", 100, 9, 4)],
        ),
        None,
    )
    .unwrap();

    let analysis = &report.analyses[0];
    assert_eq!(analysis.comparison.status, Status::NotSignificant);
    assert!(close(
        analysis.comparison.fisher_exact.unwrap(),
        0.4119831376606586
    ));
    let sample = &analysis.comparison.sample_stats.stats;
    assert_eq!(
        (sample.success_count, sample.failure_count, sample.flake_count),
        (200, 18, 8)
    );
    assert!((sample.success_rate - 0.9203539823008849).abs() < 1e-9);
    let base = &analysis.comparison.base_stats.as_ref().unwrap().stats;
    assert_eq!(
        (base.success_count, base.failure_count, base.flake_count),
        (2000, 200, 100)
    );

    assert_eq!(analysis.job_stats.len(), 2);
    assert_eq!(
        analysis.job_stats[0].sample_job_name.as_deref(),
        Some("ProwJob1")
    );
    assert_eq!(
        analysis.job_stats[1].sample_job_name.as_deref(),
        Some("ProwJob2")
    );
    for job in &analysis.job_stats {
        assert!(!job.significant);
        assert_eq!(job.sample_job_run_stats.len(), 113);
        assert_eq!(job.base_job_run_stats.len(), 1150);
    }
}

#[test]
fn release_suffixed_jobs_match_across_sides() {
    let report = generate_test_details_report(
        &request(),
        &[],
        &test_options(),
        statuses(
            vec![("periodic-4.16-e2e-aws", 1000, 100, 50)],
            vec![("periodic-4.17-e2e-aws", 50, 59, 4)],
        ),
        None,
    )
    .unwrap();

    let analysis = &report.analyses[0];
    assert_eq!(analysis.job_stats.len(), 1);
    let job = &analysis.job_stats[0];
    assert_eq!(job.sample_job_name.as_deref(), Some("periodic-4.17-e2e-aws"));
    // The base ran under a different raw name, so it is surfaced.
    assert_eq!(job.base_job_name.as_deref(), Some("periodic-4.16-e2e-aws"));
    assert!(job.significant);
}

#[test]
fn one_sided_jobs_emit_zeroed_counterparts_and_a_note() {
    let report = generate_test_details_report(
        &request(),
        &[],
        &test_options(),
        statuses(
            vec![("OldJob", 1000, 100, 50)],
            vec![("NewJob", 100, 9, 4)],
        ),
        None,
    )
    .unwrap();

    let analysis = &report.analyses[0];
    assert_eq!(analysis.job_stats.len(), 2);
    let new_job = analysis
        .job_stats
        .iter()
        .find(|j| j.sample_job_name.as_deref() == Some("NewJob"))
        .unwrap();
    assert_eq!(new_job.base_stats.success_count, 0);
    assert_eq!(new_job.base_job_run_stats.len(), 0);
    let old_job = analysis
        .job_stats
        .iter()
        .find(|j| j.base_job_name.as_deref() == Some("OldJob"))
        .unwrap();
    assert_eq!(old_job.sample_stats.success_count, 0);
    assert!(analysis
        .comparison
        .explanations
        .iter()
        .any(|e| e.contains("No base job runs matched sample job NewJob")));
    assert!(analysis
        .comparison
        .explanations
        .iter()
        .any(|e| e.contains("No sample job runs matched base job OldJob")));
}

#[test]
fn base_override_produces_a_leading_analysis() {
    let mut options = test_options();
    options.base_override_release = "4.15".to_string();
    let mut input = statuses(
        vec![("ProwJob1", 500, 600, 50)],
        vec![("ProwJob1", 50, 59, 4)],
    );
    input
        .base_override_status
        .insert("ProwJob1".to_string(), job_rows("ProwJob1", 1000, 100, 50));

    let report =
        generate_test_details_report(&request(), &[], &options, input, None).unwrap();

    assert_eq!(report.analyses.len(), 2);
    // The override analysis leads and judges against the stricter basis.
    let override_analysis = &report.analyses[0];
    assert_eq!(
        override_analysis.comparison.base_stats.as_ref().unwrap().release,
        "4.15"
    );
    assert_eq!(override_analysis.comparison.status, Status::ExtremeRegression);
    // The configured base was already terrible, so no regression there.
    let main_analysis = &report.analyses[1];
    assert_eq!(
        main_analysis.comparison.base_stats.as_ref().unwrap().release,
        "4.16"
    );
    assert_eq!(main_analysis.comparison.status, Status::NotSignificant);
}
