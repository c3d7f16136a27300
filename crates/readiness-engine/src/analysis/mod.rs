//! The statistical decision for one (test × variants): given base and
//! sample stats plus the request's knobs, produce a status verdict with
//! human-readable explanations.
//!
//! Three modes share the entry point: missing-data handling, required
//! pass-rate checks (new tests, or all tests when configured), and
//! Fisher's exact significance testing with pity tolerance.

pub mod fisher;

use chrono::{DateTime, Utc};

use readiness_types::{
    AdvancedOptions, Comparison, ReleaseStats, RequestOptions, Stats, Status, TestComparison,
};

/// Pass-rate drop beyond which a Fisher-mode regression is extreme.
const FISHER_EXTREME_DROP: f64 = 0.15;

/// Gap below the required pass rate beyond which a pass-rate-mode
/// regression is extreme.
const PASS_RATE_EXTREME_GAP: f64 = 0.05;

/// Fresh comparison carrying the request's confidence and no adjustments;
/// middleware mutates it before and after `assess`.
pub fn new_comparison(
    req: &RequestOptions,
    sample_stats: ReleaseStats,
    base_stats: Option<ReleaseStats>,
    last_failure: Option<DateTime<Utc>>,
) -> TestComparison {
    TestComparison {
        status: Status::NotSignificant,
        comparison: Comparison::FisherExact,
        explanations: Vec::new(),
        sample_stats,
        base_stats,
        fisher_exact: None,
        required_confidence: req.advanced_option.confidence,
        pity_adjustment: 0.0,
        required_pass_rate_adjustment: 0.0,
        last_failure,
        regression: None,
    }
}

/// Minimum sample runs before a required-pass-rate verdict can trigger.
/// At a 95% requirement this lands at 7 runs; one failure there is already
/// decisive, while fewer runs cannot distinguish noise from regression.
pub fn minimum_runs(required_percent: u32) -> u32 {
    let denom = f64::from(110u32.saturating_sub(required_percent).max(1));
    (100.0 / denom).ceil() as u32
}

/// Run the decision tree and write status, probability, and explanations
/// into the comparison.
pub fn assess(adv: &AdvancedOptions, cmp: &mut TestComparison) {
    let sample_total = cmp.sample_stats.stats.total();
    match cmp.base_stats.clone() {
        None if sample_total == 0 => {
            cmp.status = Status::MissingBasisAndSample;
        }
        None => assess_new_test(adv, cmp),
        Some(_) if sample_total == 0 => {
            cmp.status = Status::MissingSample;
        }
        Some(base) => {
            if adv.pass_rate_required_all_tests > 0 {
                assess_required_pass_rate(
                    adv.pass_rate_required_all_tests,
                    Some(adv.minimum_failure),
                    adv.flake_as_failure,
                    cmp,
                );
            } else {
                assess_fisher(adv, &base, cmp);
            }
        }
    }
}

/// Whether a single job's sample counts regress against its base job at the
/// request's confidence. Used by the details builder to flag per-job rows.
pub fn job_regressed(req: &RequestOptions, sample: &Stats, base: &Stats) -> bool {
    let mut cmp = new_comparison(
        req,
        ReleaseStats {
            stats: *sample,
            ..Default::default()
        },
        Some(ReleaseStats {
            stats: *base,
            ..Default::default()
        }),
        None,
    );
    assess(&req.advanced_option, &mut cmp);
    matches!(
        cmp.status,
        Status::ExtremeRegression | Status::SignificantRegression
    )
}

fn assess_new_test(adv: &AdvancedOptions, cmp: &mut TestComparison) {
    if adv.pass_rate_required_new_tests == 0 {
        cmp.status = Status::MissingBasis;
        return;
    }
    assess_required_pass_rate(
        adv.pass_rate_required_new_tests,
        None,
        adv.flake_as_failure,
        cmp,
    );
}

fn assess_required_pass_rate(
    required_percent: u32,
    minimum_failure: Option<u32>,
    flake_as_failure: bool,
    cmp: &mut TestComparison,
) {
    cmp.comparison = Comparison::PassRate;
    let stats = cmp.sample_stats.stats;
    if stats.total() < minimum_runs(required_percent) {
        cmp.status = Status::NotSignificant;
        return;
    }
    let rate = stats.pass_rate(flake_as_failure);
    let required = f64::from(required_percent) / 100.0 - cmp.required_pass_rate_adjustment;
    if rate >= required {
        cmp.status = Status::NotSignificant;
        return;
    }
    if let Some(min_fail) = minimum_failure {
        let (fails, _) = stats.fail_pass_with_flakes(flake_as_failure);
        if fails < min_fail {
            cmp.status = Status::NotSignificant;
            return;
        }
    }
    let status = if rate < required - PASS_RATE_EXTREME_GAP {
        Status::ExtremeRegression
    } else {
        Status::SignificantRegression
    };
    cmp.status = status;
    cmp.explanations
        .push(format!("{} regression detected.", status.label()));
    cmp.explanations.push(format!(
        "Sample pass rate {:.2}% below required {:.2}%.",
        rate * 100.0,
        required * 100.0
    ));
}

fn assess_fisher(adv: &AdvancedOptions, base: &ReleaseStats, cmp: &mut TestComparison) {
    cmp.comparison = Comparison::FisherExact;
    let flake_as_failure = adv.flake_as_failure;
    let sample = cmp.sample_stats.stats;
    let (sample_fails, sample_passes) = sample.fail_pass_with_flakes(flake_as_failure);
    let (base_fails, base_passes) = base.stats.fail_pass_with_flakes(flake_as_failure);
    let sample_rate = sample.pass_rate(flake_as_failure);
    let base_rate = base.stats.pass_rate(flake_as_failure);

    // Identical rows carry no evidence either way.
    if sample_fails == base_fails && sample_passes == base_passes {
        cmp.fisher_exact = Some(1.0);
        cmp.status = Status::NotSignificant;
        return;
    }

    let effective_confidence = f64::from(cmp.required_confidence) - 100.0 * cmp.pity_adjustment;

    if sample_rate >= base_rate {
        // Tail taken in the improvement direction.
        let p = fisher::right_tail(
            u64::from(base_fails),
            u64::from(base_passes),
            u64::from(sample_fails),
            u64::from(sample_passes),
        );
        cmp.fisher_exact = Some(p);
        if p < 1.0 - effective_confidence / 100.0 {
            cmp.status = Status::SignificantImprovement;
            cmp.explanations
                .push("Significant improvement detected.".to_string());
            cmp.explanations.push(format!(
                "Fishers Exact probability of an improvement: {:.2}%.",
                100.0 - p
            ));
            cmp.explanations.push(format!(
                "Test pass rate rose from {:.2}% to {:.2}%.",
                base_rate * 100.0,
                sample_rate * 100.0
            ));
        } else {
            cmp.status = Status::NotSignificant;
        }
        return;
    }

    let pity = f64::from(adv.pity_factor) / 100.0 + cmp.pity_adjustment;
    if sample_rate + pity >= base_rate {
        cmp.status = Status::NotSignificant;
        cmp.explanations.push(format!(
            "Pass rate drop of {:.2}% is within the tolerated {:.2}%.",
            (base_rate - sample_rate) * 100.0,
            pity * 100.0
        ));
        return;
    }
    if sample_fails < adv.minimum_failure {
        cmp.status = Status::NotSignificant;
        return;
    }

    let p = fisher::right_tail(
        u64::from(sample_fails),
        u64::from(sample_passes),
        u64::from(base_fails),
        u64::from(base_passes),
    );
    cmp.fisher_exact = Some(p);
    if p < 1.0 - effective_confidence / 100.0 {
        let status = if base_rate - sample_rate >= FISHER_EXTREME_DROP {
            Status::ExtremeRegression
        } else {
            Status::SignificantRegression
        };
        cmp.status = status;
        cmp.explanations
            .push(format!("{} regression detected.", status.label()));
        cmp.explanations.push(format!(
            "Fishers Exact probability of a regression: {:.2}%.",
            100.0 - p
        ));
        cmp.explanations.push(format!(
            "Test pass rate dropped from {:.2}% to {:.2}%.",
            base_rate * 100.0,
            sample_rate * 100.0
        ));
    } else {
        cmp.status = Status::NotSignificant;
    }
}
