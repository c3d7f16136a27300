//! Deterministic fingerprints for report requests.
//!
//! The fingerprint canonicalizes every option that changes a report's
//! content: releases and concrete windows, variant grouping and filters,
//! the statistical knobs, and the test identifications. Maps and sets are
//! sorted before encoding, so two requests that differ only in entry order
//! hash identically. When a rounding factor is configured the current time
//! bucket is part of the key, which is what lets concurrent requests share
//! one cached artifact.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use readiness_types::{ReleaseOptions, RequestOptions};

use crate::cache::round_down;

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Cache key for the summary matrix report.
pub fn component_report_key(req: &RequestOptions, now: DateTime<Utc>) -> String {
    format!("component-report:{}", digest(req, now))
}

/// Cache key for a test-details report.
pub fn test_details_key(req: &RequestOptions, now: DateTime<Utc>) -> String {
    format!("test-details:{}", digest(req, now))
}

fn digest(req: &RequestOptions, now: DateTime<Utc>) -> String {
    let mut parts = Vec::new();

    push_release(&mut parts, "base", &req.base_release);
    push_release(&mut parts, "sample", &req.sample_release);

    let variants = &req.variant_option;
    parts.push(format!(
        "column_group_by={}",
        join_sorted(variants.column_group_by.iter())
    ));
    parts.push(format!(
        "db_group_by={}",
        join_sorted(variants.db_group_by.iter())
    ));
    parts.push(format!(
        "include_variants={}",
        encode_variant_map(&variants.include_variants)
    ));
    parts.push(format!(
        "compare_variants={}",
        encode_variant_map(&variants.compare_variants)
    ));
    let mut cross = variants.variant_cross_compare.clone();
    cross.sort();
    parts.push(format!("variant_cross_compare={}", cross.join(",")));

    let adv = &req.advanced_option;
    parts.push(format!("confidence={}", adv.confidence));
    parts.push(format!("pity_factor={}", adv.pity_factor));
    parts.push(format!("minimum_failure={}", adv.minimum_failure));
    parts.push(format!(
        "pass_rate_required_new_tests={}",
        adv.pass_rate_required_new_tests
    ));
    parts.push(format!(
        "pass_rate_required_all_tests={}",
        adv.pass_rate_required_all_tests
    ));
    parts.push(format!("ignore_missing={}", adv.ignore_missing));
    parts.push(format!("ignore_disruption={}", adv.ignore_disruption));
    parts.push(format!("flake_as_failure={}", adv.flake_as_failure));
    parts.push(format!(
        "include_multi_release_analysis={}",
        adv.include_multi_release_analysis
    ));

    for opt in &req.test_id_options {
        // BTreeMap inside keeps the variant keys sorted.
        parts.push(format!(
            "test_id_option={}",
            serde_json::to_string(opt).unwrap_or_default()
        ));
    }

    if req.cache_option.crtime_rounding_factor > 0 {
        parts.push(format!(
            "bucket={}",
            round_down(now, req.cache_option.crtime_rounding_factor).to_rfc3339()
        ));
    }

    sha256_hex(&parts.join("\n"))
}

fn push_release(parts: &mut Vec<String>, label: &str, release: &ReleaseOptions) {
    parts.push(format!("{label}_release={}", release.release));
    parts.push(format!(
        "{label}_start={}",
        release.start.map(|t| t.to_rfc3339()).unwrap_or_default()
    ));
    parts.push(format!(
        "{label}_end={}",
        release.end.map(|t| t.to_rfc3339()).unwrap_or_default()
    ));
}

fn join_sorted<'a>(iter: impl Iterator<Item = &'a String>) -> String {
    let parts: Vec<&str> = iter.map(String::as_str).collect();
    parts.join(",")
}

fn encode_variant_map(map: &BTreeMap<String, Vec<String>>) -> String {
    map.iter()
        .map(|(k, values)| {
            let mut sorted = values.clone();
            sorted.sort();
            format!("{k}={}", sorted.join("|"))
        })
        .collect::<Vec<_>>()
        .join(";")
}
