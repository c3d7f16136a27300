//! Predefined views and relative time resolution.
//!
//! Views carry relative window expressions like `now-7d` or `ga-30d`
//! instead of fixed dates. The resolver translates a named view plus an
//! explicit `now` into concrete request options; kernels never read a
//! clock themselves.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use readiness_types::{RelativeReleaseOptions, ReleaseOptions, RequestOptions, View};

use crate::errors::{EngineError, Result};

fn expression_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(now|ga)(?:([+-])(\d+)([dw]))?$").expect("static relative time pattern")
    })
}

/// Resolves named views against a fixed `now` and the per-release GA dates.
pub struct ViewResolver {
    views: Vec<View>,
    ga_dates: BTreeMap<String, DateTime<Utc>>,
}

impl ViewResolver {
    pub fn new(views: Vec<View>, ga_dates: BTreeMap<String, DateTime<Utc>>) -> Self {
        Self { views, ga_dates }
    }

    pub fn view(&self, name: &str) -> Result<&View> {
        self.views
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| EngineError::not_found(format!("view {name}")))
    }

    /// Translate a view into concrete request options. The resolved windows
    /// are written into the returned release options so callers can show
    /// the dates that were used.
    pub fn resolve(&self, name: &str, now: DateTime<Utc>) -> Result<RequestOptions> {
        let view = self.view(name)?;
        Ok(RequestOptions {
            base_release: self.resolve_release(&view.base_release, now)?,
            sample_release: self.resolve_release(&view.sample_release, now)?,
            variant_option: view.variant_options.clone(),
            advanced_option: view.advanced_options,
            cache_option: Default::default(),
            test_id_options: view.test_id_options.clone(),
        })
    }

    fn resolve_release(
        &self,
        rel: &RelativeReleaseOptions,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOptions> {
        let ga = self.ga_dates.get(&rel.release.release).copied();
        let start = match rel.relative_start.as_str() {
            "" => rel.release.start,
            expr => Some(resolve_expression(expr, &rel.release.release, now, ga)?),
        };
        let end = match rel.relative_end.as_str() {
            "" => rel.release.end,
            expr => Some(resolve_expression(expr, &rel.release.release, now, ga)?),
        };
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                return Err(EngineError::invalid_request(format!(
                    "release {}: window end {} is not after start {}",
                    rel.release.release, end, start
                )));
            }
        }
        Ok(ReleaseOptions {
            release: rel.release.release.clone(),
            start,
            end,
        })
    }
}

/// Resolve one relative expression (`now`, `ga`, `now-7d`, `ga+2w`, ...)
/// against the anchors.
fn resolve_expression(
    expr: &str,
    release: &str,
    now: DateTime<Utc>,
    ga: Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>> {
    let caps = expression_pattern().captures(expr).ok_or_else(|| {
        EngineError::invalid_request(format!("unparseable relative time {expr:?}"))
    })?;
    let anchor = match &caps[1] {
        "now" => now,
        "ga" => ga.ok_or_else(|| {
            EngineError::invalid_request(format!("no GA date known for release {release}"))
        })?,
        other => {
            return Err(EngineError::invalid_request(format!(
                "unknown anchor {other:?}"
            )))
        }
    };
    let offset = match (caps.get(2), caps.get(3), caps.get(4)) {
        (Some(sign), Some(amount), Some(unit)) => {
            let n: i64 = amount.as_str().parse().map_err(|_| {
                EngineError::invalid_request(format!("bad offset in {expr:?}"))
            })?;
            let days = match unit.as_str() {
                "w" => n * 7,
                _ => n,
            };
            if sign.as_str() == "-" {
                -Duration::days(days)
            } else {
                Duration::days(days)
            }
        }
        _ => Duration::zero(),
    };
    Ok(anchor + offset)
}
