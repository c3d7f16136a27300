//! Release-fallback middleware: when multi-release analysis is enabled,
//! prior releases are queried for the same tests, and a prior release with
//! a strictly higher pass rate than the configured base is promoted to the
//! basis for that test. A stricter historical release keeps a slowly
//! decaying test from grading itself against an already-degraded base.
//!
//! The sample window is never touched; only the base counts are swapped.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use readiness_types::{
    JobVariants, ReleaseOptions, ReleaseStats, RequestOptions, TestComparison, TestKey, TestStatus,
};

use crate::cancel::CancellationToken;
use crate::errors::{EngineError, Result};
use crate::middleware::Middleware;
use crate::query::{QueryClient, StatusDelta};

struct ReleaseTestMap {
    release: ReleaseOptions,
    tests: BTreeMap<String, TestStatus>,
}

pub struct ReleaseFallback {
    client: Arc<dyn QueryClient>,
    /// Prior releases to consider, most recent first.
    prior_releases: Vec<ReleaseOptions>,
    flake_as_failure: bool,
    loaded: Mutex<Vec<ReleaseTestMap>>,
}

impl ReleaseFallback {
    pub fn new(
        client: Arc<dyn QueryClient>,
        prior_releases: Vec<ReleaseOptions>,
        flake_as_failure: bool,
    ) -> Self {
        Self {
            client,
            prior_releases,
            flake_as_failure,
            loaded: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Middleware for ReleaseFallback {
    fn name(&self) -> &'static str {
        "release-fallback"
    }

    async fn query(
        &self,
        _all_job_variants: &JobVariants,
        req: &RequestOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<StatusDelta>> {
        let mut maps = Vec::new();
        for release in &self.prior_releases {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if release.release == req.base_release.release {
                continue;
            }
            let tests = self.client.test_status(release, req).await?;
            debug!(release = %release.release, tests = tests.len(), "loaded fallback release");
            maps.push(ReleaseTestMap {
                release: release.clone(),
                tests,
            });
        }
        *self.loaded.lock().unwrap_or_else(|e| e.into_inner()) = maps;
        // Fallback data replaces the basis per test; it never merges into
        // the shared maps.
        Ok(None)
    }

    fn pre_analysis(&self, key: &TestKey, cmp: &mut TestComparison) -> Result<()> {
        let Some(base) = cmp.base_stats.as_ref() else {
            return Ok(());
        };
        let base_rate = base.stats.pass_rate(self.flake_as_failure);
        let canonical = key.canonical();

        let loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        let mut best: Option<(&ReleaseOptions, &TestStatus, f64)> = None;
        for map in loaded.iter() {
            if let Some(status) = map.tests.get(&canonical) {
                let rate = status.count.pass_rate(self.flake_as_failure);
                if best.map(|(_, _, r)| rate > r).unwrap_or(true) {
                    best = Some((&map.release, status, rate));
                }
            }
        }
        let Some((release, status, rate)) = best else {
            return Ok(());
        };
        if rate <= base_rate {
            return Ok(());
        }

        cmp.base_stats = Some(ReleaseStats {
            release: release.release.clone(),
            start: release.start,
            end: release.end,
            stats: status.count.to_stats(self.flake_as_failure),
        });
        cmp.explanations.push(format!(
            "Overrode base stats using release {} with pass rate {:.2}%.",
            release.release,
            rate * 100.0
        ));
        Ok(())
    }
}
