//! Triage middleware: applies externally filed triage claims to verdicts.
//!
//! Runs last in the chain so its annotations reflect the final counts.
//! When every sample failure of a regressed test is covered by triaged
//! matches, the severity drops one notch (Extreme → ExtremeTriaged,
//! Significant → SignificantTriaged). A triage with a resolution time
//! yields `FixedRegression` while the old failures roll off the sample
//! window, or `FailedFixedRegression` if failures keep arriving past the
//! resolution. The statistics themselves are never altered.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use readiness_types::{
    JobVariants, RequestOptions, Status, TestComparison, TestKey, Triage,
};

use crate::cancel::CancellationToken;
use crate::errors::Result;
use crate::middleware::Middleware;
use crate::query::StatusDelta;
use crate::storage::RegressionStore;

pub struct TriageIntegration {
    store: Arc<dyn RegressionStore>,
    sample_release: String,
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    loaded: Mutex<Vec<Triage>>,
}

impl TriageIntegration {
    pub fn new(store: Arc<dyn RegressionStore>, req: &RequestOptions) -> Self {
        Self {
            store,
            sample_release: req.sample_release.release.clone(),
            window_start: req.sample_release.start,
            window_end: req.sample_release.end,
            loaded: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Middleware for TriageIntegration {
    fn name(&self) -> &'static str {
        "triage"
    }

    async fn query(
        &self,
        _all_job_variants: &JobVariants,
        _req: &RequestOptions,
        _cancel: &CancellationToken,
    ) -> Result<Option<StatusDelta>> {
        match self
            .store
            .triages(&self.sample_release, self.window_start, self.window_end)
            .await
        {
            Ok(triages) => {
                debug!(count = triages.len(), "loaded triage records");
                *self.loaded.lock().unwrap_or_else(|e| e.into_inner()) = triages;
            }
            Err(err) => {
                // The side database is optional: no triages, no annotations.
                warn!(error = %err, "triage store unavailable, continuing without annotations");
            }
        }
        Ok(None)
    }

    fn post_analysis(&self, key: &TestKey, cmp: &mut TestComparison) -> Result<()> {
        if !matches!(
            cmp.status,
            Status::ExtremeRegression | Status::SignificantRegression
        ) {
            return Ok(());
        }

        let loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        let mut covered: u32 = 0;
        let mut resolution: Option<DateTime<Utc>> = None;
        let mut matched_any = false;
        for triage in loaded.iter() {
            let hits = triage.covered_failures(
                &key.test_id,
                &key.variants,
                self.window_start,
                self.window_end,
            );
            if hits == 0 {
                continue;
            }
            matched_any = true;
            covered += hits;
            if let Some(res) = triage.resolution {
                resolution = Some(resolution.map(|r| r.max(res)).unwrap_or(res));
            }
        }
        if !matched_any {
            return Ok(());
        }

        if let Some(resolved_at) = resolution {
            match cmp.last_failure {
                Some(last) if last > resolved_at => {
                    cmp.status = Status::FailedFixedRegression;
                    cmp.explanations.push(format!(
                        "Triage was resolved at {} but failures continue past the resolution.",
                        resolved_at.to_rfc3339()
                    ));
                    return Ok(());
                }
                _ => {
                    cmp.status = Status::FixedRegression;
                    cmp.explanations.push(format!(
                        "Triage resolved at {}; failures have not yet rolled off the sample window.",
                        resolved_at.to_rfc3339()
                    ));
                    return Ok(());
                }
            }
        }

        let sample_failures = cmp.sample_stats.stats.failure_count;
        if sample_failures > 0 && covered >= sample_failures {
            cmp.status = match cmp.status {
                Status::ExtremeRegression => Status::ExtremeTriagedRegression,
                _ => Status::SignificantTriagedRegression,
            };
            cmp.explanations.push(format!(
                "All {sample_failures} sample failures are covered by triaged incidents."
            ));
        }
        Ok(())
    }
}
