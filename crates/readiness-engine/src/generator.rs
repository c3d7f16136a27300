//! The request-scoped report generator: resolves the cache, fans out
//! queries, runs the analysis, and applies post-analysis middleware.
//!
//! A generator is built per request, so middleware holding request-scoped
//! state (fallback release maps, triage records) never leaks across
//! requests. Reports are cached before post-analysis runs; the hooks are
//! re-applied on every request, cache hit or miss, which keeps triage and
//! tracker annotations fresh without recomputing any statistics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use readiness_types::{
    ComponentReport, ReleaseOptions, RequestOptions, TestComparison, TestDetailsReport, TestKey,
};

use crate::cache::{self, Cache};
use crate::cancel::CancellationToken;
use crate::errors::{EngineError, Result};
use crate::fingerprint;
use crate::middleware::fallback::ReleaseFallback;
use crate::middleware::regression::RegressionTracking;
use crate::middleware::triage::TriageIntegration;
use crate::middleware::Middleware;
use crate::query::{self, ComponentMapper, QueryClient};
use crate::storage::RegressionStore;
use crate::{details, report};

pub struct ReportGenerator {
    client: Arc<dyn QueryClient>,
    mapper: Arc<dyn ComponentMapper>,
    cache: Arc<dyn Cache>,
    middleware: Vec<Arc<dyn Middleware>>,
    req: RequestOptions,
}

impl ReportGenerator {
    pub fn new(
        client: Arc<dyn QueryClient>,
        mapper: Arc<dyn ComponentMapper>,
        cache: Arc<dyn Cache>,
        req: RequestOptions,
    ) -> Self {
        Self {
            client,
            mapper,
            cache,
            middleware: Vec::new(),
            req,
        }
    }

    /// Append one middleware. Order is significant; hooks run in the order
    /// they were added.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Install the standard chain: release fallback (when multi-release
    /// analysis is requested), then regression tracking, then triage, so
    /// triage annotates the final counts.
    pub fn with_default_middleware(
        mut self,
        store: Option<Arc<dyn RegressionStore>>,
        prior_releases: Vec<ReleaseOptions>,
    ) -> Self {
        if self.req.advanced_option.include_multi_release_analysis && !prior_releases.is_empty() {
            self.middleware.push(Arc::new(ReleaseFallback::new(
                self.client.clone(),
                prior_releases,
                self.req.advanced_option.flake_as_failure,
            )));
        }
        if let Some(store) = store {
            self.middleware
                .push(Arc::new(RegressionTracking::new(store.clone(), &self.req)));
            self.middleware
                .push(Arc::new(TriageIntegration::new(store, &self.req)));
        }
        self
    }

    pub fn request(&self) -> &RequestOptions {
        &self.req
    }

    /// Generate (or fetch) the summary matrix report.
    pub async fn component_report(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ComponentReport> {
        let key = fingerprint::component_report_key(&self.req, now);
        if !self.req.cache_option.force_refresh {
            if let Some(mut report) = self.cached::<ComponentReport>(&key) {
                self.load_middleware_state(cancel).await?;
                self.post_analyze_component(&mut report)?;
                return Ok(report);
            }
        }

        let gathered =
            query::gather_test_status(self.client.clone(), &self.middleware, &self.req, cancel)
                .await?;
        let mut report = report::generate_component_report(
            &self.req,
            self.mapper.as_ref(),
            &self.middleware,
            &gathered.base,
            &gathered.sample,
            Some(now),
        )?;

        self.store(&key, &report, now);
        self.post_analyze_component(&mut report)?;
        Ok(report)
    }

    /// Generate (or fetch) the drill-down reports, one per test
    /// identification on the request.
    pub async fn test_details_report(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TestDetailsReport>> {
        if self.req.test_id_options.is_empty() {
            return Err(EngineError::invalid_request(
                "test details require at least one test identification",
            ));
        }

        let key = fingerprint::test_details_key(&self.req, now);
        if !self.req.cache_option.force_refresh {
            if let Some(mut reports) = self.cached::<Vec<TestDetailsReport>>(&key) {
                self.load_middleware_state(cancel).await?;
                self.post_analyze_details(&mut reports)?;
                return Ok(reports);
            }
        }

        let mut reports = Vec::with_capacity(self.req.test_id_options.len());
        for test in &self.req.test_id_options {
            let statuses = query::gather_job_run_statuses(
                self.client.clone(),
                &self.middleware,
                test,
                &self.req,
                cancel,
            )
            .await?;
            reports.push(details::generate_test_details_report(
                &self.req,
                &self.middleware,
                test,
                statuses,
                Some(now),
            )?);
        }

        self.store(&key, &reports, now);
        self.post_analyze_details(&mut reports)?;
        Ok(reports)
    }

    /// On a cache hit the expensive report is reused, but middleware still
    /// needs its request-scoped state (triage records, tracker rows) for
    /// post-analysis. Re-run the `query` hooks and discard any status
    /// deltas; no statistics are recomputed.
    async fn load_middleware_state(&self, cancel: &CancellationToken) -> Result<()> {
        if self.middleware.is_empty() {
            return Ok(());
        }
        let variants = self.client.job_variants().await?;
        for mw in &self.middleware {
            mw.query(&variants, &self.req, cancel).await?;
        }
        Ok(())
    }

    fn cached<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    debug!(key, "report cache hit");
                    Some(value)
                }
                Err(err) => {
                    warn!(key, error = %err, "discarding corrupt cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key, error = %err, "cache read failed, regenerating");
                None
            }
        }
    }

    fn store<T: serde::Serialize>(&self, key: &str, value: &T, now: DateTime<Utc>) {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                let ttl = cache::ttl_for(now, self.req.cache_option.crtime_rounding_factor);
                if let Err(err) = self.cache.set(key, bytes, ttl) {
                    warn!(key, error = %err, "cache write failed");
                }
            }
            Err(err) => warn!(key, error = %err, "report did not serialize for caching"),
        }
    }

    /// Run `post_analysis` hooks over every regressed test in the report
    /// and refresh the column statuses they feed.
    fn post_analyze_component(&self, report: &mut ComponentReport) -> Result<()> {
        if self.middleware.is_empty() {
            return Ok(());
        }
        for row in &mut report.rows {
            for column in &mut row.columns {
                if column.regressed_tests.is_empty() {
                    continue;
                }
                for test in &mut column.regressed_tests {
                    let key = TestKey::new(
                        test.identification.row.test_id.clone(),
                        test.identification.column.variants.clone(),
                    );
                    self.post_analyze_one(&key, &mut test.comparison)?;
                }
                column.regressed_tests.sort_by(|a, b| {
                    (a.comparison.status, &a.identification.row.test_name)
                        .cmp(&(b.comparison.status, &b.identification.row.test_name))
                });
                if let Some(worst) = column
                    .regressed_tests
                    .iter()
                    .map(|t| t.comparison.status)
                    .min()
                {
                    column.status = worst;
                }
            }
        }
        Ok(())
    }

    fn post_analyze_details(&self, reports: &mut [TestDetailsReport]) -> Result<()> {
        if self.middleware.is_empty() {
            return Ok(());
        }
        for report in reports {
            let key = TestKey::new(
                report.identification.row.test_id.clone(),
                report.identification.column.variants.clone(),
            );
            for analysis in &mut report.analyses {
                self.post_analyze_one(&key, &mut analysis.comparison)?;
            }
        }
        Ok(())
    }

    fn post_analyze_one(&self, key: &TestKey, cmp: &mut TestComparison) -> Result<()> {
        for mw in &self.middleware {
            mw.post_analysis(key, cmp)
                .map_err(|e| EngineError::internal(format!("middleware {}: {e}", mw.name())))?;
        }
        Ok(())
    }
}
