//! Query capabilities and the concurrent fan-out that gathers a report's
//! inputs.
//!
//! The analytical store is consumed through `QueryClient`; component
//! ownership through `ComponentMapper`. The orchestrator runs every
//! producer (built-in queries plus middleware `query` hooks) concurrently,
//! makes no output visible until all complete, and surfaces the first
//! error while cancelling the rest.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::debug;

use readiness_types::{
    JobRunStatuses, JobVariants, ReleaseOptions, RequestOptions, TestIdentificationOptions,
    TestJobRunRow, TestKey, TestStatus,
};

use crate::cancel::CancellationToken;
use crate::errors::{EngineError, Result};
use crate::middleware::Middleware;

/// Access to the analytical store, as typed row maps. Wire details are the
/// implementation's business; transport failures surface as
/// `UpstreamUnavailable`.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// All variants supported by the system.
    async fn job_variants(&self) -> Result<JobVariants>;

    /// Per-test outcome counts for one release window, keyed by the
    /// canonical test key.
    async fn test_status(
        &self,
        release: &ReleaseOptions,
        req: &RequestOptions,
    ) -> Result<BTreeMap<String, TestStatus>>;

    /// Per-job-run rows for a single test in one release window, keyed by
    /// prow job name.
    async fn job_run_rows(
        &self,
        release: &ReleaseOptions,
        test: &TestIdentificationOptions,
        req: &RequestOptions,
    ) -> Result<BTreeMap<String, Vec<TestJobRunRow>>>;
}

/// Maps a test onto its owning component and capabilities. Injected at
/// engine construction so deployments can swap curation sources and tests
/// can fake it.
pub trait ComponentMapper: Send + Sync {
    fn component_and_capabilities(&self, key: &TestKey, status: &TestStatus)
        -> (String, Vec<String>);
}

/// Extra base/sample rows contributed by one producer.
#[derive(Debug, Default, Clone)]
pub struct StatusDelta {
    pub base: BTreeMap<String, TestStatus>,
    pub sample: BTreeMap<String, TestStatus>,
}

/// Everything the aggregation stage needs, fully merged.
#[derive(Debug, Default)]
pub struct GatheredStatus {
    pub job_variants: JobVariants,
    pub base: BTreeMap<String, TestStatus>,
    pub sample: BTreeMap<String, TestStatus>,
}

/// Fan out the base query, the sample query, and every middleware `query`
/// hook; merge their outputs in producer order once all complete.
pub async fn gather_test_status(
    client: Arc<dyn QueryClient>,
    middleware: &[Arc<dyn Middleware>],
    req: &RequestOptions,
    cancel: &CancellationToken,
) -> Result<GatheredStatus> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    let job_variants = client.job_variants().await?;
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let mut join_set: JoinSet<(usize, Result<StatusDelta>)> = JoinSet::new();

    {
        let client = client.clone();
        let req = req.clone();
        join_set.spawn(async move {
            let result = client.test_status(&req.base_release, &req).await;
            (
                0,
                result.map(|base| StatusDelta {
                    base,
                    sample: BTreeMap::new(),
                }),
            )
        });
    }
    {
        let client = client.clone();
        let req = req.clone();
        join_set.spawn(async move {
            let result = client.test_status(&req.sample_release, &req).await;
            (
                1,
                result.map(|sample| StatusDelta {
                    base: BTreeMap::new(),
                    sample,
                }),
            )
        });
    }
    for (i, mw) in middleware.iter().enumerate() {
        let mw = mw.clone();
        let req = req.clone();
        let variants = job_variants.clone();
        let cancel = cancel.clone();
        join_set.spawn(async move {
            let result = mw.query(&variants, &req, &cancel).await;
            (i + 2, result.map(Option::unwrap_or_default))
        });
    }

    let mut deltas: Vec<(usize, StatusDelta)> = Vec::new();
    let mut first_error: Option<EngineError> = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, Ok(delta))) => deltas.push((index, delta)),
            Ok((_, Err(err))) => {
                cancel.cancel();
                first_error.get_or_insert(err);
                join_set.abort_all();
            }
            Err(join_err) => {
                cancel.cancel();
                first_error
                    .get_or_insert_with(|| EngineError::internal(format!("worker: {join_err}")));
                join_set.abort_all();
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    // Merge in producer order, not completion order, so scalar overrides
    // are deterministic.
    deltas.sort_by_key(|(index, _)| *index);
    let mut gathered = GatheredStatus {
        job_variants,
        ..Default::default()
    };
    for (_, delta) in deltas {
        merge_status_maps(&mut gathered.base, delta.base);
        merge_status_maps(&mut gathered.sample, delta.sample);
    }
    debug!(
        base = gathered.base.len(),
        sample = gathered.sample.len(),
        "gathered test status"
    );
    Ok(gathered)
}

/// Gather per-job-run rows for a details request: base, sample, and the
/// override release when one was promoted as the basis.
pub async fn gather_job_run_statuses(
    client: Arc<dyn QueryClient>,
    middleware: &[Arc<dyn Middleware>],
    test: &TestIdentificationOptions,
    req: &RequestOptions,
    cancel: &CancellationToken,
) -> Result<JobRunStatuses> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    let job_variants = client.job_variants().await?;
    for mw in middleware {
        mw.query_test_details(&job_variants, req, cancel).await?;
    }

    let mut join_set: JoinSet<(usize, Result<BTreeMap<String, Vec<TestJobRunRow>>>)> =
        JoinSet::new();
    let mut releases = vec![req.base_release.clone(), req.sample_release.clone()];
    if !test.base_override_release.is_empty() {
        releases.push(ReleaseOptions {
            release: test.base_override_release.clone(),
            start: req.base_release.start,
            end: req.base_release.end,
        });
    }
    for (i, release) in releases.into_iter().enumerate() {
        let client = client.clone();
        let req = req.clone();
        let test = test.clone();
        join_set.spawn(async move {
            let rows = client.job_run_rows(&release, &test, &req).await;
            (i, rows)
        });
    }

    let mut results: Vec<(usize, BTreeMap<String, Vec<TestJobRunRow>>)> = Vec::new();
    let mut first_error: Option<EngineError> = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, Ok(rows))) => results.push((index, rows)),
            Ok((_, Err(err))) => {
                cancel.cancel();
                first_error.get_or_insert(err);
                join_set.abort_all();
            }
            Err(join_err) => {
                cancel.cancel();
                first_error
                    .get_or_insert_with(|| EngineError::internal(format!("worker: {join_err}")));
                join_set.abort_all();
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    results.sort_by_key(|(index, _)| *index);
    let mut iter = results.into_iter().map(|(_, rows)| rows);
    Ok(JobRunStatuses {
        base_status: iter.next().unwrap_or_default(),
        sample_status: iter.next().unwrap_or_default(),
        base_override_status: iter.next().unwrap_or_default(),
        generated_at: None,
    })
}

/// Fold `from` into `into`: counts for the same test key are summed;
/// non-empty scalar fields from the later producer override.
pub fn merge_status_maps(
    into: &mut BTreeMap<String, TestStatus>,
    from: BTreeMap<String, TestStatus>,
) {
    for (key, status) in from {
        match into.get_mut(&key) {
            None => {
                into.insert(key, status);
            }
            Some(existing) => {
                existing.count = existing.count.add(&status.count);
                if !status.test_name.is_empty() {
                    existing.test_name = status.test_name;
                }
                if !status.test_suite.is_empty() {
                    existing.test_suite = status.test_suite;
                }
                if !status.component.is_empty() {
                    existing.component = status.component;
                }
                if !status.capabilities.is_empty() {
                    existing.capabilities = status.capabilities;
                }
                if status.last_failure.is_some() {
                    existing.last_failure = status.last_failure;
                }
            }
        }
    }
}
