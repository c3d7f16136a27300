//! End-to-end generator behavior: caching and determinism, force refresh,
//! cancellation, and post-analysis freshness on cache hits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use readiness_engine::query::{ComponentMapper, QueryClient};
use readiness_engine::storage::RegressionStore;
use readiness_engine::{Cache, CancellationToken, EngineError, InMemoryCache, ReportGenerator};
use readiness_types::{
    AdvancedOptions, Count, JobVariants, ReleaseOptions, RequestOptions, Status,
    TestIdentificationOptions, TestJobRunRow, TestKey, TestRegression, TestStatus, Triage,
    TriagedFailure, VariantOptions,
};

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, day, 0, 0, 0).unwrap()
}

fn test_key() -> TestKey {
    let mut variants = BTreeMap::new();
    variants.insert("Platform".to_string(), "aws".to_string());
    variants.insert("Network".to_string(), "ovn".to_string());
    TestKey::new("t1", variants)
}

struct CountingClient {
    status_queries: AtomicU32,
}

impl CountingClient {
    fn new() -> Self {
        Self {
            status_queries: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl QueryClient for CountingClient {
    async fn job_variants(&self) -> readiness_engine::Result<JobVariants> {
        Ok(JobVariants::default())
    }

    async fn test_status(
        &self,
        release: &ReleaseOptions,
        _req: &RequestOptions,
    ) -> readiness_engine::Result<BTreeMap<String, TestStatus>> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        let mut map = BTreeMap::new();
        let count = if release.release == "4.16" {
            Count::new(1000, 900, 10)
        } else {
            Count::new(100, 50, 1)
        };
        map.insert(
            test_key().canonical(),
            TestStatus {
                test_name: "test 1".to_string(),
                count,
                last_failure: Some(ts(8)),
                ..Default::default()
            },
        );
        Ok(map)
    }

    async fn job_run_rows(
        &self,
        _release: &ReleaseOptions,
        _test: &TestIdentificationOptions,
        _req: &RequestOptions,
    ) -> readiness_engine::Result<BTreeMap<String, Vec<TestJobRunRow>>> {
        let mut rows = Vec::new();
        for i in 0..10u32 {
            rows.push(TestJobRunRow {
                test_id: "t1".to_string(),
                test_name: "test 1".to_string(),
                prowjob_name: "job-1".to_string(),
                prowjob_run_id: format!("run-{i}"),
                count: Count::new(1, u32::from(i > 1), 0),
                ..Default::default()
            });
        }
        let mut map = BTreeMap::new();
        map.insert("job-1".to_string(), rows);
        Ok(map)
    }
}

struct StaticMapper;

impl ComponentMapper for StaticMapper {
    fn component_and_capabilities(
        &self,
        _key: &TestKey,
        _status: &TestStatus,
    ) -> (String, Vec<String>) {
        ("component 1".to_string(), vec!["cap1".to_string()])
    }
}

fn request() -> RequestOptions {
    let mut column_group_by = std::collections::BTreeSet::new();
    column_group_by.insert("Platform".to_string());
    column_group_by.insert("Network".to_string());
    RequestOptions {
        base_release: ReleaseOptions {
            release: "4.16".to_string(),
            start: Some(ts(1)),
            end: Some(ts(5)),
        },
        sample_release: ReleaseOptions {
            release: "4.17".to_string(),
            start: Some(ts(6)),
            end: Some(ts(10)),
        },
        variant_option: VariantOptions {
            column_group_by,
            ..Default::default()
        },
        advanced_option: AdvancedOptions::default(),
        ..Default::default()
    }
}

fn generator(
    client: Arc<CountingClient>,
    cache: Arc<dyn Cache>,
    req: RequestOptions,
) -> ReportGenerator {
    ReportGenerator::new(client, Arc::new(StaticMapper), cache, req)
}

#[tokio::test]
async fn repeated_requests_hit_the_cache_and_match_byte_for_byte() {
    let client = Arc::new(CountingClient::new());
    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
    let generator = generator(client.clone(), cache, request());
    let cancel = CancellationToken::new();

    let first = generator.component_report(ts(10), &cancel).await.unwrap();
    assert_eq!(client.status_queries.load(Ordering::SeqCst), 2);
    assert_eq!(first.rows[0].columns[0].status, Status::ExtremeRegression);

    let second = generator.component_report(ts(10), &cancel).await.unwrap();
    // Served from cache: no new store queries, identical bytes.
    assert_eq!(client.status_queries.load(Ordering::SeqCst), 2);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[tokio::test]
async fn force_refresh_bypasses_the_read_but_still_writes() {
    let client = Arc::new(CountingClient::new());
    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());

    let mut req = request();
    req.cache_option.force_refresh = true;
    let refreshing = generator(client.clone(), cache.clone(), req);
    let cancel = CancellationToken::new();
    refreshing.component_report(ts(10), &cancel).await.unwrap();
    refreshing.component_report(ts(10), &cancel).await.unwrap();
    // Both runs queried the store.
    assert_eq!(client.status_queries.load(Ordering::SeqCst), 4);

    // A non-refreshing generator finds the entry the refresher wrote.
    let reading = generator(client.clone(), cache, request());
    reading.component_report(ts(10), &cancel).await.unwrap();
    assert_eq!(client.status_queries.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn cancelled_requests_yield_cancelled() {
    let client = Arc::new(CountingClient::new());
    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
    let generator = generator(client, cache, request());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = generator
        .component_report(ts(10), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
}

struct TriageStore {
    resolution: Option<DateTime<Utc>>,
}

#[async_trait]
impl RegressionStore for TriageStore {
    async fn open_regressions(
        &self,
        _release: &str,
    ) -> readiness_engine::Result<Vec<TestRegression>> {
        Ok(vec![TestRegression {
            release: "4.17".to_string(),
            test_id: "t1".to_string(),
            opened: ts(7),
            ..Default::default()
        }])
    }

    async fn triages(
        &self,
        _release: &str,
        _start: Option<DateTime<Utc>>,
        _end: Option<DateTime<Utc>>,
    ) -> readiness_engine::Result<Vec<Triage>> {
        let matched_failures = (0..49)
            .map(|_| TriagedFailure {
                test_id: "t1".to_string(),
                variants: BTreeMap::new(),
                started_at: ts(7),
            })
            .collect();
        Ok(vec![Triage {
            id: 1,
            resolution: self.resolution,
            matched_failures,
            ..Default::default()
        }])
    }
}

#[tokio::test]
async fn triage_annotations_apply_even_on_cache_hits() {
    let client = Arc::new(CountingClient::new());
    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
    let generator_cache = cache.clone();
    let store: Arc<dyn RegressionStore> = Arc::new(TriageStore { resolution: None });
    let generator = ReportGenerator::new(
        client.clone(),
        Arc::new(StaticMapper),
        cache,
        request(),
    )
    .with_default_middleware(Some(store), Vec::new());
    let cancel = CancellationToken::new();

    let first = generator.component_report(ts(10), &cancel).await.unwrap();
    // All 49 sample failures are triaged, so the extreme regression is
    // downgraded and the tracker record is attached.
    let column = &first.rows[0].columns[0];
    assert_eq!(column.status, Status::ExtremeTriagedRegression);
    let regressed = &column.regressed_tests[0];
    assert_eq!(regressed.comparison.regression.as_ref().unwrap().opened, ts(7));

    // A fresh generator serving the cache hit reloads its triage state and
    // re-applies the downgrade to the cached pre-annotation report.
    let fresh_store: Arc<dyn RegressionStore> = Arc::new(TriageStore { resolution: None });
    let fresh = ReportGenerator::new(
        client.clone(),
        Arc::new(StaticMapper),
        generator_cache,
        request(),
    )
    .with_default_middleware(Some(fresh_store), Vec::new());
    let second = fresh.component_report(ts(10), &cancel).await.unwrap();
    assert_eq!(client.status_queries.load(Ordering::SeqCst), 2);
    assert_eq!(
        second.rows[0].columns[0].status,
        Status::ExtremeTriagedRegression
    );
}

#[tokio::test]
async fn resolved_triage_with_later_failures_is_failed_fixed() {
    let client = Arc::new(CountingClient::new());
    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
    // Resolved on day 7 but the sample's last failure is day 8.
    let store: Arc<dyn RegressionStore> = Arc::new(TriageStore {
        resolution: Some(ts(7)),
    });
    let generator = ReportGenerator::new(
        client,
        Arc::new(StaticMapper),
        cache,
        request(),
    )
    .with_default_middleware(Some(store), Vec::new());
    let cancel = CancellationToken::new();

    let report = generator.component_report(ts(10), &cancel).await.unwrap();
    assert_eq!(
        report.rows[0].columns[0].status,
        Status::FailedFixedRegression
    );
}

struct DecayingBaseClient;

#[async_trait]
impl QueryClient for DecayingBaseClient {
    async fn job_variants(&self) -> readiness_engine::Result<JobVariants> {
        Ok(JobVariants::default())
    }

    async fn test_status(
        &self,
        release: &ReleaseOptions,
        _req: &RequestOptions,
    ) -> readiness_engine::Result<BTreeMap<String, TestStatus>> {
        // The configured base (4.16) had already degraded; 4.15 was strict.
        let count = match release.release.as_str() {
            "4.15" => Count::new(1000, 990, 0),
            "4.16" => Count::new(1000, 700, 0),
            _ => Count::new(100, 70, 0),
        };
        let mut map = BTreeMap::new();
        map.insert(
            test_key().canonical(),
            TestStatus {
                test_name: "test 1".to_string(),
                count,
                ..Default::default()
            },
        );
        Ok(map)
    }

    async fn job_run_rows(
        &self,
        _release: &ReleaseOptions,
        _test: &TestIdentificationOptions,
        _req: &RequestOptions,
    ) -> readiness_engine::Result<BTreeMap<String, Vec<TestJobRunRow>>> {
        Ok(BTreeMap::new())
    }
}

#[tokio::test]
async fn multi_release_fallback_promotes_a_stricter_basis() {
    let mut req = request();
    req.advanced_option.include_multi_release_analysis = true;
    let generator = ReportGenerator::new(
        Arc::new(DecayingBaseClient),
        Arc::new(StaticMapper),
        Arc::new(InMemoryCache::new()),
        req,
    )
    .with_default_middleware(None, vec![ReleaseOptions::new("4.15")]);
    let cancel = CancellationToken::new();

    let report = generator.component_report(ts(10), &cancel).await.unwrap();
    // Against the degraded 4.16 base (70%) the 70% sample would pass; the
    // promoted 4.15 basis (99%) flags the extreme regression.
    let column = &report.rows[0].columns[0];
    assert_eq!(column.status, Status::ExtremeRegression);
    let regressed = &column.regressed_tests[0];
    let base = regressed.comparison.base_stats.as_ref().unwrap();
    assert_eq!(base.release, "4.15");
    assert_eq!(base.stats.success_count, 990);
    assert!(regressed
        .comparison
        .explanations
        .iter()
        .any(|e| e.contains("release 4.15")));
}

#[tokio::test]
async fn details_report_runs_per_test_identification() {
    let client = Arc::new(CountingClient::new());
    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
    let mut req = request();
    req.test_id_options = vec![TestIdentificationOptions {
        component: "component 1".to_string(),
        test_id: "t1".to_string(),
        ..Default::default()
    }];
    let generator = generator(client, cache, req);
    let cancel = CancellationToken::new();

    let reports = generator.test_details_report(ts(10), &cancel).await.unwrap();
    assert_eq!(reports.len(), 1);
    let analysis = &reports[0].analyses[0];
    assert_eq!(analysis.job_stats.len(), 1);
    assert_eq!(analysis.job_stats[0].sample_job_run_stats.len(), 10);
    assert_eq!(analysis.job_stats[0].base_job_run_stats.len(), 10);

    let empty = ReportGenerator::new(
        Arc::new(CountingClient::new()),
        Arc::new(StaticMapper),
        Arc::new(InMemoryCache::new()),
        request(),
    );
    let err = empty.test_details_report(ts(10), &cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
}
