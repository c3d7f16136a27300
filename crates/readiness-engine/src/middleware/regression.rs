//! Regression-tracking middleware: annotates regressed verdicts with the
//! tracker's open record for that test, so callers can see when the
//! regression was first detected.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, warn};

use readiness_types::{JobVariants, RequestOptions, TestComparison, TestKey, TestRegression};

use crate::cancel::CancellationToken;
use crate::errors::Result;
use crate::middleware::Middleware;
use crate::query::StatusDelta;
use crate::storage::RegressionStore;

pub struct RegressionTracking {
    store: Arc<dyn RegressionStore>,
    sample_release: String,
    loaded: Mutex<Vec<TestRegression>>,
}

impl RegressionTracking {
    pub fn new(store: Arc<dyn RegressionStore>, req: &RequestOptions) -> Self {
        Self {
            store,
            sample_release: req.sample_release.release.clone(),
            loaded: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Middleware for RegressionTracking {
    fn name(&self) -> &'static str {
        "regression-tracking"
    }

    async fn query(
        &self,
        _all_job_variants: &JobVariants,
        _req: &RequestOptions,
        _cancel: &CancellationToken,
    ) -> Result<Option<StatusDelta>> {
        match self.store.open_regressions(&self.sample_release).await {
            Ok(regressions) => {
                debug!(count = regressions.len(), "loaded open regressions");
                *self.loaded.lock().unwrap_or_else(|e| e.into_inner()) = regressions;
            }
            Err(err) => {
                warn!(error = %err, "regression store unavailable, continuing without records");
            }
        }
        Ok(None)
    }

    fn post_analysis(&self, key: &TestKey, cmp: &mut TestComparison) -> Result<()> {
        if !cmp.status.is_regressed() {
            return Ok(());
        }
        let loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = loaded
            .iter()
            .find(|r| r.matches(&key.test_id, &key.variants))
        {
            cmp.regression = Some(record.clone());
        }
        Ok(())
    }
}
