//! The middleware chain: an ordered list of hooks that extends the engine
//! without growing the core paths.
//!
//! Hooks fire at four points: `query` (contribute extra base/sample rows,
//! concurrently with the built-in queries), `pre_analysis` (adjust inputs
//! and thresholds before the kernel), `post_analysis` (adjust verdicts
//! after it; this runs outside report caching so annotations stay fresh),
//! and `pre_test_details_analysis` (adjust per-run rows on the details
//! path). Order is significant and fixed at construction: release fallback
//! runs before triage so triage annotates the final counts. There is no
//! global registration.

pub mod fallback;
pub mod regression;
pub mod triage;

use async_trait::async_trait;

use readiness_types::{JobRunStatuses, JobVariants, RequestOptions, TestComparison, TestKey};

use crate::cancel::CancellationToken;
use crate::errors::Result;
use crate::query::StatusDelta;

/// One middleware. Every hook has a no-op default; implementations
/// override what they need. Hooks take the comparison by exclusive
/// reference and must not retain it beyond the call.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    /// Contribute additional base/sample status, running concurrently with
    /// the built-in queries. Counts for duplicate keys are summed.
    async fn query(
        &self,
        _all_job_variants: &JobVariants,
        _req: &RequestOptions,
        _cancel: &CancellationToken,
    ) -> Result<Option<StatusDelta>> {
        Ok(None)
    }

    /// Load data the details path will need later.
    async fn query_test_details(
        &self,
        _all_job_variants: &JobVariants,
        _req: &RequestOptions,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    /// Adjust comparison inputs (base stats, confidence, tolerances) before
    /// the kernel runs.
    fn pre_analysis(&self, _key: &TestKey, _cmp: &mut TestComparison) -> Result<()> {
        Ok(())
    }

    /// Adjust the verdict after the kernel: downgrade triaged regressions,
    /// flag failed fixes, attach tracker records.
    fn post_analysis(&self, _key: &TestKey, _cmp: &mut TestComparison) -> Result<()> {
        Ok(())
    }

    /// Drop or adjust per-run rows before detail computation.
    fn pre_test_details_analysis(
        &self,
        _key: &TestKey,
        _statuses: &mut JobRunStatuses,
    ) -> Result<()> {
        Ok(())
    }
}
