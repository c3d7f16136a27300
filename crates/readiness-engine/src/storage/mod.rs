//! Optional side-database capability. When a deployment has no side
//! database the engine runs without these annotations; store failures on
//! this path degrade to "no annotations", never to request errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use readiness_types::{TestRegression, Triage};

use crate::errors::Result;

#[async_trait]
pub trait RegressionStore: Send + Sync {
    /// Regressions the tracker currently has open for a release.
    async fn open_regressions(&self, release: &str) -> Result<Vec<TestRegression>>;

    /// Triage records whose matched failures intersect the given window.
    async fn triages(
        &self,
        release: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Triage>>;
}
