//! Data model for component readiness regression reports.
//!
//! Everything here is a plain serializable value: test counts and keys as
//! they come back from the analytical store, the request options that shape
//! a report, and the report JSON returned to callers. No I/O lives in this
//! crate; the engine crate consumes these types.

pub mod key;
pub mod report;
pub mod request;
pub mod stats;
pub mod status;
pub mod triage;

pub use key::{ColumnIdentification, Identification, RowIdentification, TestKey};
pub use report::{
    ComponentReport, JobRunStatuses, JobRunStats, JobStats, JobVariants, ReleaseStats,
    ReportColumn, ReportRow, ReportTestSummary, TestComparison, TestDetailsAnalysis,
    TestDetailsReport, TestJobRunRow, TestStatus,
};
pub use request::{
    AdvancedOptions, CacheOptions, RelativeReleaseOptions, ReleaseOptions, RequestOptions,
    TestIdentificationOptions, VariantOptions, View,
};
pub use stats::{Count, Stats};
pub use status::{Comparison, Status};
pub use triage::{TestRegression, Triage, TriagedFailure};
