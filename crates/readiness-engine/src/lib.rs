//! Statistical regression engine behind component readiness reports.
//!
//! Given a base (historical) window of test outcomes and a sample (recent)
//! window, the engine decides per (test × variant combination) whether the
//! sample shows a statistically significant pass-rate regression, then
//! aggregates the verdicts into a matrix of component rows × variant
//! columns. A second path drills a single test down to per-job and
//! per-job-run detail with the same analysis semantics.
//!
//! The analytical store, component ownership mapping, side database, and
//! cache are all injected capabilities; nothing in here talks to a concrete
//! backend.

pub mod analysis;
pub mod cache;
pub mod cancel;
pub mod details;
pub mod errors;
pub mod fingerprint;
pub mod generator;
pub mod middleware;
pub mod normalize;
pub mod query;
pub mod report;
pub mod storage;
pub mod views;

pub use cache::{Cache, InMemoryCache};
pub use cancel::CancellationToken;
pub use errors::{EngineError, Result};
pub use generator::ReportGenerator;
pub use middleware::Middleware;
pub use query::{ComponentMapper, QueryClient};
pub use storage::RegressionStore;
pub use views::ViewResolver;
