// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod rank;
pub mod record;
pub mod report;
pub mod score;

// ---- Re-exports for stable public API ----
pub use crate::config::{Config, MatchMode};
pub use crate::fetch::types::{FetchError, FundingSource, SourceReport};
pub use crate::pipeline::{run, RunReport, RunSummary};
pub use crate::record::{Amount, CanonicalRecord, Deadline, RawRecord, ScoredRecord};
pub use crate::report::{CsvExporter, ReportSink};
pub use crate::score::Scorer;
