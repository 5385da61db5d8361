pub mod outcome;
pub mod summary;

pub use outcome::{FailureReason, ProbeOutcome};
pub use summary::{FinishedSummary, ProbeSummary, RttStats, RunSummary};

