use itertools::Itertools;
use serde::Serialize;

use crate::{FailureReason, ProbeOutcome};

/// Running tally of a probe run. Outcomes are folded in one by one via [ProbeSummary::record];
/// statistics are only computed once, by [ProbeSummary::finalize].
#[derive(Debug, Default, Clone)]
pub struct ProbeSummary {
    attempted: u32,
    succeeded: u32,
    failed: u32,
    transport_failures: u32,
    rtts_ms: Vec<f64>,
}

impl ProbeSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &ProbeOutcome) {
        self.attempted += 1;
        match outcome {
            ProbeOutcome::Success { .. } => {
                self.succeeded += 1;
                if let Some(rtt) = outcome.rtt_millis() {
                    self.rtts_ms.push(rtt);
                }
            }
            ProbeOutcome::Failure { reason } => {
                self.failed += 1;
                if let FailureReason::Transport(_) = reason {
                    self.transport_failures += 1;
                }
            }
        }
    }

    pub fn attempted(&self) -> u32 {
        self.attempted
    }

    pub fn succeeded(&self) -> u32 {
        self.succeeded
    }

    pub fn failed(&self) -> u32 {
        self.failed
    }

    /// Successful round-trip times in milliseconds, in the order they were recorded.
    pub fn rtts_ms(&self) -> &[f64] {
        &self.rtts_ms
    }

    pub fn finalize(self) -> RunSummary {
        if self.attempted == 0 {
            return RunSummary::Empty;
        }
        let loss_percentage =
            f64::from(self.attempted - self.succeeded) / f64::from(self.attempted) * 100f64;
        RunSummary::Finished(FinishedSummary {
            attempted: self.attempted,
            succeeded: self.succeeded,
            failed: self.failed,
            loss_percentage,
            rtt: RttStats::compute(&self.rtts_ms),
            transport_always_failed: self.transport_failures == self.attempted,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunSummary {
    /// Nothing was attempted at all, e.g. interrupted before the first probe went out.
    Empty,
    Finished(FinishedSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishedSummary {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub loss_percentage: f64,
    /// Absent iff no probe succeeded.
    pub rtt: Option<RttStats>,
    /// Every single attempt hit a socket-level fault, which hints at the local environment.
    pub transport_always_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RttStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

impl RttStats {
    fn compute(rtts_ms: &[f64]) -> Option<Self> {
        let (min_ms, max_ms) = rtts_ms.iter().copied().minmax().into_option()?;
        let avg_ms = rtts_ms.iter().sum::<f64>() / rtts_ms.len() as f64;
        Some(Self { min_ms, max_ms, avg_ms })
    }
}
