use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Result of exactly one OPTIONS request/reply cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success { rtt: Duration },
    Failure { reason: FailureReason },
}

impl ProbeOutcome {
    pub fn failure(reason: FailureReason) -> Self {
        Self::Failure { reason }
    }

    /// Round-trip time in milliseconds, keeping the sub-millisecond part.
    pub fn rtt_millis(&self) -> Option<f64> {
        match self {
            Self::Success { rtt } => Some(rtt.as_nanos() as f64 / 1_000_000f64),
            Self::Failure { .. } => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    #[error("timeout")]
    Timeout,

    /// The local name could not be turned into an address for the Via header.
    /// This is a local configuration problem, not packet loss, and ends the run.
    #[error("name resolution failed")]
    NameResolution { host: String },

    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use anyhow::*;
    use assertor::*;

    use super::*;

    #[test]
    fn rtt_keeps_fraction() -> Result<()> {
        // given
        let outcome = ProbeOutcome::Success { rtt: Duration::from_micros(12_345) };

        // when
        let millis = outcome.rtt_millis();

        // then
        let millis = millis.context("success should carry an rtt")?;
        assert_that!((millis - 12.345).abs() < 1e-9).is_true();
        Ok(())
    }

    #[test]
    fn failure_has_no_rtt() -> Result<()> {
        // given
        let outcome = ProbeOutcome::failure(FailureReason::Timeout);

        // when, then
        assert_that!(outcome.rtt_millis()).is_none();
        Ok(())
    }

    #[test]
    fn reasons_display_short() -> Result<()> {
        // given
        let resolution = FailureReason::NameResolution { host: "nohost".to_string() };

        // when, then
        assert_that!(FailureReason::Timeout.to_string()).is_equal_to("timeout".to_string());
        assert_that!(resolution.to_string()).is_equal_to("name resolution failed".to_string());
        Ok(())
    }
}
