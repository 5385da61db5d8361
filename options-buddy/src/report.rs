use anyhow::{Context, Result};
use probe_models::{ProbeOutcome, RunSummary};

use crate::schedule::{ProbeObserver, RunResult};
use crate::transaction::Target;

/// Prints one line per attempt to stdout. Quiet in JSON mode, so that stdout stays parseable.
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ProbeObserver for ConsoleReporter {
    fn on_outcome(&mut self, _seq: u32, outcome: &ProbeOutcome) {
        if !self.quiet {
            println!("{}", attempt_line(outcome));
        }
    }
}

pub fn header_line(target: &Target) -> String {
    format!("Sending SIP OPTIONS request to {} ({})", target.host, target.addr)
}

pub fn attempt_line(outcome: &ProbeOutcome) -> String {
    match outcome {
        ProbeOutcome::Success { .. } => {
            format!("Reply received: {:.2}ms", outcome.rtt_millis().unwrap_or_default())
        }
        ProbeOutcome::Failure { reason } => format!("Request failed: {}", reason),
    }
}

pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let finished = match summary {
        RunSummary::Empty => return vec![String::new(), "No responses received.".to_string()],
        RunSummary::Finished(it) => it,
    };
    let mut lines = vec![
        String::new(),
        "----- Summary -----".to_string(),
        format!(
            "{} packets sent, {} received, {:.2}% packet loss",
            finished.attempted, finished.succeeded, finished.loss_percentage
        ),
    ];
    if let Some(rtt) = &finished.rtt {
        lines.push(format!(
            "rtt min/max/avg, {:.2}/{:.2}/{:.2} ms",
            rtt.min_ms, rtt.max_ms, rtt.avg_ms
        ));
    }
    lines
}

pub fn print_result(result: &RunResult, json: bool) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(result)
            .context("Failed to serialise summary")?;
        println!("{}", rendered);
        return Ok(());
    }
    if result.interrupted {
        println!();
        println!("Interrupted, exiting gracefully.");
    }
    for line in summary_lines(&result.summary) {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::*;
    use assertor::*;
    use probe_models::{FailureReason, ProbeSummary};

    use super::*;

    fn summary_of(outcomes: &[ProbeOutcome]) -> RunSummary {
        let mut summary = ProbeSummary::new();
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary.finalize()
    }

    #[test]
    fn attempt_lines() -> Result<()> {
        // given
        let success = ProbeOutcome::Success { rtt: Duration::from_micros(12_346) };
        let lost = ProbeOutcome::failure(FailureReason::Timeout);

        // when, then
        assert_that!(attempt_line(&success)).is_equal_to("Reply received: 12.35ms".to_string());
        assert_that!(attempt_line(&lost)).is_equal_to("Request failed: timeout".to_string());
        Ok(())
    }

    #[test]
    fn all_replies_summary() -> Result<()> {
        // given
        let outcomes: Vec<ProbeOutcome> = [10, 20, 30, 40, 50].iter()
            .map(|millis| ProbeOutcome::Success { rtt: Duration::from_millis(*millis) })
            .collect();

        // when
        let lines = summary_lines(&summary_of(&outcomes));

        // then
        assert_that!(lines).is_equal_to(vec![
            String::new(),
            "----- Summary -----".to_string(),
            "5 packets sent, 5 received, 0.00% packet loss".to_string(),
            "rtt min/max/avg, 10.00/50.00/30.00 ms".to_string(),
        ]);
        Ok(())
    }

    #[test]
    fn no_replies_summary_has_no_rtt_line() -> Result<()> {
        // given
        let outcomes = vec![ProbeOutcome::failure(FailureReason::Timeout); 3];

        // when
        let lines = summary_lines(&summary_of(&outcomes));

        // then
        assert_that!(lines.last().map(String::as_str))
            .is_equal_to(Some("3 packets sent, 0 received, 100.00% packet loss"));
        assert_that!(lines.iter().any(|it| it.starts_with("rtt"))).is_false();
        Ok(())
    }

    #[test]
    fn empty_summary() -> Result<()> {
        // given, when
        let lines = summary_lines(&RunSummary::Empty);

        // then
        assert_that!(lines.last().map(String::as_str)).is_equal_to(Some("No responses received."));
        assert_that!(lines.iter().any(|it| it.contains("packets sent"))).is_false();
        Ok(())
    }

    #[test]
    fn header_names_destination_and_address() -> Result<()> {
        // given
        let target = Target { host: "pbx.example.org".to_string(), addr: "192.0.2.5:5060".parse()? };

        // when
        let line = header_line(&target);

        // then
        assert_that!(line)
            .is_equal_to("Sending SIP OPTIONS request to pbx.example.org (192.0.2.5:5060)".to_string());
        Ok(())
    }
}
