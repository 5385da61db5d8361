use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use log::{debug, info, warn};
use probe_models::{FailureReason, ProbeOutcome, ProbeSummary, RunSummary};
use serde::Serialize;
use sip_crab::helpers::stop::until_stopped;
use tokio::net::lookup_host;
use tokio_util::sync::CancellationToken;

use crate::error::SetupError;
use crate::sip_message::{TokenSource, DEFAULT_SENDER};
use crate::transaction::{self, Attempt, LocalIpSource, Target, TransactionParams};

pub const DEFAULT_PORT: u16 = 5060;
pub const DEFAULT_ATTEMPTS: u32 = 5;
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Args, Clone, Debug)]
#[group(id = "scheduler")]
pub struct Params {
    /// SIP port of the destination
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "SIP_PORT")]
    port: u16,

    /// How many OPTIONS requests to send
    #[arg(short = 'c', long = "count", default_value_t = DEFAULT_ATTEMPTS, env = "PROBE_COUNT")]
    attempts: u32,

    /// Pause between a reply (or timeout) and the next request
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MS, env = "PROBE_INTERVAL_MS")]
    interval_ms: u64,

    /// How long to wait for a reply before counting the request as lost
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_MS, env = "PROBE_TIMEOUT_MS")]
    timeout_ms: u64,

    /// Address to put in the Via header. By default, the local hostname is resolved
    #[arg(long, env = "PROBE_LOCAL_IP")]
    local_ip: Option<IpAddr>,

    /// Name to resolve for the Via header address instead of the local hostname
    #[arg(long, env = "PROBE_LOCAL_HOST", conflicts_with = "local_ip")]
    local_host: Option<String>,

    /// Identity (user@domain) used for the From and Contact headers
    #[arg(long, default_value = DEFAULT_SENDER)]
    sender: String,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub port: u16,
    pub attempts: u32,
    pub interval: Duration,
    pub timeout: Duration,
    pub local_ip: LocalIpSource,
    pub sender: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            attempts: DEFAULT_ATTEMPTS,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            local_ip: LocalIpSource::Hostname,
            sender: DEFAULT_SENDER.to_string(),
        }
    }
}

impl From<Params> for RunConfig {
    fn from(params: Params) -> Self {
        Self {
            port: params.port,
            attempts: params.attempts,
            interval: Duration::from_millis(params.interval_ms),
            timeout: Duration::from_millis(params.timeout_ms),
            local_ip: match (params.local_ip, params.local_host) {
                (Some(ip), _) => LocalIpSource::Fixed(ip),
                (None, Some(host)) => LocalIpSource::Named(host),
                (None, None) => LocalIpSource::Hostname,
            },
            sender: params.sender,
        }
    }
}

impl RunConfig {
    fn transaction_params(&self) -> TransactionParams {
        TransactionParams {
            timeout: self.timeout,
            local_ip: self.local_ip.clone(),
            sender: self.sender.clone(),
        }
    }
}

/// Gets told about every finished attempt, in order, as soon as it is known.
pub trait ProbeObserver {
    fn on_outcome(&mut self, seq: u32, outcome: &ProbeOutcome);
}

#[derive(Debug, Serialize)]
pub struct RunResult {
    /// Stopped by a signal before all attempts were made
    pub interrupted: bool,
    pub summary: RunSummary,
}

/// Resolves the destination once, before anything is sent. IPv4 is preferred if available.
pub async fn resolve_target(destination: &str, port: u16) -> Result<Target, SetupError> {
    let addrs: Vec<SocketAddr> = lookup_host((destination, port))
        .await
        .map_err(|source| SetupError::DestinationResolution {
            host: destination.to_string(),
            source,
        })?
        .collect();
    debug!("Destination {} resolves to {:?}", destination, addrs);
    let addr = addrs.iter()
        .find(|it| it.is_ipv4())
        .or_else(|| addrs.first())
        .ok_or_else(|| SetupError::NoAddress { host: destination.to_string() })?;
    Ok(Target { host: destination.to_string(), addr: *addr })
}

/// Sends `config.attempts` probes to `target`, one after another. Only errors that make the
/// whole run pointless are returned; lost probes are part of the summary.
pub async fn run(
    target: &Target,
    config: &RunConfig,
    stop_rx: &CancellationToken,
    observer: &mut impl ProbeObserver,
) -> Result<RunResult> {
    info!("Probing {} ({}) {} times", target.host, target.addr, config.attempts);
    let params = config.transaction_params();
    let mut tokens = TokenSource::new();
    let mut summary = ProbeSummary::new();

    for seq in 0..config.attempts {
        let outcome = match transaction::execute(target, &params, &mut tokens, stop_rx).await {
            Attempt::Completed(it) => it,
            Attempt::Interrupted => return Ok(finish(summary, true)),
        };
        observer.on_outcome(seq, &outcome);
        summary.record(&outcome);

        // every following attempt would fail the same way
        if let ProbeOutcome::Failure { reason: FailureReason::NameResolution { host } } = &outcome {
            return Err(SetupError::LocalResolution { host: host.clone() }.into());
        }

        let is_last = seq + 1 == config.attempts;
        if !is_last && until_stopped(stop_rx, tokio::time::sleep(config.interval)).await.is_none() {
            return Ok(finish(summary, true));
        }
    }
    Ok(finish(summary, false))
}

fn finish(summary: ProbeSummary, interrupted: bool) -> RunResult {
    if interrupted {
        info!("Stopped after {} of the planned attempts", summary.attempted());
    }
    let summary = summary.finalize();
    if let RunSummary::Finished(finished) = &summary {
        if finished.transport_always_failed {
            warn!(
                "All {} attempts failed with a transport error, this is likely an issue with \
                the local network environment rather than the destination",
                finished.attempted
            );
        }
    }
    RunResult { interrupted, summary }
}
