use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use log::{debug, trace};
use probe_models::{FailureReason, ProbeOutcome};
use sip_crab::helpers::stop::until_stopped;
use tokio::net::{lookup_host, UdpSocket};
use tokio_util::sync::CancellationToken;

use crate::sip_message::{ProbeRequest, TokenSource};

/// Content is never inspected, any datagram counts as a reply. Longer ones are truncated.
const RECV_BUFFER_SIZE: usize = 4096;

/// A destination that was already resolved; `host` is kept as given for the request URI.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub addr: SocketAddr,
}

/// Where the address advertised in the Via header comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalIpSource {
    /// Resolve our own hostname, like a peer on the same network would.
    Hostname,
    /// Resolve this name instead, e.g. the public name of a multi-homed host.
    Named(String),
    Fixed(IpAddr),
}

#[derive(Debug, Clone)]
pub struct TransactionParams {
    pub timeout: Duration,
    pub local_ip: LocalIpSource,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Completed(ProbeOutcome),
    /// Stop was requested before the transaction finished. Nothing is recorded for it.
    Interrupted,
}

/// Runs exactly one OPTIONS request/reply cycle. All per-attempt problems end up as a
/// [ProbeOutcome::Failure]; the socket lives only as long as this call.
pub async fn execute(
    target: &Target,
    params: &TransactionParams,
    tokens: &mut TokenSource,
    stop_rx: &CancellationToken,
) -> Attempt {
    match until_stopped(stop_rx, exchange(target, params, tokens)).await {
        Some(Ok(rtt)) => Attempt::Completed(ProbeOutcome::Success { rtt }),
        Some(Err(reason)) => Attempt::Completed(ProbeOutcome::failure(reason)),
        None => Attempt::Interrupted,
    }
}

async fn exchange(
    target: &Target,
    params: &TransactionParams,
    tokens: &mut TokenSource,
) -> Result<Duration, FailureReason> {
    let socket = UdpSocket::bind(wildcard_for(target.addr))
        .await
        .map_err(|e| transport("binding local socket", e))?;
    let local_port = socket.local_addr()
        .map_err(|e| transport("reading local socket address", e))?
        .port();
    let local_ip = resolve_local_ip(&params.local_ip, target.addr).await?;

    let request = ProbeRequest::new(
        &target.host,
        target.addr.port(),
        SocketAddr::new(local_ip, local_port),
        &params.sender,
        tokens,
    );
    let payload = request.to_payload();
    trace!("Sending to {}:\n{}", target.addr, payload);

    let started = Instant::now();
    socket.send_to(payload.as_bytes(), target.addr)
        .await
        .map_err(|e| transport("sending request", e))?;

    let mut buf = [0u8; RECV_BUFFER_SIZE];
    match tokio::time::timeout(params.timeout, socket.recv_from(&mut buf)).await {
        Ok(Ok((len, from))) => {
            let rtt = started.elapsed().min(params.timeout);
            debug!("Received {} bytes from {} after {:?}", len, from, rtt);
            Ok(rtt)
        }
        Ok(Err(e)) => Err(transport("receiving reply", e)),
        Err(_) => Err(FailureReason::Timeout),
    }
}

fn transport(action: &str, err: io::Error) -> FailureReason {
    debug!("Transport error while {}: {}", action, err);
    FailureReason::Transport(format!("{}: {}", action, err))
}

fn wildcard_for(target: SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
}

async fn resolve_local_ip(source: &LocalIpSource, target: SocketAddr) -> Result<IpAddr, FailureReason> {
    match source {
        LocalIpSource::Hostname => resolve_own_hostname(target).await,
        LocalIpSource::Named(host) => resolve_host_ip(host, target).await,
        LocalIpSource::Fixed(ip) => Ok(*ip),
    }
}

async fn resolve_own_hostname(target: SocketAddr) -> Result<IpAddr, FailureReason> {
    let host = nix::unistd::gethostname()
        .map_err(|e| {
            debug!("Unable to read local hostname: {}", e);
            FailureReason::NameResolution { host: String::new() }
        })?
        .to_string_lossy()
        .into_owned();
    resolve_host_ip(&host, target).await
}

async fn resolve_host_ip(host: &str, target: SocketAddr) -> Result<IpAddr, FailureReason> {
    let resolution_failed = || FailureReason::NameResolution { host: host.to_string() };
    let candidates: Vec<SocketAddr> = lookup_host((host, 0))
        .await
        .map_err(|e| {
            debug!("Unable to resolve local name {}: {}", host, e);
            resolution_failed()
        })?
        .collect();
    trace!("Local name {} resolves to {:?}", host, candidates);
    pick_same_family(&candidates, target).ok_or_else(resolution_failed)
}

/// Prefers an address the target can actually talk back to, falls back to whatever came first.
fn pick_same_family(candidates: &[SocketAddr], target: SocketAddr) -> Option<IpAddr> {
    candidates.iter()
        .find(|it| it.is_ipv4() == target.is_ipv4())
        .or_else(|| candidates.first())
        .map(|it| it.ip())
}
