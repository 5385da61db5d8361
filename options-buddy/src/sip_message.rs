use std::borrow::Cow;
use std::net::{Ipv6Addr, SocketAddr};

use chrono::Utc;
use uuid::Uuid;

pub const DEFAULT_SENDER: &str = "random_sender@example.com";

/// RFC 3261 magic cookie plus a fixed discriminator, the per-request token is appended
const BRANCH_PREFIX: &str = "z9hG4bK4ce2.";
const FROM_TAG: &str = "73686572617A";

/// Everything that ends up in one OPTIONS request. Immutable once built, and only ever
/// used for a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub target_host: String,
    pub target_port: u16,
    /// Address + port the peer is expected to see us at, goes into the Via header.
    pub local_addr: SocketAddr,
    pub branch: u32,
    pub call_id: String,
    pub cseq: u32,
    /// `user@domain` used for From and Contact
    pub sender: String,
}

impl ProbeRequest {
    /// Draws fresh identifiers from `tokens` for a new request.
    pub fn new(
        target_host: &str,
        target_port: u16,
        local_addr: SocketAddr,
        sender: &str,
        tokens: &mut TokenSource,
    ) -> Self {
        let token = tokens.next_token();
        ProbeRequest {
            target_host: target_host.to_string(),
            target_port,
            local_addr,
            branch: token,
            call_id: TokenSource::next_call_id(),
            cseq: token,
            sender: sender.to_string(),
        }
    }

    /// Renders the wire payload. No validation happens here, garbage in, garbage out.
    pub fn to_payload(&self) -> String {
        let target = uri_host(&self.target_host);
        format!(
            "OPTIONS sip:{target}:{port} SIP/2.0\r\n\
             Via: SIP/2.0/UDP {local};branch={prefix}{branch}\r\n\
             Max-Forwards: 70\r\n\
             To: <sip:{target}:{port}>\r\n\
             From: <sip:{sender}>;tag={tag}\r\n\
             Call-ID: {call_id}\r\n\
             CSeq: {cseq} OPTIONS\r\n\
             Contact: <sip:{sender}>\r\n\
             Accept: application/sdp\r\n\
             Content-Length: 0\r\n\
             \r\n",
            target = target,
            port = self.target_port,
            local = self.local_addr,
            prefix = BRANCH_PREFIX,
            branch = self.branch,
            sender = self.sender,
            tag = FROM_TAG,
            call_id = self.call_id,
            cseq = self.cseq,
        )
    }
}

fn uri_host(host: &str) -> Cow<'_, str> {
    if host.parse::<Ipv6Addr>().is_ok() {
        Cow::Owned(format!("[{}]", host))
    } else {
        Cow::Borrowed(host)
    }
}

/// Hands out the per-request identifiers. Branch/CSeq tokens are based on the wall clock
/// (seconds since the epoch) but never repeat, even if several requests go out in the same second.
#[derive(Debug, Default)]
pub struct TokenSource {
    last: u32,
}

impl TokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token(&mut self) -> u32 {
        let now = u32::try_from(Utc::now().timestamp()).unwrap_or(0);
        let token = now.max(self.last.saturating_add(1));
        self.last = token;
        token
    }

    pub fn next_call_id() -> String {
        Uuid::new_v4().to_string()
    }
}
