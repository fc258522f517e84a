use relaytrace_grammar::{SplitNode, combine, split};
use tracing::warn;

use crate::error::ProvenanceError;
use crate::headers::HeaderSource;
use crate::ip;
use crate::policy::{ForwardedKind, ProxyPolicy};

/// Transport-level facts about how the request reached this process.
///
/// These are what the resolver falls back to when no trusted forwarding
/// header applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Address of the direct peer, when known.
    pub peer_ip: Option<String>,
    /// Server name configured for the listener, used as the last host
    /// fallback.
    pub server_name: Option<String>,
    /// Local port the request arrived on.
    pub server_port: u16,
    /// Whether the local connection itself is TLS.
    pub secure: bool,
}

/// Outcome of a one-shot validation on this request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Validation {
    #[default]
    Unchecked,
    Accepted,
    Rejected,
}

/// Per-request violation state.
///
/// Each field moves from `Unchecked` to `Accepted` or `Rejected` at most
/// once. After a rejection the corresponding accessor stops raising and
/// returns its degraded fallback instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestProvenanceState {
    pub host: Validation,
    pub forwarded: Validation,
}

/// Resolves a request's client IPs, host, port and scheme from forwarding
/// headers, honoring the trust decisions in a [`ProxyPolicy`].
///
/// One resolver is built per request and owns that request's
/// [`RequestProvenanceState`]; the policy and headers are borrowed.
#[derive(Debug)]
pub struct ProvenanceResolver<'a, H: HeaderSource> {
    policy: &'a ProxyPolicy,
    headers: &'a H,
    conn: ConnectionInfo,
    state: RequestProvenanceState,
}

impl<'a, H: HeaderSource> ProvenanceResolver<'a, H> {
    pub fn new(policy: &'a ProxyPolicy, headers: &'a H, conn: ConnectionInfo) -> Self {
        Self {
            policy,
            headers,
            conn,
            state: RequestProvenanceState::default(),
        }
    }

    pub fn state(&self) -> RequestProvenanceState {
        self.state
    }

    /// Whether the direct peer matches a configured trusted proxy. Only then
    /// are any forwarding headers consulted.
    pub fn is_from_trusted_proxy(&self) -> bool {
        match self.conn.peer_ip.as_deref() {
            Some(peer) => self.policy.matches_proxy(peer, Some(peer)),
            None => false,
        }
    }

    /// The client IP chain, closest to the origin client first.
    ///
    /// For an untrusted peer this is always just the peer address, whatever
    /// forwarding headers the request carries.
    pub fn client_ips(&mut self) -> Result<Vec<String>, ProvenanceError> {
        let peer: Vec<String> = self.conn.peer_ip.iter().cloned().collect();
        if !self.is_from_trusted_proxy() {
            return Ok(peer);
        }

        let ip = self.conn.peer_ip.clone();
        let chain = self.trusted_values(ForwardedKind::For, ip.as_deref())?;
        if chain.is_empty() {
            Ok(peer)
        } else {
            Ok(chain)
        }
    }

    /// The single most relevant client IP, the first entry of
    /// [`client_ips`](Self::client_ips).
    pub fn client_ip(&mut self) -> Result<Option<String>, ProvenanceError> {
        Ok(self.client_ips()?.into_iter().next())
    }

    /// The request host, lowercased and without any port suffix.
    ///
    /// Precedence: trusted forwarded host, then the `Host` header, then the
    /// listener's server name. The result is validated against the RFC
    /// 952/2181 character set and, when the policy carries trusted-host
    /// patterns, against those patterns. Violations raise once per request
    /// and degrade to `""` afterwards.
    pub fn host(&mut self) -> Result<String, ProvenanceError> {
        let mut host = None;
        if self.is_from_trusted_proxy() {
            host = self
                .trusted_values(ForwardedKind::Host, None)?
                .into_iter()
                .next();
        }
        let host = match host {
            Some(h) => h,
            None => self
                .headers
                .get("Host")
                .map(str::to_string)
                .or_else(|| self.conn.server_name.clone())
                .unwrap_or_default(),
        };

        let host = strip_port_suffix(host.trim()).to_lowercase();

        if !host.is_empty() && !host_chars_valid(&host) {
            if self.state.host == Validation::Rejected {
                return Ok(String::new());
            }
            self.state.host = Validation::Rejected;
            warn!(host = %host, "rejecting host with forbidden characters");
            return Err(ProvenanceError::SuspiciousOperation(format!(
                "invalid host \"{host}\""
            )));
        }

        if self.policy.has_trusted_host_patterns() && !self.policy.is_host_trusted(&host) {
            if self.state.host == Validation::Rejected {
                return Ok(String::new());
            }
            self.state.host = Validation::Rejected;
            warn!(host = %host, "rejecting host matching no trusted pattern");
            return Err(ProvenanceError::SuspiciousOperation(format!(
                "untrusted host \"{host}\""
            )));
        }

        if self.state.host == Validation::Unchecked {
            self.state.host = Validation::Accepted;
        }
        Ok(host)
    }

    /// The request port.
    ///
    /// Precedence: trusted forwarded port, trusted forwarded host, the
    /// `Host` header, the listener port. A source without an explicit port
    /// falls back to the scheme default.
    pub fn port(&mut self) -> Result<u16, ProvenanceError> {
        let mut host = None;
        if self.is_from_trusted_proxy() {
            host = self
                .trusted_values(ForwardedKind::Port, None)?
                .into_iter()
                .next();
            if host.is_none() {
                host = self
                    .trusted_values(ForwardedKind::Host, None)?
                    .into_iter()
                    .next();
            }
        }
        let host = match host.or_else(|| self.headers.get("Host").map(str::to_string)) {
            Some(h) => h,
            None => return Ok(self.conn.server_port),
        };

        // For a bracketed IPv6 literal only a colon after the bracket
        // introduces a port.
        let pos = if host.starts_with('[') {
            host.rfind(']').and_then(|end| host[end..].find(':').map(|i| end + i))
        } else {
            host.rfind(':')
        };
        if let Some(pos) = pos {
            if let Ok(port) = host[pos + 1..].parse::<u16>() {
                if port != 0 {
                    return Ok(port);
                }
            }
        }

        if self.is_secure()? { Ok(443) } else { Ok(80) }
    }

    /// Whether the request should be treated as HTTPS.
    ///
    /// A trusted forwarded proto wins; its first comma-separated value
    /// governs and matches `https`, `on`, `ssl` or `1` case-insensitively.
    pub fn is_secure(&mut self) -> Result<bool, ProvenanceError> {
        if self.is_from_trusted_proxy() {
            let proto = self.trusted_values(ForwardedKind::Proto, None)?;
            if let Some(first) = proto.first() {
                let first = first.to_lowercase();
                return Ok(matches!(first.as_str(), "https" | "on" | "ssl" | "1"));
            }
        }
        Ok(self.conn.secure)
    }

    pub fn scheme(&mut self) -> Result<&'static str, ProvenanceError> {
        if self.is_secure()? {
            Ok("https")
        } else {
            Ok("http")
        }
    }

    /// The path prefix a trusted proxy stripped before forwarding, without
    /// its trailing slashes. `None` when no trusted prefix applies.
    pub fn prefix(&mut self) -> Result<Option<String>, ProvenanceError> {
        if !self.is_from_trusted_proxy() {
            return Ok(None);
        }
        let values = self.trusted_values(ForwardedKind::Prefix, None)?;
        Ok(values
            .into_iter()
            .next()
            .map(|p| p.trim_end_matches('/').to_string()))
    }

    /// Reads one forwarding signal from both the legacy header and the RFC
    /// 7239 `Forwarded` header, reconciling the two chains.
    ///
    /// A disagreement between two trusted chains raises
    /// [`ProvenanceError::ConflictingHeaders`] on its first occurrence for
    /// this request; afterwards the result degrades to `["0.0.0.0", ip]`
    /// (or empty without an `ip`).
    fn trusted_values(
        &mut self,
        kind: ForwardedKind,
        ip: Option<&str>,
    ) -> Result<Vec<String>, ProvenanceError> {
        let mut client_values = Vec::new();
        let mut forwarded_values = Vec::new();

        if self.policy.trusts(kind) {
            if let Some(raw) = self.headers.get(kind.header_name()) {
                for v in raw.split(',') {
                    let v = v.trim();
                    if kind == ForwardedKind::Port {
                        client_values.push(format!("0.0.0.0:{v}"));
                    } else {
                        client_values.push(v.to_string());
                    }
                }
            }
        }

        if self.policy.trusts(ForwardedKind::Forwarded) {
            if let Some(param) = kind.forwarded_param() {
                let raw = self
                    .headers
                    .get(ForwardedKind::Forwarded.header_name())
                    .map(str::to_string);
                if let Some(raw) = raw {
                    let mut extracted = Vec::new();
                    for node in split(&raw, ",;=") {
                        let SplitNode::List(group) = node else {
                            continue;
                        };
                        if let Some(v) = combine(&group).value(param) {
                            extracted.push(v.to_string());
                        }
                    }
                    for v in extracted {
                        if kind == ForwardedKind::Port {
                            forwarded_values.push(self.port_from_host_value(&v)?);
                        } else {
                            forwarded_values.push(v);
                        }
                    }
                }
            }
        }

        if let Some(ip) = ip {
            client_values = self.normalize_and_filter(client_values, ip);
            forwarded_values = self.normalize_and_filter(forwarded_values, ip);
        }

        if forwarded_values == client_values || client_values.is_empty() {
            if self.state.forwarded == Validation::Unchecked {
                self.state.forwarded = Validation::Accepted;
            }
            return Ok(forwarded_values);
        }
        if forwarded_values.is_empty() {
            if self.state.forwarded == Validation::Unchecked {
                self.state.forwarded = Validation::Accepted;
            }
            return Ok(client_values);
        }

        if self.state.forwarded == Validation::Rejected {
            return Ok(match ip {
                Some(ip) => vec!["0.0.0.0".to_string(), ip.to_string()],
                None => Vec::new(),
            });
        }
        self.state.forwarded = Validation::Rejected;
        warn!(
            legacy = kind.header_name(),
            "trusted Forwarded and legacy forwarding headers disagree"
        );
        Err(ProvenanceError::ConflictingHeaders {
            legacy: kind.header_name(),
        })
    }

    /// Extracts the `:port` tail of a `Forwarded host=` value into the
    /// synthetic `0.0.0.0:port` form, defaulting to the scheme port when the
    /// value carries none.
    fn port_from_host_value(&mut self, value: &str) -> Result<String, ProvenanceError> {
        match value.rfind(':') {
            Some(i) if !value.ends_with(']') => Ok(format!("0.0.0.0{}", &value[i..])),
            _ => {
                if self.is_secure()? {
                    Ok("0.0.0.0:443".to_string())
                } else {
                    Ok("0.0.0.0:80".to_string())
                }
            }
        }
    }

    /// Completes a forwarded chain with the direct peer, strips ports and
    /// brackets, drops hops that are not IP literals, removes trusted-proxy
    /// hops, and reverses so the origin client comes first.
    ///
    /// When every hop was a trusted proxy the first trusted hop dropped is
    /// returned alone, so the chain never silently vanishes.
    fn normalize_and_filter(&self, chain: Vec<String>, ip: &str) -> Vec<String> {
        if chain.is_empty() {
            return chain;
        }

        let mut chain = chain;
        chain.push(ip.to_string());
        let peer = self.conn.peer_ip.as_deref();

        let mut kept = Vec::new();
        let mut first_trusted = None;
        for hop in chain {
            let hop = strip_hop_port(&hop);
            if !ip_literal_valid(hop) {
                continue;
            }
            if self.policy.matches_proxy(hop, peer) {
                if first_trusted.is_none() {
                    first_trusted = Some(hop.to_string());
                }
                continue;
            }
            kept.push(hop.to_string());
        }

        if !kept.is_empty() {
            kept.reverse();
            return kept;
        }
        first_trusted.into_iter().collect()
    }
}

/// Strips `:port` from an IPv4-looking hop and brackets plus `:port` from a
/// bracketed IPv6 hop.
fn strip_hop_port(hop: &str) -> &str {
    if hop.contains('.') {
        match hop.find(':') {
            Some(i) => &hop[..i],
            None => hop,
        }
    } else if hop.starts_with('[') {
        match hop[1..].find(']') {
            Some(i) => &hop[1..1 + i],
            None => hop,
        }
    } else {
        hop
    }
}

fn ip_literal_valid(hop: &str) -> bool {
    hop.parse::<std::net::Ipv4Addr>().is_ok() || hop.parse::<std::net::Ipv6Addr>().is_ok()
}

/// Drops a trailing `:digits` port suffix, if present.
fn strip_port_suffix(host: &str) -> &str {
    match host.rfind(':') {
        Some(i) if i + 1 < host.len() && host[i + 1..].bytes().all(|b| b.is_ascii_digit()) => {
            &host[..i]
        }
        _ => host,
    }
}

/// Checks the host against the RFC 952/2181 character set in one linear
/// pass: dot-separated runs of `[a-zA-Z0-9-:\]_]`, an optional leading `[`,
/// at most one dot between runs. Linear scanning keeps adversarially long
/// hosts cheap to reject.
fn host_chars_valid(host: &str) -> bool {
    let bytes = host.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if i == 0 && bytes[0] == b'[' {
            i = 1;
        }
        let start = i;
        while i < bytes.len() && is_host_char(bytes[i]) {
            i += 1;
        }
        if i == start {
            return false;
        }
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
        }
    }
    true
}

fn is_host_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b']' | b'_')
}
