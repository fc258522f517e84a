use std::collections::HashSet;
use std::ops::BitOr;
use std::sync::RwLock;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::ip;

/// The forwarding signals a proxy can be trusted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardedKind {
    /// RFC 7239 `Forwarded`.
    Forwarded,
    /// `X-Forwarded-For`.
    For,
    /// `X-Forwarded-Host`.
    Host,
    /// `X-Forwarded-Proto`.
    Proto,
    /// `X-Forwarded-Port`.
    Port,
    /// `X-Forwarded-Prefix`.
    Prefix,
}

impl ForwardedKind {
    pub fn header_name(self) -> &'static str {
        match self {
            ForwardedKind::Forwarded => "Forwarded",
            ForwardedKind::For => "X-Forwarded-For",
            ForwardedKind::Host => "X-Forwarded-Host",
            ForwardedKind::Proto => "X-Forwarded-Proto",
            ForwardedKind::Port => "X-Forwarded-Port",
            ForwardedKind::Prefix => "X-Forwarded-Prefix",
        }
    }

    /// The RFC 7239 parameter carrying this signal, when one exists. The
    /// port is embedded in the `host` parameter.
    pub(crate) fn forwarded_param(self) -> Option<&'static str> {
        match self {
            ForwardedKind::For => Some("for"),
            ForwardedKind::Host | ForwardedKind::Port => Some("host"),
            ForwardedKind::Proto => Some("proto"),
            ForwardedKind::Forwarded | ForwardedKind::Prefix => None,
        }
    }

    const fn bit(self) -> u32 {
        match self {
            ForwardedKind::Forwarded => 0b000001,
            ForwardedKind::For => 0b000010,
            ForwardedKind::Host => 0b000100,
            ForwardedKind::Proto => 0b001000,
            ForwardedKind::Port => 0b010000,
            ForwardedKind::Prefix => 0b100000,
        }
    }
}

/// Bitmask of headers trusted from configured proxies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustedHeaderSet(u32);

impl TrustedHeaderSet {
    pub const EMPTY: Self = Self(0);
    pub const FORWARDED: Self = Self(ForwardedKind::Forwarded.bit());
    pub const X_FORWARDED_FOR: Self = Self(ForwardedKind::For.bit());
    pub const X_FORWARDED_HOST: Self = Self(ForwardedKind::Host.bit());
    pub const X_FORWARDED_PROTO: Self = Self(ForwardedKind::Proto.bit());
    pub const X_FORWARDED_PORT: Self = Self(ForwardedKind::Port.bit());
    pub const X_FORWARDED_PREFIX: Self = Self(ForwardedKind::Prefix.bit());

    /// Every `X-Forwarded-*` header, without RFC 7239 `Forwarded`.
    pub const X_FORWARDED_ALL: Self = Self(0b111110);
    /// AWS ELB does not send `X-Forwarded-Host`.
    pub const X_FORWARDED_AWS_ELB: Self = Self(0b011010);
    /// All `X-Forwarded-*` headers sent by the Traefik reverse proxy.
    pub const X_FORWARDED_TRAEFIK: Self = Self(0b111110);

    pub fn contains(self, kind: ForwardedKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TrustedHeaderSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One trusted-proxy entry: an IP or CIDR literal, or the peer marker that
/// stands for whatever address the request actually arrived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustedProxy {
    Cidr(String),
    Peer,
}

impl TrustedProxy {
    pub fn cidr(pattern: &str) -> Self {
        Self::Cidr(pattern.to_string())
    }
}

/// Process-wide trust configuration.
///
/// Built once at configuration time and shared by reference across request
/// resolutions. `set_trusted_proxies` and `set_trusted_hosts` replace prior
/// configuration, never merge with it. The only interior mutability is the
/// cache of hosts that already passed pattern validation.
#[derive(Debug, Default)]
pub struct ProxyPolicy {
    proxies: Vec<TrustedProxy>,
    trusted_headers: TrustedHeaderSet,
    host_patterns: Vec<regex::Regex>,
    validated_hosts: RwLock<HashSet<String>>,
}

impl ProxyPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the trusted proxy list and the set of headers trusted from
    /// those proxies. Only list reverse proxies you manage directly.
    pub fn set_trusted_proxies(&mut self, proxies: Vec<TrustedProxy>, headers: TrustedHeaderSet) {
        self.proxies = proxies;
        self.trusted_headers = headers;
    }

    /// Replaces the trusted host patterns. Patterns are compiled
    /// case-insensitively; the validated-host cache is reset.
    pub fn set_trusted_hosts<I, S>(&mut self, patterns: I) -> Result<(), PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| PolicyError::InvalidHostPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
            compiled.push(regex);
        }
        self.host_patterns = compiled;
        self.validated_hosts = RwLock::new(HashSet::new());
        Ok(())
    }

    pub fn trusted_proxies(&self) -> &[TrustedProxy] {
        &self.proxies
    }

    pub fn trusted_headers(&self) -> TrustedHeaderSet {
        self.trusted_headers
    }

    pub fn has_trusted_host_patterns(&self) -> bool {
        !self.host_patterns.is_empty()
    }

    pub(crate) fn trusts(&self, kind: ForwardedKind) -> bool {
        self.trusted_headers.contains(kind)
    }

    /// Whether `candidate` matches any trusted proxy entry. The peer marker
    /// resolves against the address the request actually arrived from.
    pub(crate) fn matches_proxy(&self, candidate: &str, peer: Option<&str>) -> bool {
        if self.proxies.is_empty() {
            return false;
        }
        let patterns: Vec<&str> = self
            .proxies
            .iter()
            .filter_map(|proxy| match proxy {
                TrustedProxy::Cidr(pattern) => Some(pattern.as_str()),
                TrustedProxy::Peer => peer,
            })
            .collect();
        ip::check_ip(candidate, &patterns)
    }

    /// Whether `host` matches a trusted-host pattern, consulting and filling
    /// the validated-host cache.
    pub(crate) fn is_host_trusted(&self, host: &str) -> bool {
        if let Ok(cache) = self.validated_hosts.read() {
            if cache.contains(host) {
                return true;
            }
        }
        if self.host_patterns.iter().any(|p| p.is_match(host)) {
            if let Ok(mut cache) = self.validated_hosts.write() {
                cache.insert(host.to_string());
            }
            return true;
        }
        false
    }

    #[cfg(test)]
    pub(crate) fn is_host_cached(&self, host: &str) -> bool {
        self.validated_hosts
            .read()
            .map(|cache| cache.contains(host))
            .unwrap_or(false)
    }
}

/// Serializable policy configuration, converted into a [`ProxyPolicy`] with
/// pattern validation via [`ProxyPolicy::try_from`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyPolicyConfig {
    /// IP or CIDR literals; the string `"peer"` marks the direct peer.
    pub trusted_proxies: Vec<String>,
    pub trusted_headers: Vec<TrustedHeaderName>,
    pub trusted_hosts: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrustedHeaderName {
    Forwarded,
    XForwardedFor,
    XForwardedHost,
    XForwardedProto,
    XForwardedPort,
    XForwardedPrefix,
}

impl TrustedHeaderName {
    fn kind(self) -> ForwardedKind {
        match self {
            TrustedHeaderName::Forwarded => ForwardedKind::Forwarded,
            TrustedHeaderName::XForwardedFor => ForwardedKind::For,
            TrustedHeaderName::XForwardedHost => ForwardedKind::Host,
            TrustedHeaderName::XForwardedProto => ForwardedKind::Proto,
            TrustedHeaderName::XForwardedPort => ForwardedKind::Port,
            TrustedHeaderName::XForwardedPrefix => ForwardedKind::Prefix,
        }
    }
}

impl TryFrom<ProxyPolicyConfig> for ProxyPolicy {
    type Error = PolicyError;

    fn try_from(config: ProxyPolicyConfig) -> Result<Self, Self::Error> {
        let proxies = config
            .trusted_proxies
            .iter()
            .map(|entry| {
                if entry == "peer" {
                    TrustedProxy::Peer
                } else {
                    TrustedProxy::cidr(entry)
                }
            })
            .collect();

        let headers = config
            .trusted_headers
            .iter()
            .fold(TrustedHeaderSet::EMPTY, |set, name| {
                set | TrustedHeaderSet(name.kind().bit())
            });

        let mut policy = ProxyPolicy::new();
        policy.set_trusted_proxies(proxies, headers);
        policy.set_trusted_hosts(&config.trusted_hosts)?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::{
        ForwardedKind, ProxyPolicy, ProxyPolicyConfig, TrustedHeaderName, TrustedHeaderSet,
        TrustedProxy,
    };
    use crate::error::PolicyError;

    #[test]
    fn header_set_presets() {
        let elb = TrustedHeaderSet::X_FORWARDED_AWS_ELB;
        assert!(elb.contains(ForwardedKind::For));
        assert!(elb.contains(ForwardedKind::Proto));
        assert!(elb.contains(ForwardedKind::Port));
        assert!(!elb.contains(ForwardedKind::Host));
        assert!(!elb.contains(ForwardedKind::Forwarded));

        let traefik = TrustedHeaderSet::X_FORWARDED_TRAEFIK;
        for kind in [
            ForwardedKind::For,
            ForwardedKind::Host,
            ForwardedKind::Proto,
            ForwardedKind::Port,
            ForwardedKind::Prefix,
        ] {
            assert!(traefik.contains(kind));
        }
        assert!(!traefik.contains(ForwardedKind::Forwarded));

        let combined = TrustedHeaderSet::FORWARDED | TrustedHeaderSet::X_FORWARDED_FOR;
        assert!(combined.contains(ForwardedKind::Forwarded));
        assert!(combined.contains(ForwardedKind::For));
        assert!(!combined.contains(ForwardedKind::Proto));
        assert!(TrustedHeaderSet::EMPTY.is_empty());
    }

    #[test]
    fn setters_replace_prior_configuration() {
        let mut policy = ProxyPolicy::new();
        policy.set_trusted_proxies(
            vec![TrustedProxy::cidr("10.0.0.0/8")],
            TrustedHeaderSet::X_FORWARDED_FOR,
        );
        assert!(policy.matches_proxy("10.1.2.3", None));

        policy.set_trusted_proxies(
            vec![TrustedProxy::cidr("192.168.0.0/16")],
            TrustedHeaderSet::FORWARDED,
        );
        assert!(!policy.matches_proxy("10.1.2.3", None));
        assert!(policy.matches_proxy("192.168.1.1", None));
        assert!(policy.trusts(ForwardedKind::Forwarded));
        assert!(!policy.trusts(ForwardedKind::For));
    }

    #[test]
    fn peer_marker_matches_the_actual_peer() {
        let mut policy = ProxyPolicy::new();
        policy.set_trusted_proxies(vec![TrustedProxy::Peer], TrustedHeaderSet::X_FORWARDED_FOR);
        assert!(policy.matches_proxy("203.0.113.9", Some("203.0.113.9")));
        assert!(!policy.matches_proxy("203.0.113.9", Some("198.51.100.1")));
        assert!(!policy.matches_proxy("203.0.113.9", None));
    }

    #[test]
    fn trusted_host_matching_fills_the_cache() {
        let mut policy = ProxyPolicy::new();
        policy
            .set_trusted_hosts(["^([a-z]{9}\\.)?trusted\\.com$"])
            .unwrap();

        assert!(!policy.is_host_cached("subdomain.trusted.com"));
        assert!(policy.is_host_trusted("subdomain.trusted.com"));
        assert!(policy.is_host_cached("subdomain.trusted.com"));
        assert!(!policy.is_host_trusted("evil.com"));
        assert!(!policy.is_host_cached("evil.com"));

        // replacing the patterns resets the cache
        policy.set_trusted_hosts(["^example\\.org$"]).unwrap();
        assert!(!policy.is_host_cached("subdomain.trusted.com"));
        assert!(!policy.is_host_trusted("subdomain.trusted.com"));
    }

    #[test]
    fn host_patterns_are_case_insensitive() {
        let mut policy = ProxyPolicy::new();
        policy.set_trusted_hosts(["^trusted\\.com$"]).unwrap();
        assert!(policy.is_host_trusted("TRUSTED.com"));
    }

    #[test]
    fn invalid_host_pattern_is_rejected() {
        let mut policy = ProxyPolicy::new();
        let err = policy.set_trusted_hosts(["(unclosed"]).unwrap_err();
        assert_matches!(err, PolicyError::InvalidHostPattern { pattern, .. } if pattern == "(unclosed");
    }

    #[test]
    fn config_conversion() {
        let config = ProxyPolicyConfig {
            trusted_proxies: vec!["10.0.0.0/8".to_string(), "peer".to_string()],
            trusted_headers: vec![
                TrustedHeaderName::Forwarded,
                TrustedHeaderName::XForwardedFor,
            ],
            trusted_hosts: vec!["^trusted\\.com$".to_string()],
        };
        let policy = ProxyPolicy::try_from(config).unwrap();

        assert_eq!(
            policy.trusted_proxies(),
            &[TrustedProxy::cidr("10.0.0.0/8"), TrustedProxy::Peer]
        );
        assert!(policy.trusts(ForwardedKind::Forwarded));
        assert!(policy.trusts(ForwardedKind::For));
        assert!(!policy.trusts(ForwardedKind::Host));
        assert!(policy.has_trusted_host_patterns());

        let bad = ProxyPolicyConfig {
            trusted_hosts: vec!["(unclosed".to_string()],
            ..ProxyPolicyConfig::default()
        };
        assert_matches!(
            ProxyPolicy::try_from(bad),
            Err(PolicyError::InvalidHostPattern { .. })
        );
    }
}
