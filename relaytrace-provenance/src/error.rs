use thiserror::Error;

/// Errors raised while resolving request provenance.
///
/// Both kinds are raised at most once per request per violated accessor;
/// subsequent calls degrade to a documented fallback value instead of
/// raising again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvenanceError {
    /// A trusted `Forwarded` header and a trusted legacy `X-Forwarded-*`
    /// header disagree. Configure the proxy to remove one of them, or
    /// distrust the offending one.
    #[error(
        "the request has both a trusted \"Forwarded\" header and a trusted \"{legacy}\" header, conflicting with each other"
    )]
    ConflictingHeaders { legacy: &'static str },

    /// The host failed character validation or trusted-pattern matching.
    #[error("{0}")]
    SuspiciousOperation(String),
}

/// Errors raised at policy configuration time.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid trusted host pattern {pattern:?}: {source}")]
    InvalidHostPattern {
        pattern: String,
        source: regex::Error,
    },
}
