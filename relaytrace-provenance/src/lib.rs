//! Trusted-proxy request provenance.
//!
//! Derives a request's real client IP, host, port and scheme from a mix of
//! untrusted and explicitly-trusted reverse-proxy headers (`Forwarded` per
//! RFC 7239 and the legacy `X-Forwarded-*` family), detecting conflicting
//! proxy signals and validating hosts against configurable trust patterns.
//!
//! Trust configuration is an explicit [`ProxyPolicy`] value shared by
//! reference across in-flight requests; per-request one-shot violation state
//! lives on the [`ProvenanceResolver`].

mod error;
mod headers;
pub mod ip;
mod policy;
mod resolver;

pub use error::{PolicyError, ProvenanceError};
pub use headers::{HeaderSource, Headers};
pub use policy::{
    ForwardedKind, ProxyPolicy, ProxyPolicyConfig, TrustedHeaderName, TrustedHeaderSet,
    TrustedProxy,
};
pub use resolver::{
    ConnectionInfo, ProvenanceResolver, RequestProvenanceState, Validation,
};
