//! Structured HTTP header value grammar.
//!
//! Implements the RFC 7230 token / quoted-string / separator grammar shared by
//! headers like `Cookie`, `Forwarded`, `Accept` and `Content-Disposition`:
//! splitting on ordered separator sets, recombining name/value parts, and
//! quoting rules. Parsing is permissive: malformed input tokenizes best-effort
//! and never fails.

mod disposition;
mod params;
mod split;

pub use disposition::{Disposition, DispositionError, make_disposition};
pub use params::{ParamValue, Params, combine, quote, to_header_value, unquote};
pub use split::{SplitNode, split};
