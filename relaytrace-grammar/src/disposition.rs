use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;

use crate::params::{ParamValue, Params, to_header_value};

// rawurlencode: everything but RFC 3986 unreserved characters.
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Attachment,
    Inline,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispositionError {
    #[error("the filename fallback must only contain ASCII characters")]
    NonAsciiFallback,
    #[error("the filename fallback cannot contain the \"%\" character")]
    PercentInFallback,
    #[error("the filename and the fallback cannot contain the \"/\" and \"\\\" characters")]
    PathSeparator,
}

/// Generates an RFC 6266 `Content-Disposition` field value.
///
/// `fallback` must be an ASCII string semantically equivalent to `filename`;
/// pass `None` when the filename is already ASCII. When the two differ, the
/// unicode name is carried in an RFC 5987 `filename*` parameter.
pub fn make_disposition(
    kind: Disposition,
    filename: &str,
    fallback: Option<&str>,
) -> Result<String, DispositionError> {
    let fallback = match fallback {
        Some(f) if !f.is_empty() => f,
        _ => filename,
    };

    if !fallback.chars().all(|c| (' '..='~').contains(&c)) {
        return Err(DispositionError::NonAsciiFallback);
    }
    if fallback.contains('%') {
        return Err(DispositionError::PercentInFallback);
    }
    if filename.contains(['/', '\\']) || fallback.contains(['/', '\\']) {
        return Err(DispositionError::PathSeparator);
    }

    let mut params = Params::new();
    params.insert("filename", ParamValue::Value(fallback.to_string()));
    if filename != fallback {
        let encoded = utf8_percent_encode(filename, RFC3986).to_string();
        params.insert("filename*", ParamValue::Value(format!("utf-8''{encoded}")));
    }

    Ok(format!("{}; {}", kind.as_str(), to_header_value(&params, ';')))
}
