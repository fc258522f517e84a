use std::fmt;

use crate::split::SplitNode;

/// Value of a single header parameter: `name=value` carries a string, a bare
/// `name` is a flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Flag,
    Value(String),
}

/// An ordered name/value parameter map as produced by [`combine`].
///
/// Names are lowercased on insert. Re-inserting a name overwrites its value
/// but keeps the original position, matching header parameter semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: ParamValue) {
        let name = name.to_lowercase();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// The string value of a `name=value` parameter. Flags yield `None`.
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ParamValue::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_header_value(self, ';'))
    }
}

/// Combines split name/value groups into one ordered parameter map.
///
/// Each group should hold one or two tokens: the first becomes the
/// (lowercased) name, the second the value, or a flag if absent. Later
/// duplicates overwrite earlier ones.
///
/// ```
/// use relaytrace_grammar::{ParamValue, SplitNode, combine};
///
/// let parts = vec![
///     SplitNode::List(vec![SplitNode::Token("foo".into()), SplitNode::Token("abc".into())]),
///     SplitNode::List(vec![SplitNode::Token("bar".into())]),
/// ];
/// let params = combine(&parts);
/// assert_eq!(params.value("foo"), Some("abc"));
/// assert_eq!(params.get("bar"), Some(&ParamValue::Flag));
/// ```
pub fn combine(parts: &[SplitNode]) -> Params {
    let mut params = Params::new();
    for part in parts {
        match part {
            SplitNode::Token(name) => params.insert(name, ParamValue::Flag),
            SplitNode::List(nodes) => {
                let mut tokens = nodes.iter().filter_map(SplitNode::as_token);
                if let Some(name) = tokens.next() {
                    let value = match tokens.next() {
                        Some(v) => ParamValue::Value(v.to_string()),
                        None => ParamValue::Flag,
                    };
                    params.insert(name, value);
                }
            }
        }
    }
    params
}

/// Joins a parameter map into a header value string, the inverse of
/// [`combine`]. Flags render as the bare name, values as `name=value` with
/// the value quoted when needed. Entries are joined with the separator plus
/// a space for readability.
pub fn to_header_value(params: &Params, separator: char) -> String {
    let parts: Vec<String> = params
        .iter()
        .map(|(name, value)| match value {
            ParamValue::Flag => name.to_string(),
            ParamValue::Value(v) => format!("{name}={}", quote(v)),
        })
        .collect();
    parts.join(&format!("{separator} "))
}

/// Encodes a string as an RFC 7230 quoted-string, if necessary.
///
/// Strings made only of token characters pass through unchanged; anything
/// else is wrapped in double quotes with `"` and `\` backslash-escaped.
pub fn quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_token_char) {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Decodes a quoted string: every `\x` escape is replaced by `x` and every
/// unescaped `"` is dropped. Bare tokens pass through verbatim, and a
/// dangling final backslash survives unchanged.
pub fn unquote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            }
        } else if c != '"' {
            out.push(c);
        }
    }
    out
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '.' | '^' | '_' | '`' | '|' | '~' | '-'
        )
}
