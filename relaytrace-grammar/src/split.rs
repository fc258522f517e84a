use crate::params::unquote;

/// One node of a split header value.
///
/// The nesting depth of the tree mirrors the number of separators the header
/// was split on: one separator yields a flat list of tokens, two a list of
/// token lists, and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitNode {
    Token(String),
    List(Vec<SplitNode>),
}

impl SplitNode {
    /// The token text, if this node is a leaf.
    pub fn as_token(&self) -> Option<&str> {
        match self {
            SplitNode::Token(token) => Some(token),
            SplitNode::List(_) => None,
        }
    }

    /// The child nodes, if this node is a group.
    pub fn as_list(&self) -> Option<&[SplitNode]> {
        match self {
            SplitNode::Token(_) => None,
            SplitNode::List(nodes) => Some(nodes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Part(String),
    Separator(char),
}

/// Splits an HTTP header value by one or more separators.
///
/// `separators` is an ordered list of delimiter characters, most significant
/// first, e.g. `","`, `";="` or `",;="`. Separators inside quoted strings are
/// not delimiters. Whitespace around tokens and separators is trimmed, and
/// consecutive separators collapse (empty segments are dropped).
///
/// ```
/// use relaytrace_grammar::{SplitNode, split};
///
/// let parts = split("da, en-gb;q=0.8", ",;");
/// assert_eq!(
///     parts,
///     vec![
///         SplitNode::List(vec![SplitNode::Token("da".into())]),
///         SplitNode::List(vec![
///             SplitNode::Token("en-gb".into()),
///             SplitNode::Token("q=0.8".into()),
///         ]),
///     ]
/// );
/// ```
pub fn split(header: &str, separators: &str) -> Vec<SplitNode> {
    let seps: Vec<char> = separators.chars().collect();
    if seps.is_empty() {
        let trimmed = header.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![SplitNode::Token(unquote(trimmed))];
    }

    let pieces = tokenize(header, &seps);
    group(&pieces, &seps, true)
}

/// Cursor-based tokenizer: walks the trimmed header once and emits a flat
/// stream of parts and separator marks. A part is a maximal run of
/// non-separator characters with quoted strings kept intact; an unterminated
/// quote or dangling backslash simply runs to the end of input.
fn tokenize(header: &str, separators: &[char]) -> Vec<Piece> {
    let chars: Vec<char> = header.trim().chars().collect();
    let mut pieces = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if separators.contains(&c) {
            pieces.push(Piece::Separator(c));
            i += 1;
            continue;
        }

        let mut part = String::new();
        while i < chars.len() {
            let c = chars[i];
            if c == '"' {
                part.push(c);
                i += 1;
                while i < chars.len() {
                    let q = chars[i];
                    part.push(q);
                    i += 1;
                    if q == '\\' {
                        if i < chars.len() {
                            part.push(chars[i]);
                            i += 1;
                        }
                    } else if q == '"' {
                        break;
                    }
                }
            } else if separators.contains(&c) {
                break;
            } else {
                part.push(c);
                i += 1;
            }
        }
        pieces.push(Piece::Part(part.trim_end().to_string()));
    }

    pieces
}

fn group(pieces: &[Piece], separators: &[char], first: bool) -> Vec<SplitNode> {
    let current = separators[0];
    let rest = &separators[1..];

    let mut partitions: Vec<&[Piece]> = Vec::new();
    let mut start = 0;
    for (i, piece) in pieces.iter().enumerate() {
        if *piece == Piece::Separator(current) {
            if i > start {
                partitions.push(&pieces[start..i]);
            }
            start = i + 1;
        }
    }
    if pieces.len() > start {
        partitions.push(&pieces[start..]);
    }

    if rest.is_empty() {
        let mut parts: Vec<String> = partitions
            .iter()
            .filter_map(|partition| {
                partition.iter().find_map(|piece| match piece {
                    Piece::Part(text) => Some(unquote(text)),
                    Piece::Separator(_) => None,
                })
            })
            .collect();

        // A key/value split may hit values that themselves contain the
        // separator ("foo=1&bar=2" behind "foo_cookie="): only the first
        // occurrence is structural, the tail is rejoined. Applies at the
        // innermost level only.
        if !first && parts.len() > 2 {
            let tail = parts.split_off(1).join(&current.to_string());
            parts.push(tail);
        }

        return parts.into_iter().map(SplitNode::Token).collect();
    }

    partitions
        .into_iter()
        .map(|partition| SplitNode::List(group(partition, rest, false)))
        .filter(|node| !matches!(node, SplitNode::List(nodes) if nodes.is_empty()))
        .collect()
}
