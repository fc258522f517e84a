use std::fmt;

use relaytrace_grammar::{ParamValue, Params, SplitNode, combine, split, to_header_value};

/// One item of an `Accept`-style header, e.g. `text/html;q=0.8;level=1`.
///
/// The reserved `q` attribute is not part of the attribute map; it is parsed
/// into [`quality`](AcceptItem::quality) and defaults to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptItem {
    value: String,
    quality: f64,
    index: usize,
    attributes: Vec<(String, String)>,
}

impl AcceptItem {
    pub fn new<'a>(value: &str, attributes: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut item = Self {
            value: value.to_string(),
            quality: 1.0,
            index: 0,
            attributes: Vec::new(),
        };
        for (name, attr_value) in attributes {
            item.set_attribute(name, attr_value);
        }
        item
    }

    /// Parses a single header item, e.g. `text/plain; charset=utf-8`.
    pub fn from_string(value: &str) -> Self {
        let parts = split(value, ";=");
        let mut groups = parts.iter();

        let item_value = groups
            .next()
            .and_then(|group| match group {
                SplitNode::Token(token) => Some(token.as_str()),
                SplitNode::List(nodes) => nodes.first().and_then(SplitNode::as_token),
            })
            .unwrap_or_default();

        let attributes = combine(groups.as_slice());
        let mut item = Self::new(item_value, []);
        for (name, attr_value) in attributes.iter() {
            match attr_value {
                ParamValue::Value(v) => item.set_attribute(name, v),
                ParamValue::Flag => item.set_attribute(name, "true"),
            }
        }
        item
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn set_quality(&mut self, quality: f64) {
        self.quality = quality;
    }

    /// Position of the item in the original header, used as a sort tie-break.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(n, _)| n == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute. The reserved `q` name is routed to the quality
    /// instead of the attribute map; a `q` that does not parse as a float
    /// keeps the default quality of 1.0.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        if name == "q" {
            self.quality = value.parse().unwrap_or(1.0);
            return;
        }
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl fmt::Display for AcceptItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)?;
        if self.quality < 1.0 {
            write!(f, ";q={}", self.quality)?;
        }
        if !self.attributes.is_empty() {
            let mut params = Params::new();
            for (name, value) in &self.attributes {
                params.insert(name, ParamValue::Value(value.clone()));
            }
            write!(f, "; {}", to_header_value(&params, ';'))?;
        }
        Ok(())
    }
}
