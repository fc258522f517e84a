use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;

use relaytrace_grammar::{ParamValue, SplitNode, combine, split};

use crate::item::AcceptItem;

/// A full `Accept`-style header: items keyed by exact value, ranked by
/// descending quality with insertion order as the tie-break.
///
/// The sort order is computed lazily on first access and cached until the
/// list changes. Lists are per-request values and are not meant to be shared
/// across threads.
#[derive(Debug, Clone, Default)]
pub struct AcceptList {
    items: Vec<AcceptItem>,
    order: RefCell<Option<Vec<usize>>>,
}

impl AcceptList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from a raw header value. Never fails; an empty header
    /// yields an empty list.
    pub fn from_string(header: &str) -> Self {
        let mut list = Self::new();
        for (index, group) in split(header, ",;=").iter().enumerate() {
            let SplitNode::List(parts) = group else {
                continue;
            };
            let Some(first) = parts.first() else {
                continue;
            };
            let value = match first {
                SplitNode::Token(token) => token.as_str(),
                SplitNode::List(nodes) => match nodes.first().and_then(SplitNode::as_token) {
                    Some(token) => token,
                    None => continue,
                },
            };

            let mut item = AcceptItem::new(value, []);
            for (name, attr_value) in combine(&parts[1..]).iter() {
                match attr_value {
                    ParamValue::Value(v) => item.set_attribute(name, v),
                    ParamValue::Flag => item.set_attribute(name, "true"),
                }
            }
            item.set_index(index);
            list.add(item);
        }
        list
    }

    /// Adds an item. Re-adding a value overwrites the earlier item in place
    /// and invalidates the cached sort order.
    pub fn add(&mut self, item: AcceptItem) {
        match self.items.iter_mut().find(|i| i.value() == item.value()) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
        *self.order.borrow_mut() = None;
    }

    /// Exact-key membership; no wildcard fallback.
    pub fn has(&self, value: &str) -> bool {
        self.items.iter().any(|item| item.value() == value)
    }

    /// Looks up an item by value with media-range wildcard fallback: the
    /// exact value first, then `type/*` when the value contains a `/`, then
    /// `*/*`, then `*`.
    pub fn get(&self, value: &str) -> Option<&AcceptItem> {
        if let Some(item) = self.find(value) {
            return Some(item);
        }
        if let Some((media_type, _)) = value.split_once('/') {
            if let Some(item) = self.find(&format!("{media_type}/*")) {
                return Some(item);
            }
        }
        self.find("*/*").or_else(|| self.find("*"))
    }

    /// All items, ranked best-first.
    pub fn all(&self) -> Vec<&AcceptItem> {
        self.sorted().into_iter().map(|i| &self.items[i]).collect()
    }

    /// The highest-ranked item, or `None` for an empty list.
    pub fn first(&self) -> Option<&AcceptItem> {
        self.sorted().first().map(|&i| &self.items[i])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn find(&self, value: &str) -> Option<&AcceptItem> {
        self.items.iter().find(|item| item.value() == value)
    }

    fn sorted(&self) -> Vec<usize> {
        if let Some(order) = self.order.borrow().as_ref() {
            return order.clone();
        }

        let mut order: Vec<usize> = (0..self.items.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&self.items[a], &self.items[b]);
            b.quality()
                .partial_cmp(&a.quality())
                .unwrap_or(Ordering::Equal)
                .then(a.index().cmp(&b.index()))
        });

        *self.order.borrow_mut() = Some(order.clone());
        order
    }
}

impl fmt::Display for AcceptList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.items.iter().map(|item| item.to_string()).collect();
        f.write_str(&rendered.join(","))
    }
}
