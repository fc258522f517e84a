//! Content negotiation over `Accept`-style headers.
//!
//! Parses `Accept`, `Accept-Language`, `Accept-Charset` and `Accept-Encoding`
//! values into quality-ranked item lists with media-range wildcard lookup.
//! Parsing never fails: a missing header yields an empty list and an
//! unparsable quality falls back to the default of 1.0.

mod item;
mod list;

pub use item::AcceptItem;
pub use list::AcceptList;
