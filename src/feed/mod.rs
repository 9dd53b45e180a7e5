//! Feed source: periodic RSS/Atom fetching, parsing, and dedup.
//!
//! This module is the inbound edge of the pipeline:
//!
//! - [`parser`] - Low-level feed parsing using the `feed-rs` crate
//! - [`source`] - HTTP fetching with timeouts and size limits, plus the
//!   seen-guid set that makes each entry come out of the source exactly once
//!
//! The [`FeedSource`] produces a lazy, infinite sequence of new entries: the
//! pipeline calls [`FeedSource::poll`] on every tick and gets back only what
//! has not been emitted before. Fetch failures are values, not panics — the
//! caller logs them and polls again on the next tick.

mod parser;
mod source;

pub use parser::{parse_feed, FeedEntry};
pub use source::{fetch_feed, FeedSource, FetchError};
