//! feedrelay — a feed-driven routing and fan-out pipeline.
//!
//! Polls an RSS/Atom feed on a fixed interval, deduplicates entries, routes
//! each new entry by its primary category onto a bounded per-category
//! channel, and delivers routed entries through per-category sinks (file
//! append, SMTP email).
//!
//! ```text
//! Feed Source → Router → Channel(s) → Sink Handler
//! ```
//!
//! Guarantees: every routed entry reaches exactly one channel; each
//! channel's sink consumes in FIFO order; once routed, an entry is neither
//! duplicated nor dropped (a full channel blocks the poller instead).
//! Entries whose category has no route are dropped with a warning.

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod sink;
