//! Terminal consumers of the pipeline: one sink per channel.
//!
//! A sink receives batches of [`FeedEntry`](crate::feed::FeedEntry) values
//! in FIFO order and turns each into an output record:
//!
//! - [`FileAppendSink`] appends one `"《{title}》 {link}\r\n"` line per entry
//!   to a fixed UTF-8 file.
//! - [`EmailSink`] concatenates `"《{title}》 {link},"` fragments into one
//!   message body per batch and sends it over SMTP.
//!
//! Delivery failures are values; the channel consumer logs them and moves
//! on, so a broken sink never takes the pipeline down.

mod email;
mod file;

pub use email::{build_body, smtp_transport, EmailSink, EmailTransport};
pub use file::{format_line, FileAppendSink};

use crate::feed::FeedEntry;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while delivering entries to a sink.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// File could not be opened or written
    #[error("File write failed: {0}")]
    Io(#[from] std::io::Error),
    /// Sender or recipient address could not be parsed
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    /// Message construction failed
    #[error("Failed to build email: {0}")]
    Mail(#[from] lettre::error::Error),
    /// SMTP transport rejected the connection or the message
    #[error("SMTP send failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A per-channel consumer that persists or transmits entry content.
///
/// `deliver` receives everything that was queued on the sink's channel at
/// the moment its consumer woke up, oldest first. An empty batch is never
/// passed in.
#[async_trait]
pub trait Sink: Send {
    fn name(&self) -> &str;

    async fn deliver(&mut self, batch: Vec<FeedEntry>) -> Result<(), DeliveryError>;
}
