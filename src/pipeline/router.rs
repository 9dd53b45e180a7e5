use crate::feed::FeedEntry;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// What happened to an entry handed to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Enqueued onto the channel mapped to its category.
    Routed,
    /// No channel is mapped to the entry's category; dropped with a warning.
    Unmatched,
    /// The mapped channel's consumer is gone (shutdown race); dropped.
    Closed,
}

/// Static category→channel dispatch table.
///
/// The mapping is fixed at construction. Routing an entry performs exactly
/// one enqueue; the entry itself is never mutated. When the target channel
/// is full, `route` waits until the consumer makes room — entries routed to
/// a channel are never dropped.
pub struct Router {
    mapping: HashMap<String, mpsc::Sender<FeedEntry>>,
}

impl Router {
    pub fn new(mapping: HashMap<String, mpsc::Sender<FeedEntry>>) -> Self {
        Self { mapping }
    }

    pub async fn route(&self, entry: FeedEntry) -> RouteOutcome {
        let Some(tx) = self.mapping.get(&entry.category) else {
            tracing::warn!(
                category = %entry.category,
                guid = %entry.guid,
                title = %entry.title,
                "No route for category, dropping entry"
            );
            return RouteOutcome::Unmatched;
        };

        let guid = entry.guid.clone();
        match tx.send(entry).await {
            Ok(()) => RouteOutcome::Routed,
            Err(_) => {
                tracing::warn!(guid = %guid, "Channel closed, dropping entry");
                RouteOutcome::Closed
            }
        }
    }
}
