//! Pipeline wiring and lifecycle.
//!
//! `Pipeline::start` turns a [`Config`] into running tasks:
//!
//! ```text
//! FeedSource --poll tick--> Router --bounded mpsc--> sink consumer(s)
//! ```
//!
//! One poller task drives the feed on a fixed period. Each configured sink
//! gets its own bounded channel and consumer task, so delivery is serialized
//! per category while categories proceed concurrently. Shutdown is a watch
//! signal: the poller stops, the router (sole holder of the senders) drops,
//! consumers drain whatever is still queued, and `shutdown` joins it all.

mod router;

pub use router::{RouteOutcome, Router};

use crate::config::{Config, SinkConfig};
use crate::feed::{FeedEntry, FeedSource};
use crate::sink::{DeliveryError, EmailSink, FileAppendSink, Sink};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Errors that can occur while assembling the pipeline.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("Failed to build sink '{name}': {source}")]
    Sink {
        name: String,
        #[source]
        source: DeliveryError,
    },
    #[error("Route '{category}' points at undefined sink '{sink}'")]
    UnknownSink { category: String, sink: String },
}

/// Handle to the running pipeline tasks.
pub struct Pipeline {
    shutdown_tx: watch::Sender<bool>,
    poller: JoinHandle<()>,
    consumers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Start the pipeline with a default HTTP client.
    pub fn start(config: Config) -> Result<Self, StartError> {
        Self::start_with_client(config, reqwest::Client::new())
    }

    /// Start the pipeline with a caller-supplied HTTP client.
    pub fn start_with_client(
        config: Config,
        client: reqwest::Client,
    ) -> Result<Self, StartError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // One bounded channel + consumer task per configured sink
        let mut senders: HashMap<&str, mpsc::Sender<FeedEntry>> = HashMap::new();
        let mut consumers = Vec::new();
        for (name, sink_config) in &config.sinks {
            let sink: Box<dyn Sink> = match sink_config {
                SinkConfig::File { path } => {
                    Box::new(FileAppendSink::new(name.clone(), path.clone()))
                }
                SinkConfig::Email(email) => Box::new(
                    EmailSink::from_config(name.clone(), email).map_err(|source| {
                        StartError::Sink {
                            name: name.clone(),
                            source,
                        }
                    })?,
                ),
            };

            let (tx, rx) = mpsc::channel(config.pipeline.channel_capacity);
            senders.insert(name.as_str(), tx);
            consumers.push(tokio::spawn(run_sink(rx, sink)));
        }

        // Category → sender table; two categories may share one sink
        let mut mapping: HashMap<String, mpsc::Sender<FeedEntry>> = HashMap::new();
        for (category, sink_name) in &config.routes {
            let tx = senders
                .get(sink_name.as_str())
                .ok_or_else(|| StartError::UnknownSink {
                    category: category.clone(),
                    sink: sink_name.clone(),
                })?;
            mapping.insert(category.clone(), tx.clone());
        }
        drop(senders);

        let router = Router::new(mapping);
        let source = FeedSource::new(client, config.feed.url.clone());
        let period = Duration::from_millis(config.feed.poll_interval_ms);
        let poller = tokio::spawn(poll_loop(source, router, period, shutdown_rx));

        Ok(Self {
            shutdown_tx,
            poller,
            consumers,
        })
    }

    /// Stop polling, drain all channels, and wait for every task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.poller.await;
        // The poller owned the router and with it every sender; consumers
        // observe closed channels once their queues run dry.
        for consumer in self.consumers {
            let _ = consumer.await;
        }
        tracing::info!("Pipeline stopped");
    }
}

async fn poll_loop(
    mut source: FeedSource,
    router: Router,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!(url = %source.url(), period_ms = period.as_millis() as u64, "Poll loop started");

    let mut tick = tokio::time::interval(period);
    // Routing can outlast the period when a channel is full; don't let
    // missed ticks burst afterwards.
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match source.poll().await {
                    Ok(entries) => {
                        for entry in entries {
                            router.route(entry).await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            url = %source.url(),
                            error = %e,
                            "Feed poll failed, will retry next tick"
                        );
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("Poll loop stopping");
                return;
            }
        }
    }
}

/// Consumer loop for one sink: blocking recv of the first entry, then a
/// non-blocking drain of whatever else is queued, delivered as one batch in
/// FIFO order. A failed delivery is logged and its batch dropped; the loop
/// itself only ends when the channel closes.
async fn run_sink(mut rx: mpsc::Receiver<FeedEntry>, mut sink: Box<dyn Sink>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(more) = rx.try_recv() {
            batch.push(more);
        }

        let count = batch.len();
        if let Err(e) = sink.deliver(batch).await {
            tracing::warn!(
                sink = %sink.name(),
                error = %e,
                entries = count,
                "Delivery failed, dropping batch"
            );
        }
    }
    tracing::debug!(sink = %sink.name(), "Sink consumer finished");
}
