//! Producer executor - feeds scripted events into an aggregator
//!
//! Every producer runs as its own tokio task, so events from different
//! producers interleave the way concurrent work items would.

use super::aggregator::ProgressAggregator;
use super::events::Producer;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Producer lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum ProducerEvent {
    Started { producer: String },
    Applied { producer: String, progress: f64 },
    Finished { producer: String, events: usize },
    Failed { producer: String, error: String },
}

/// Outcome of a full run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub producers: usize,
    pub events: usize,
    pub progress: f64,
}

/// Executor - runs producers against one aggregator
pub struct Executor {
    aggregator: Arc<ProgressAggregator>,
    delay: Duration,
    event_tx: mpsc::UnboundedSender<ProducerEvent>,
}

impl Executor {
    /// Create a new executor
    pub fn new(
        aggregator: Arc<ProgressAggregator>,
    ) -> (Self, mpsc::UnboundedReceiver<ProducerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        (
            Self {
                aggregator,
                delay: Duration::ZERO,
                event_tx: tx,
            },
            rx,
        )
    }

    /// Pause between consecutive events of the same producer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run every producer to completion.
    ///
    /// The first producer error aborts the others and is returned.
    pub async fn run(&self, producers: Vec<Producer>) -> Result<RunReport> {
        let producer_count = producers.len();
        let mut set = JoinSet::new();

        for producer in producers {
            let aggregator = self.aggregator.clone();
            let event_tx = self.event_tx.clone();
            let delay = self.delay;

            set.spawn(async move {
                let name = producer.name;
                log::info!("Starting producer: {} ({} events)", name, producer.events.len());
                let _ = event_tx.send(ProducerEvent::Started {
                    producer: name.clone(),
                });

                for (i, event) in producer.events.iter().enumerate() {
                    if i > 0 && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    match aggregator.accept(*event) {
                        Ok(progress) => {
                            let _ = event_tx.send(ProducerEvent::Applied {
                                producer: name.clone(),
                                progress,
                            });
                        }
                        Err(e) => {
                            log::error!("Producer {} failed: {}", name, e);
                            let _ = event_tx.send(ProducerEvent::Failed {
                                producer: name.clone(),
                                error: e.to_string(),
                            });
                            return Err(e).with_context(|| format!("producer '{}'", name));
                        }
                    }

                    // Let other producers interleave
                    tokio::task::yield_now().await;
                }

                let events = producer.events.len();
                log::info!("Producer {} finished", name);
                let _ = event_tx.send(ProducerEvent::Finished {
                    producer: name,
                    events,
                });
                Ok(events)
            });
        }

        let mut applied = 0;
        while let Some(joined) = set.join_next().await {
            match joined.context("producer task panicked")? {
                Ok(events) => applied += events,
                Err(e) => {
                    set.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(RunReport {
            producers: producer_count,
            events: applied,
            progress: self.aggregator.progress(),
        })
    }
}
