//! Single-owner ingest service for the event store
//!
//! The [`EventStore`] is a plain growable list with no locking. To share it
//! between concurrent callers (HTTP handlers, background producers) it is
//! moved into an actor task that processes one message at a time. Writes and
//! queries are serialized through the actor's mpsc channel, and query results
//! come back over a oneshot channel.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::analytics::aggregator::EventStore;
use crate::analytics::models::{
    ClickEvent, EventCursor, EventPage, FilterSet, HeatmapCell, MetricsSnapshot,
    TrendGranularity, TrendPoint,
};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("analytics ingest service has shut down")]
    Closed,
}

/// Inclusive time window plus optional filters, shared by all queries
#[derive(Debug, Clone)]
pub struct MetricsQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub filters: Option<FilterSet>,
}

impl MetricsQuery {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            filters: None,
        }
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = (!filters.is_empty()).then_some(filters);
        self
    }
}

/// Message types for the IngestActor
enum ActorMessage {
    LogEvent(ClickEvent),
    Metrics {
        query: MetricsQuery,
        reply: oneshot::Sender<MetricsSnapshot>,
    },
    Trend {
        query: MetricsQuery,
        granularity: TrendGranularity,
        reply: oneshot::Sender<Vec<TrendPoint>>,
    },
    Heatmap {
        query: MetricsQuery,
        reply: oneshot::Sender<Vec<HeatmapCell>>,
    },
    RecentEvents {
        limit: usize,
        after: Option<EventCursor>,
        reply: oneshot::Sender<EventPage>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
    /// Stop processing; messages queued behind this one are dropped
    Shutdown,
}

/// Actor that exclusively owns the event store
struct IngestActor {
    receiver: mpsc::Receiver<ActorMessage>,
    store: EventStore,
}

impl IngestActor {
    async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ActorMessage::LogEvent(event) => {
                    self.store.log_event(event);
                }
                ActorMessage::Metrics { query, reply } => {
                    let snapshot =
                        self.store
                            .calculate_metrics(query.start, query.end, query.filters.as_ref());
                    // Caller may have gone away; nothing to do then
                    let _ = reply.send(snapshot);
                }
                ActorMessage::Trend {
                    query,
                    granularity,
                    reply,
                } => {
                    let trend = self.store.click_trend(
                        query.start,
                        query.end,
                        query.filters.as_ref(),
                        granularity,
                    );
                    let _ = reply.send(trend);
                }
                ActorMessage::Heatmap { query, reply } => {
                    let cells =
                        self.store
                            .traffic_heatmap(query.start, query.end, query.filters.as_ref());
                    let _ = reply.send(cells);
                }
                ActorMessage::RecentEvents {
                    limit,
                    after,
                    reply,
                } => {
                    let _ = reply.send(self.store.recent_events(limit, after.as_ref()));
                }
                ActorMessage::Len { reply } => {
                    let _ = reply.send(self.store.len());
                }
                ActorMessage::Shutdown => {
                    info!(
                        "Ingest actor received shutdown signal with {} events stored",
                        self.store.len()
                    );
                    return;
                }
            }
        }

        warn!("Ingest actor channel closed without shutdown message");
    }
}

/// Cloneable handle to the actor-owned event store
#[derive(Clone)]
pub struct IngestService {
    actor_tx: mpsc::Sender<ActorMessage>,
}

impl IngestService {
    /// Move `store` into a new actor task and return a handle to it.
    ///
    /// `buffer_size` bounds the number of queued messages; senders wait when
    /// the queue is full. Must be called inside a Tokio runtime.
    pub fn spawn(store: EventStore, buffer_size: usize) -> Self {
        let (actor_tx, actor_rx) = mpsc::channel(buffer_size.max(1));

        debug!(
            "Spawning ingest actor with {} seeded events (buffer {})",
            store.len(),
            buffer_size
        );

        let actor = IngestActor {
            receiver: actor_rx,
            store,
        };
        tokio::spawn(async move {
            actor.run().await;
        });

        Self { actor_tx }
    }

    /// Append an event. Resolves once the event is queued ahead of any later
    /// message from this or another handle.
    pub async fn log_event(&self, event: ClickEvent) -> Result<(), IngestError> {
        self.send(ActorMessage::LogEvent(event)).await
    }

    pub async fn calculate_metrics(
        &self,
        query: MetricsQuery,
    ) -> Result<MetricsSnapshot, IngestError> {
        let (reply, rx) = oneshot::channel();
        self.send(ActorMessage::Metrics { query, reply }).await?;
        rx.await.map_err(|_| IngestError::Closed)
    }

    pub async fn click_trend(
        &self,
        query: MetricsQuery,
        granularity: TrendGranularity,
    ) -> Result<Vec<TrendPoint>, IngestError> {
        let (reply, rx) = oneshot::channel();
        self.send(ActorMessage::Trend {
            query,
            granularity,
            reply,
        })
        .await?;
        rx.await.map_err(|_| IngestError::Closed)
    }

    pub async fn traffic_heatmap(
        &self,
        query: MetricsQuery,
    ) -> Result<Vec<HeatmapCell>, IngestError> {
        let (reply, rx) = oneshot::channel();
        self.send(ActorMessage::Heatmap { query, reply }).await?;
        rx.await.map_err(|_| IngestError::Closed)
    }

    pub async fn recent_events(
        &self,
        limit: usize,
        after: Option<EventCursor>,
    ) -> Result<EventPage, IngestError> {
        let (reply, rx) = oneshot::channel();
        self.send(ActorMessage::RecentEvents {
            limit,
            after,
            reply,
        })
        .await?;
        rx.await.map_err(|_| IngestError::Closed)
    }

    /// Number of events currently stored
    pub async fn len(&self) -> Result<usize, IngestError> {
        let (reply, rx) = oneshot::channel();
        self.send(ActorMessage::Len { reply }).await?;
        rx.await.map_err(|_| IngestError::Closed)
    }

    /// Stop the actor. Later calls on any handle fail with [`IngestError::Closed`].
    pub async fn shutdown(&self) {
        let _ = self.actor_tx.send(ActorMessage::Shutdown).await;
    }

    async fn send(&self, msg: ActorMessage) -> Result<(), IngestError> {
        self.actor_tx.send(msg).await.map_err(|_| IngestError::Closed)
    }
}
