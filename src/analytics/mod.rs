//! Click analytics module
//!
//! This module provides the in-memory click event store and the metrics
//! aggregation that the dashboard renders: KPI figures, top URLs, referrer
//! sources, device and geo breakdowns, trends, and the traffic heatmap.
//!
//! [`EventStore`] is the single-threaded core. [`IngestService`] wraps it in
//! an actor task for concurrent callers.

pub mod aggregator;
pub mod device;
pub mod ingest;
pub mod models;
pub mod referrer;
pub mod sample;
pub mod visitor;

// Re-export commonly used types
pub use aggregator::{EventStore, TOP_URLS_LIMIT, UNKNOWN_COUNTRY};
pub use device::classify_device;
pub use ingest::{IngestError, IngestService, MetricsQuery};
pub use models::{
    CampaignClicks, Channel, ClickEvent, DeviceClass, EventCursor, EventPage, FilterSet,
    HeatmapCell, MetricsSnapshot, ReferrerSource, StoredEvent, TrendGranularity, TrendPoint,
    UrlClicks,
};
pub use referrer::{referrer_domain, DEFAULT_REFERRER_DOMAIN};
pub use visitor::visitor_key;
