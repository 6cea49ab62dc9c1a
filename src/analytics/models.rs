//! Data models for click analytics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the visitor reached the short URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Qr,
    Link,
}

/// A single click on a short URL, as handed to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    /// Identifier of the shortened URL
    pub short_url_id: String,

    /// When the click happened (defaults to now when omitted on the wire)
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Opaque hash derived from the client IP
    pub visitor_hash: String,

    /// Raw client user agent
    pub user_agent: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,

    /// ISO country code (e.g., "US", "TR")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,

    /// Owner of the short URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ClickEvent {
    /// Minimal event with every optional attribute unset
    pub fn new(
        short_url_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        visitor_hash: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            short_url_id: short_url_id.into(),
            timestamp,
            visitor_hash: visitor_hash.into(),
            user_agent: user_agent.into(),
            referrer_url: None,
            utm_campaign: None,
            country_code: None,
            channel: None,
            status_code: None,
            latency_ms: None,
            user_id: None,
            tag: None,
        }
    }

    /// Whether the status code is in the 4xx/5xx range
    pub fn is_error(&self) -> bool {
        matches!(self.status_code, Some(code) if (400..600).contains(&code))
    }
}

/// An event as kept by the store, with its derived visitor key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    /// Position in the append order, starting at 0
    pub seq: u64,

    pub visitor_key: String,

    #[serde(flatten)]
    pub event: ClickEvent,
}

/// Equality constraints applied on top of the time window.
///
/// Every field is optional; `None` means "no constraint" for that attribute.
/// A present constraint never matches an event that lacks the attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub country: Option<String>,
    /// Matched against `utm_campaign`
    #[serde(default)]
    pub campaign: Option<String>,
}

impl FilterSet {
    pub fn matches(&self, event: &ClickEvent) -> bool {
        fn field_matches<T: PartialEq>(wanted: &Option<T>, actual: &Option<T>) -> bool {
            match wanted {
                None => true,
                Some(w) => actual.as_ref() == Some(w),
            }
        }

        field_matches(&self.user_id, &event.user_id)
            && field_matches(&self.tag, &event.tag)
            && field_matches(&self.channel, &event.channel)
            && field_matches(&self.country, &event.country_code)
            && field_matches(&self.campaign, &event.utm_campaign)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Coarse device class derived from the user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlClicks {
    pub url: String,
    pub clicks: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignClicks {
    pub name: String,
    pub clicks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferrerSource {
    pub domain: String,
    pub clicks: u64,
    pub percentage: f64,
    pub utm_campaigns: Vec<CampaignClicks>,
}

/// Result of one aggregation call. Recomputed per request, never cached.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_clicks: u64,
    pub unique_visitors: u64,
    pub avg_clicks_per_url: f64,
    pub p95_latency: f64,
    /// Percentage of events with a 4xx/5xx status; 0 when there are no events
    pub error_rate: f64,
    pub active_urls: u64,
    pub top_urls: Vec<UrlClicks>,
    pub referrer_sources: Vec<ReferrerSource>,
    pub device_breakdown: BTreeMap<DeviceClass, u64>,
    pub geo_distribution: BTreeMap<String, u64>,
}

/// Bucket width for click trends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendGranularity {
    Hour,
    #[default]
    Day,
}

impl TrendGranularity {
    pub fn bucket_secs(self) -> i64 {
        match self {
            Self::Hour => 3600,
            Self::Day => 86400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Start of the bucket (Unix timestamp, truncated to the bucket width)
    pub bucket_start: i64,
    pub clicks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapCell {
    /// 0 = Monday .. 6 = Sunday (UTC)
    pub weekday: u8,
    /// 0..=23 (UTC)
    pub hour: u8,
    pub clicks: u64,
}

/// Position in the newest-first event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCursor {
    pub timestamp_ms: i64,
    pub seq: u64,
}

impl EventCursor {
    pub fn of(event: &StoredEvent) -> Self {
        Self {
            timestamp_ms: event.event.timestamp.timestamp_millis(),
            seq: event.seq,
        }
    }
}

/// One page of the event log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPage {
    pub events: Vec<StoredEvent>,
    /// Cursor for the following page, if any events remain
    pub next: Option<EventCursor>,
}
