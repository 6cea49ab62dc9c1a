//! In-memory click event store and metrics aggregation
//!
//! The store is append-only: events are added through [`EventStore::log_event`]
//! and never mutated or removed afterwards. Every query walks the current event
//! list and derives its result from scratch, so there is no cached state to
//! invalidate.
//!
//! The store itself is not synchronized. Callers that need concurrent access
//! go through [`crate::analytics::IngestService`], which owns the store inside
//! a single task.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::analytics::device::classify_device;
use crate::analytics::models::{
    CampaignClicks, ClickEvent, DeviceClass, EventCursor, EventPage, FilterSet, HeatmapCell,
    MetricsSnapshot, ReferrerSource, StoredEvent, TrendGranularity, TrendPoint, UrlClicks,
};
use crate::analytics::referrer::referrer_domain;
use crate::analytics::visitor::visitor_key;

/// Maximum number of entries in [`MetricsSnapshot::top_urls`]
pub const TOP_URLS_LIMIT: usize = 10;

/// Key used in the geo distribution for events without a country code
pub const UNKNOWN_COUNTRY: &str = "unknown";

const LATENCY_PERCENTILE: f64 = 0.95;

/// Append-only store of click events
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<StoredEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with events, logged in iteration order
    pub fn with_events(events: impl IntoIterator<Item = ClickEvent>) -> Self {
        let mut store = Self::new();
        for event in events {
            store.log_event(event);
        }
        store
    }

    /// Derive the visitor key for an event and append it to the store
    pub fn log_event(&mut self, event: ClickEvent) {
        let stored = StoredEvent {
            seq: self.events.len() as u64,
            visitor_key: visitor_key(&event),
            event,
        };
        self.events.push(stored);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All stored events in append order
    pub fn events(&self) -> &[StoredEvent] {
        &self.events
    }

    /// Events with `start <= timestamp <= end` that satisfy every filter
    fn select(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filters: Option<&FilterSet>,
    ) -> Vec<&StoredEvent> {
        self.events
            .iter()
            .filter(|stored| {
                let event = &stored.event;
                event.timestamp >= start
                    && event.timestamp <= end
                    && filters.map_or(true, |f| f.matches(event))
            })
            .collect()
    }

    /// Compute the metrics snapshot for a time window and optional filters.
    ///
    /// Both bounds are inclusive. An inverted window selects nothing.
    pub fn calculate_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filters: Option<&FilterSet>,
    ) -> MetricsSnapshot {
        let selected = self.select(start, end, filters);
        let total_clicks = selected.len() as u64;

        let unique_visitors = selected
            .iter()
            .map(|e| e.visitor_key.as_str())
            .collect::<HashSet<_>>()
            .len() as u64;

        let url_counts = count_first_seen(selected.iter().map(|e| e.event.short_url_id.as_str()));
        let active_urls = url_counts.len() as u64;

        let avg_clicks_per_url = if active_urls > 0 {
            total_clicks as f64 / active_urls as f64
        } else {
            0.0
        };

        debug!(
            "Calculated metrics over {} of {} events ({} urls)",
            total_clicks,
            self.events.len(),
            active_urls
        );

        MetricsSnapshot {
            total_clicks,
            unique_visitors,
            avg_clicks_per_url,
            p95_latency: p95_latency(&selected),
            error_rate: error_rate(&selected),
            active_urls,
            top_urls: top_urls(url_counts, total_clicks),
            referrer_sources: referrer_sources(&selected),
            device_breakdown: device_breakdown(&selected),
            geo_distribution: geo_distribution(&selected),
        }
    }

    /// Click counts per hour or day bucket, ascending, empty buckets omitted
    pub fn click_trend(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filters: Option<&FilterSet>,
        granularity: TrendGranularity,
    ) -> Vec<TrendPoint> {
        let width = granularity.bucket_secs();
        let mut buckets: BTreeMap<i64, u64> = BTreeMap::new();

        for stored in self.select(start, end, filters) {
            let bucket = stored.event.timestamp.timestamp().div_euclid(width) * width;
            *buckets.entry(bucket).or_insert(0) += 1;
        }

        buckets
            .into_iter()
            .map(|(bucket_start, clicks)| TrendPoint {
                bucket_start,
                clicks,
            })
            .collect()
    }

    /// Weekday by hour click counts (UTC); always 7 x 24 cells
    pub fn traffic_heatmap(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filters: Option<&FilterSet>,
    ) -> Vec<HeatmapCell> {
        let mut grid = [[0u64; 24]; 7];

        for stored in self.select(start, end, filters) {
            let ts = stored.event.timestamp;
            let weekday = ts.weekday().num_days_from_monday() as usize;
            grid[weekday][ts.hour() as usize] += 1;
        }

        let mut cells = Vec::with_capacity(7 * 24);
        for (weekday, hours) in grid.iter().enumerate() {
            for (hour, clicks) in hours.iter().enumerate() {
                cells.push(HeatmapCell {
                    weekday: weekday as u8,
                    hour: hour as u8,
                    clicks: *clicks,
                });
            }
        }
        cells
    }

    /// Page through the event log, newest first.
    ///
    /// Events are ordered by `(timestamp, seq)` descending. `after` resumes
    /// strictly past the event it was taken from. A `limit` of zero is
    /// treated as one.
    pub fn recent_events(&self, limit: usize, after: Option<&EventCursor>) -> EventPage {
        let limit = limit.max(1);
        let position = |e: &StoredEvent| (e.event.timestamp.timestamp_millis(), e.seq);

        let mut page: Vec<&StoredEvent> = self
            .events
            .iter()
            .filter(|e| after.map_or(true, |c| position(e) < (c.timestamp_ms, c.seq)))
            .collect();
        page.sort_by(|a, b| position(b).cmp(&position(a)));

        let has_more = page.len() > limit;
        page.truncate(limit);

        let next = if has_more {
            page.last().map(|e| EventCursor::of(e))
        } else {
            None
        };

        EventPage {
            events: page.into_iter().cloned().collect(),
            next,
        }
    }
}

/// Count occurrences, keeping groups in first-seen order
fn count_first_seen<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(&'a str, u64)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, u64)> = Vec::new();

    for key in keys {
        match index.get(key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key, counts.len());
                counts.push((key, 1));
            }
        }
    }
    counts
}

fn percentage(clicks: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    clicks as f64 / total as f64 * 100.0
}

/// Nearest-rank p95: element at `floor(0.95 * n)` of the sorted latencies
fn p95_latency(events: &[&StoredEvent]) -> f64 {
    let mut latencies: Vec<f64> = events.iter().filter_map(|e| e.event.latency_ms).collect();
    latencies.sort_by(f64::total_cmp);

    let index = (latencies.len() as f64 * LATENCY_PERCENTILE).floor() as usize;
    latencies.get(index).copied().unwrap_or(0.0)
}

fn error_rate(events: &[&StoredEvent]) -> f64 {
    let errors = events.iter().filter(|e| e.event.is_error()).count() as u64;
    percentage(errors, events.len() as u64)
}

fn top_urls(url_counts: Vec<(&str, u64)>, total_clicks: u64) -> Vec<UrlClicks> {
    let mut ranked = url_counts;
    // Stable: ties keep first-seen order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(TOP_URLS_LIMIT)
        .map(|(url, clicks)| UrlClicks {
            url: url.to_string(),
            clicks,
            percentage: percentage(clicks, total_clicks),
        })
        .collect()
}

fn referrer_sources(events: &[&StoredEvent]) -> Vec<ReferrerSource> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut sources: Vec<(String, u64, Vec<(String, u64)>)> = Vec::new();

    for stored in events {
        let event = &stored.event;
        let domain = referrer_domain(event.referrer_url.as_deref());

        let i = *index.entry(domain.clone()).or_insert_with(|| {
            sources.push((domain, 0, Vec::new()));
            sources.len() - 1
        });
        let (_, clicks, campaigns) = &mut sources[i];
        *clicks += 1;

        if let Some(campaign) = event.utm_campaign.as_deref().filter(|c| !c.is_empty()) {
            match campaigns.iter_mut().find(|(name, _)| name == campaign) {
                Some((_, count)) => *count += 1,
                None => campaigns.push((campaign.to_string(), 1)),
            }
        }
    }

    sources.sort_by(|a, b| b.1.cmp(&a.1));

    let total = events.len() as u64;
    sources
        .into_iter()
        .map(|(domain, clicks, campaigns)| ReferrerSource {
            domain,
            clicks,
            percentage: percentage(clicks, total),
            utm_campaigns: campaigns
                .into_iter()
                .map(|(name, clicks)| CampaignClicks { name, clicks })
                .collect(),
        })
        .collect()
}

fn device_breakdown(events: &[&StoredEvent]) -> BTreeMap<DeviceClass, u64> {
    let mut breakdown = BTreeMap::new();
    for stored in events {
        *breakdown
            .entry(classify_device(&stored.event.user_agent))
            .or_insert(0) += 1;
    }
    breakdown
}

fn geo_distribution(events: &[&StoredEvent]) -> BTreeMap<String, u64> {
    let mut distribution = BTreeMap::new();
    for stored in events {
        let country = stored
            .event
            .country_code
            .clone()
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());
        *distribution.entry(country).or_insert(0) += 1;
    }
    distribution
}
