//! Sample click events for demos and local development

use chrono::{DateTime, Duration, Utc};

use crate::analytics::models::{Channel, ClickEvent};

/// Longest span, in days, accepted from configuration or the command line
pub const MAX_SPAN_DAYS: i64 = 36_500;

const WINDOWS_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const IPHONE_SAFARI_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Mobile/15E148 Safari/604.1";
const ANDROID_CHROME_UA: &str = "Mozilla/5.0 (Linux; Android 10; SM-G970F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.101 Mobile Safari/537.36";
const MAC_CHROME_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const IPAD_SAFARI_UA: &str = "Mozilla/5.0 (iPad; CPU OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1";
const WINDOWS_TABLET_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Tablet PC 2.0) AppleWebKit/537.36 (KHTML, like Gecko) Edge/18.19041";

const SHORT_URLS: &[&str] = &[
    "short.url/abc123",
    "short.url/def456",
    "short.url/ghi789",
    "short.url/jkl012",
    "short.url/mno345",
    "short.url/pqr678",
];

const USER_AGENTS: &[&str] = &[
    WINDOWS_CHROME_UA,
    IPHONE_SAFARI_UA,
    ANDROID_CHROME_UA,
    MAC_CHROME_UA,
    IPAD_SAFARI_UA,
    WINDOWS_TABLET_UA,
];

const REFERRERS: &[Option<&str>] = &[
    None,
    Some("https://www.google.com/search?q=link"),
    Some("https://t.co/x1y2z3"),
    Some("https://www.linkedin.com/feed/"),
    Some("https://news.ycombinator.com/item?id=1"),
];

const CAMPAIGNS: &[Option<&str>] = &[None, None, Some("spring_sale"), Some("newsletter")];

const COUNTRIES: &[Option<&str>] = &[
    Some("TR"),
    Some("US"),
    Some("DE"),
    Some("FR"),
    Some("JP"),
    Some("GB"),
    None,
];

const STATUS_CODES: &[u16] = &[200, 200, 200, 200, 200, 200, 301, 404, 500];

/// The five fixed mock events the dashboard starts with, all stamped `now`
pub fn seed_events(now: DateTime<Utc>) -> Vec<ClickEvent> {
    let seeds = [
        ("short.url/abc123", "hash1", WINDOWS_CHROME_UA, "TR", 50.0),
        ("short.url/def456", "hash2", IPHONE_SAFARI_UA, "US", 75.0),
        ("short.url/ghi789", "hash3", ANDROID_CHROME_UA, "DE", 60.0),
        ("short.url/jkl012", "hash4", MAC_CHROME_UA, "FR", 40.0),
        ("short.url/mno345", "hash5", IPAD_SAFARI_UA, "JP", 65.0),
    ];

    seeds
        .into_iter()
        .map(|(url, hash, ua, country, latency)| {
            let mut event = ClickEvent::new(url, now, hash, ua);
            event.status_code = Some(200);
            event.country_code = Some(country.to_string());
            event.latency_ms = Some(latency);
            event
        })
        .collect()
}

fn pick<T: Copy>(items: &[T]) -> T {
    items[rand::random_range(0..items.len())]
}

/// Generate `count` random events with timestamps in `[now - span, now]`.
///
/// A span reaching past the earliest representable instant is cut off there.
pub fn synthesize(count: usize, now: DateTime<Utc>, span: Duration) -> Vec<ClickEvent> {
    let reachable = (now - DateTime::<Utc>::MIN_UTC).num_seconds();
    let span_secs = span.num_seconds().clamp(0, reachable);

    (0..count)
        .map(|_| {
            let offset = rand::random_range(0..=span_secs);
            let timestamp = Duration::try_seconds(offset)
                .and_then(|d| now.checked_sub_signed(d))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let visitor = format!("hash{}", rand::random_range(1..=50u32));

            let mut event = ClickEvent::new(pick(SHORT_URLS), timestamp, visitor, pick(USER_AGENTS));
            event.referrer_url = pick(REFERRERS).map(str::to_owned);
            event.utm_campaign = pick(CAMPAIGNS).map(str::to_owned);
            event.country_code = pick(COUNTRIES).map(str::to_owned);
            event.channel = Some(if rand::random_bool(0.3) {
                Channel::Qr
            } else {
                Channel::Link
            });
            event.status_code = Some(pick(STATUS_CODES));
            event.latency_ms = Some(rand::random_range(20.0..400.0f64).round());
            event
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::aggregator::EventStore;
    use crate::analytics::models::DeviceClass;

    #[test]
    fn test_seed_events_metrics() {
        let now = Utc::now();
        let store = EventStore::with_events(seed_events(now));
        let metrics = store.calculate_metrics(now, now, None);

        assert_eq!(metrics.total_clicks, 5);
        assert_eq!(metrics.unique_visitors, 5);
        assert_eq!(metrics.active_urls, 5);
        assert_eq!(metrics.error_rate, 0.0);
        // floor(5 * 0.95) = 4 -> largest of 40, 50, 60, 65, 75
        assert_eq!(metrics.p95_latency, 75.0);
        assert_eq!(metrics.device_breakdown.get(&DeviceClass::Mobile), Some(&3));
        assert_eq!(metrics.device_breakdown.get(&DeviceClass::Desktop), Some(&2));
        assert_eq!(metrics.geo_distribution.len(), 5);
    }

    #[test]
    fn test_synthesized_events_stay_in_span() {
        let now = Utc::now();
        let span = Duration::days(7);
        let events = synthesize(200, now, span);

        assert_eq!(events.len(), 200);
        for event in &events {
            assert!(event.timestamp <= now);
            assert!(event.timestamp >= now - span);
            assert!(SHORT_URLS.contains(&event.short_url_id.as_str()));
            assert!(event.latency_ms.is_some_and(|l| l >= 20.0));
        }
    }

    #[test]
    fn test_synthesize_zero_span() {
        let now = Utc::now();
        let events = synthesize(3, now, Duration::zero());
        assert!(events.iter().all(|e| e.timestamp == now));
    }

    #[test]
    fn test_synthesize_huge_span_stays_representable() {
        let now = Utc::now();
        let events = synthesize(50, now, Duration::days(1_000_000_000));

        assert_eq!(events.len(), 50);
        for event in &events {
            assert!(event.timestamp <= now);
            assert!(event.timestamp >= DateTime::<Utc>::MIN_UTC);
        }

        let events = synthesize(5, now, Duration::MAX);
        assert_eq!(events.len(), 5);
    }
}
