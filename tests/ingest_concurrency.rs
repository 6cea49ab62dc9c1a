//! Concurrent ingestion through the actor-owned event store

use chrono::{Duration, Utc};
use linkpulse::analytics::{ClickEvent, EventStore, IngestService, MetricsQuery};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_lose_no_events() {
    let service = IngestService::spawn(EventStore::new(), 32);
    let now = Utc::now();

    let mut handles = Vec::new();
    for producer in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..250 {
                let event = ClickEvent::new(
                    format!("short.url/p{producer}"),
                    now,
                    format!("visitor-{producer}-{}", i % 10),
                    "Mozilla/5.0",
                );
                service.log_event(event).await.unwrap();
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let query = MetricsQuery::new(now - Duration::minutes(1), now + Duration::minutes(1));
    let metrics = service.calculate_metrics(query).await.unwrap();

    assert_eq!(metrics.total_clicks, 2000);
    assert_eq!(metrics.active_urls, 8);
    assert_eq!(metrics.unique_visitors, 80);
    assert_eq!(metrics.avg_clicks_per_url, 250.0);
    assert_eq!(service.len().await.unwrap(), 2000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queries_interleaved_with_writes_are_monotonic() {
    let service = IngestService::spawn(EventStore::new(), 8);
    let now = Utc::now();
    let query = MetricsQuery::new(now - Duration::minutes(1), now + Duration::minutes(1));

    let writer = {
        let service = service.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                let event = ClickEvent::new("short.url/a", now, format!("v{i}"), "ua");
                service.log_event(event).await.unwrap();
            }
        })
    };

    let mut last = 0;
    for _ in 0..50 {
        let total = service
            .calculate_metrics(query.clone())
            .await
            .unwrap()
            .total_clicks;
        assert!(total >= last);
        last = total;
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
    let final_total = service.calculate_metrics(query).await.unwrap().total_clicks;
    assert_eq!(final_total, 200);
}
