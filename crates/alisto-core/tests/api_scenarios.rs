mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alisto_core::models::{NewsCategory, NewsFilter, TouristSpotQuery};
use alisto_core::{ActionRegistry, ApiClient, Feeds, KeyValueStore, MemoryStore, OfflineQueue, TtlCache};
use serde_json::json;

use common::{ok, rejected, MockServer};

fn feeds_for(server: &MockServer) -> (Feeds, MemoryStore) {
    let store = MemoryStore::new();
    let api = ApiClient::new(&server.base_url, Duration::from_secs(5)).unwrap();
    (Feeds::new(api, TtlCache::new(Arc::new(store.clone()))), store)
}

fn news_page(ids: &[i64], page: u32, has_next: bool) -> serde_json::Value {
    let items: Vec<_> = ids
        .iter()
        .map(|id| json!({"id": id, "title": format!("Article {}", id), "summary": "", "category": "Festival"}))
        .collect();
    json!({
        "items": items,
        "totalCount": 3,
        "pageNumber": page,
        "pageSize": 2,
        "totalPages": 2,
        "hasNextPage": has_next,
        "hasPreviousPage": page > 1
    })
}

#[tokio::test]
async fn tourist_spots_load_into_fetcher_and_images_resolve() {
    let server = MockServer::start(|req| {
        if req.path() == "/api/tourism/spots" {
            ok(json!([{"id": 1, "name": "Sinking Bell Tower"}]))
        } else {
            (404, json!({"success": false, "message": "no route"}).to_string())
        }
    })
    .await;
    let (feeds, _) = feeds_for(&server);

    let spots = feeds.tourist_spots(TouristSpotQuery {
        page_number: 1,
        page_size: 20,
        search_term: None,
        is_active: Some(true),
    });
    let state = spots.settled().await;

    assert!(!state.is_loading);
    assert!(state.error.is_none());
    let data = state.data.unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].id, 1);
    assert_eq!(data[0].name, "Sinking Bell Tower");

    let requests = server.requests();
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.query(), "pageNumber=1&pageSize=20&isActive=true");

    let api = ApiClient::new("https://alisto.example", Duration::from_secs(5)).unwrap();
    assert_eq!(api.image_url("/uploads/x.png"), "https://alisto.example/uploads/x.png");
    assert_eq!(api.image_url("https://cdn.example/y.png"), "https://cdn.example/y.png");
}

#[tokio::test]
async fn rejected_envelope_surfaces_server_message() {
    let server = MockServer::start(|_| rejected("Service temporarily unavailable")).await;
    let (feeds, _) = feeds_for(&server);

    let state = feeds.dashboard().settled().await;
    assert!(state.data.is_none());
    assert_eq!(state.error.as_deref(), Some("Service temporarily unavailable"));
}

#[tokio::test]
async fn http_errors_map_to_api_errors() {
    let server = MockServer::start(|_| {
        (404, json!({"success": false, "message": "Article not found"}).to_string())
    })
    .await;
    let (feeds, _) = feeds_for(&server);

    let state = feeds.news_article(99).settled().await;
    assert_eq!(state.error.as_deref(), Some("Resource not found: Article not found"));
}

#[tokio::test]
async fn news_pages_accumulate_with_filter_in_query() {
    let server = MockServer::start(|req| {
        if req.query().contains("pageNumber=2") {
            ok(news_page(&[3], 2, false))
        } else {
            ok(news_page(&[1, 2], 1, true))
        }
    })
    .await;
    let (feeds, _) = feeds_for(&server);

    let news = feeds.news(NewsFilter {
        category: Some(NewsCategory::Festival),
        ..Default::default()
    });
    assert_eq!(news.settled().await.items.len(), 2);
    assert!(news.load_more().await);

    let state = news.state();
    let ids: Vec<i64> = state.items.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(!state.has_next_page());
    assert!(server.requests()[0].query().contains("category=Festival"));
}

#[tokio::test]
async fn hotlines_are_served_from_cache_on_second_load() {
    let server = MockServer::start(|_| {
        ok(json!([
            {"id": 2, "name": "Fire", "phoneNumber": "160", "sortOrder": 2},
            {"id": 1, "name": "Police", "phoneNumber": "117", "sortOrder": 1}
        ]))
    })
    .await;
    let (feeds, store) = feeds_for(&server);

    let first = feeds.hotlines().settled().await.data.unwrap();
    assert_eq!(first[0].name, "Police");

    let second = feeds.hotlines().settled().await.data.unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(server.hits("/api/hotlines"), 1);
    assert!(store.get("cache_emergency_hotlines").await.unwrap().is_some());
}

#[tokio::test]
async fn rate_limited_request_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let server = MockServer::start(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            (429, String::new())
        } else {
            ok(json!({"totalAppointments": 4}))
        }
    })
    .await;
    let api = ApiClient::new(&server.base_url, Duration::from_secs(5)).unwrap();

    let stats = api.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_appointments, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn bearer_token_is_sent() {
    let server = MockServer::start(|_| ok(json!({"id": "u1", "email": "ana@example.com"}))).await;
    let api = ApiClient::new(&server.base_url, Duration::from_secs(5))
        .unwrap()
        .with_token("jwt-123".to_string());

    let user = api.current_user().await.unwrap();
    assert_eq!(user.email, "ana@example.com");
    assert_eq!(server.requests()[0].header("authorization"), Some("Bearer jwt-123"));
}

#[tokio::test]
async fn queued_issue_report_is_replayed_against_api() {
    let server = MockServer::start(|req| {
        if req.method == "POST" && req.path() == "/api/reports" {
            ok(json!({
                "id": "r1",
                "referenceNumber": "ISS-1",
                "category": "Sanitation",
                "urgencyLevel": "Medium",
                "description": "Uncollected garbage",
                "location": "Purok 3",
                "status": "Submitted"
            }))
        } else {
            (404, String::new())
        }
    })
    .await;
    let api = ApiClient::new(&server.base_url, Duration::from_secs(5)).unwrap();
    let queue = OfflineQueue::load(Arc::new(MemoryStore::new())).await.unwrap();
    let payload = json!({
        "category": "Sanitation",
        "urgencyLevel": "Medium",
        "description": "Uncollected garbage",
        "location": "Purok 3"
    });
    queue.add("CREATE_ISSUE_REPORT", payload.clone()).await.unwrap();

    let report = queue.drain(&ActionRegistry::for_api(api)).await.unwrap();

    assert_eq!(report.completed.len(), 1);
    assert!(queue.is_empty());
    let sent: serde_json::Value = serde_json::from_str(&server.requests()[0].body).unwrap();
    assert_eq!(sent, payload);
}
