use reliefnet_server::{AppConfig, build_app, build_state};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// Offline configuration: memory storage, every networked provider
/// disabled, so service endpoints deterministically degrade.
fn offline_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.providers.nominatim_enabled = false;
    cfg.providers.fema_enabled = false;
    cfg
}

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let cfg = offline_config();
    let state = build_state(&cfg).await.expect("build state");
    let app = build_app(&cfg, state);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

#[tokio::test]
async fn health_endpoints_work() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["service"], "ReliefNet Server");
    assert_eq!(body["status"], "ok");

    let resp = client
        .get(format!("{base}/healthz"))
        .header("x-request-id", "health-check-42")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    // The outermost layer echoes the caller's request id back
    assert_eq!(resp.headers().get("x-request-id").unwrap(), "health-check-42");

    let resp = client.get(format!("{base}/readyz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ready");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn disaster_crud_lifecycle() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    // Create
    let resp = client
        .post(format!("{base}/api/disasters"))
        .json(&json!({
            "title": "Riverside Flood",
            "description": "Flooding along the east bank",
            "ownerId": "user-1",
            "tags": ["flood", "riverside"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert!(created["createdAt"].is_string());

    // Read
    let resp = client
        .get(format!("{base}/api/disasters/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let read: Value = resp.json().await.unwrap();
    assert_eq!(read["title"], "Riverside Flood");

    // List with an equality filter
    let resp = client
        .get(format!("{base}/api/disasters?ownerId=user-1"))
        .send()
        .await
        .unwrap();
    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], id.as_str());

    // Update preserves creation time
    let resp = client
        .put(format!("{base}/api/disasters/{id}"))
        .json(&json!({
            "title": "Riverside Flood (major)",
            "description": "Flooding along both banks",
            "ownerId": "user-1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["title"], "Riverside Flood (major)");
    assert_eq!(updated["createdAt"], created["createdAt"]);
    assert!(updated["updatedAt"].is_string());

    // Delete, then read is a 404
    let resp = client
        .delete(format!("{base}/api/disasters/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let resp = client
        .get(format!("{base}/api/disasters/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn validation_errors_are_400() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    // Empty title fails domain validation
    let resp = client
        .post(format!("{base}/api/disasters"))
        .json(&json!({
            "title": "  ",
            "description": "x",
            "ownerId": "user-1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid");

    // Unknown collection
    let resp = client
        .post(format!("{base}/api/patients"))
        .json(&json!({"name": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn geocode_degrades_without_providers() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/geocode"))
        .json(&json!({"location": "Manhattan, NYC"}))
        .send()
        .await
        .unwrap();
    // Total endpoint: provider exhaustion is a 200 with a marked result
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["provider"], "mock");
    assert_eq!(body["confidence"], "low");
    assert!(body["latitude"].is_number());
    assert!(body["longitude"].is_number());
    assert!(body["error"].is_string());

    // Missing input is still a client error
    let resp = client
        .post(format!("{base}/api/geocode"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn analyze_falls_back_to_keyword_classifier() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/analyze"))
        .json(&json!({"text": "Trapped on the roof, water rising, need rescue"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    // The keyword matcher is always eligible, so this is a real result
    assert_eq!(body["provider"], "keyword");
    assert_eq!(body["urgency"], "critical");
    assert_eq!(body["category"], "flood");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn social_feed_serves_mock_posts() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    // No disaster yet: 404
    let resp = client
        .get(format!("{base}/api/disasters/missing/social"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = client
        .post(format!("{base}/api/disasters"))
        .json(&json!({
            "id": "d-social",
            "title": "Riverside Flood",
            "description": "x",
            "ownerId": "user-1",
            "tags": ["flood"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let resp = client
        .get(format!("{base}/api/disasters/d-social/social"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    let posts = body["posts"].as_array().unwrap();
    assert!(!posts.is_empty());
    for post in posts {
        assert_eq!(post["provider"], "mock");
        let score = post["priorityScore"].as_u64().unwrap();
        assert!((1..=10).contains(&score));
    }

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn updates_feed_is_empty_with_sources_disabled() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/disasters"))
        .json(&json!({
            "id": "d-upd",
            "title": "Riverside Flood",
            "description": "x",
            "ownerId": "user-1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let resp = client
        .get(format!(
            "{base}/api/disasters/d-upd/updates?minPriority=high"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["total"], 0);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn verify_image_degrades_without_classifier() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/verify-image"))
        .json(&json!({"imageUrl": "https://example.com/photo.jpg"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["provider"], "mock");
    assert_eq!(body["verdict"], "unverified");

    // Non-URL input is rejected
    let resp = client
        .post(format!("{base}/api/verify-image"))
        .json(&json!({"imageUrl": "not a url"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
