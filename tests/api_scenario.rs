use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use embu_api::{
    rest::{router, JSON_BODY_LIMIT},
    storage::{Collection, RecordStore, SqliteStorage},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn open_app() -> (tempfile::TempDir, SqliteStorage, Router) {
    let dir = tempfile::tempdir().expect("temp dir");
    let storage = SqliteStorage::new(dir.path().join("embu_county.db"));
    storage.init().expect("init storage");
    let app = router(storage.clone(), "test".to_string(), &[]);
    (dir, storage, app)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn service_crud_round_trip() {
    let (_dir, _storage, app) = open_app();

    let created = json!({"id": "s1", "name": "Water"});
    let (status, body) = call(&app, Method::POST, "/api/services", Some(created.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, created);

    let (status, body) = call(&app, Method::GET, "/api/services/s1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, created);

    let updated = json!({"id": "s1", "name": "Water Supply"});
    let (status, body) = call(&app, Method::PUT, "/api/services/s1", Some(updated.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, updated);

    let (status, body) = call(&app, Method::GET, "/api/services/s1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, updated);

    let (status, body) = call(&app, Method::DELETE, "/api/services/s1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Service deleted"}));

    let (status, body) = call(&app, Method::GET, "/api/services/s1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Service not found"}));
}

#[tokio::test]
async fn listing_puts_recently_updated_documents_first() {
    let (_dir, _storage, app) = open_app();

    call(&app, Method::POST, "/api/news", Some(json!({"id": "a", "title": "A"}))).await;
    call(&app, Method::POST, "/api/news", Some(json!({"id": "b", "title": "B"}))).await;

    let (status, body) = call(&app, Method::GET, "/api/news", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": "b", "title": "B"}, {"id": "a", "title": "A"}]));

    call(&app, Method::PUT, "/api/news/a", Some(json!({"id": "a", "title": "A2"}))).await;

    let (_, body) = call(&app, Method::GET, "/api/news", None).await;
    assert_eq!(body, json!([{"id": "a", "title": "A2"}, {"id": "b", "title": "B"}]));
}

#[tokio::test]
async fn same_id_in_two_collections_is_independent() {
    let (_dir, storage, app) = open_app();

    call(&app, Method::POST, "/api/services", Some(json!({"id": "x", "kind": "service"}))).await;
    call(&app, Method::POST, "/api/news", Some(json!({"id": "x", "kind": "news"}))).await;

    let (status, _) = call(&app, Method::DELETE, "/api/services/x", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::GET, "/api/news/x", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "x", "kind": "news"}));

    let (_, services) = call(&app, Method::GET, "/api/services", None).await;
    assert_eq!(services, json!([]));

    let record = storage.get(Collection::News, "x").unwrap();
    assert_eq!(record.id, "x");
}

#[tokio::test]
async fn numeric_ids_are_stored_as_text() {
    let (_dir, storage, app) = open_app();

    let doc = json!({"id": 17, "title": "Supply of desks"});
    let (status, _) = call(&app, Method::POST, "/api/tenders", Some(doc.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, Method::GET, "/api/tenders/17", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, doc);
    assert_eq!(storage.get(Collection::Tenders, "17").unwrap().document, doc);
}

#[tokio::test]
async fn delete_of_missing_record_is_404_for_every_collection() {
    let (_dir, _storage, app) = open_app();

    for (path, label) in [
        ("services", "Service"),
        ("news", "News"),
        ("tenders", "Tender"),
        ("departments", "Department"),
        ("downloads", "Download"),
    ] {
        let (status, body) =
            call(&app, Method::DELETE, &format!("/api/{}/nope", path), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body, json!({"error": format!("{} not found", label)}));
    }
}

#[tokio::test]
async fn documents_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("embu_county.db");

    let storage = SqliteStorage::new(&path);
    storage.init().unwrap();
    let app = router(storage.clone(), "test".to_string(), &[]);
    let doc = json!({"id": "form-7", "title": "Trade licence", "size": 1024});
    call(&app, Method::POST, "/api/downloads", Some(doc.clone())).await;
    storage.close().unwrap();

    let reopened = SqliteStorage::new(&path);
    reopened.init().unwrap();
    let app = router(reopened, "test".to_string(), &[]);
    let (status, body) = call(&app, Method::GET, "/api/downloads/form-7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, doc);
}

#[tokio::test]
async fn large_documents_below_the_body_limit_are_accepted() {
    let (_dir, storage, app) = open_app();

    let doc = json!({"id": "gazette", "content": "x".repeat(3 * 1024 * 1024)});
    let (status, body) = call(&app, Method::POST, "/api/downloads", Some(doc.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, doc);
    assert_eq!(storage.get(Collection::Downloads, "gazette").unwrap().document, doc);
}

#[tokio::test]
async fn bodies_over_the_limit_are_rejected_with_413() {
    let (_dir, storage, app) = open_app();

    let mut raw = String::with_capacity(JSON_BODY_LIMIT + 32);
    raw.push_str(r#"{"id":"huge","content":""#);
    raw.push_str(&"x".repeat(JSON_BODY_LIMIT));
    raw.push_str(r#""}"#);
    assert!(raw.len() > JSON_BODY_LIMIT);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/downloads")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(raw))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());

    assert!(storage.get(Collection::Downloads, "huge").is_err());
}
