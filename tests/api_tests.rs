//! API tests driving the router in-process over the in-memory store

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use lms_server::{
    api,
    models::{Book, Borrower, Branch, CopyRecord},
    repository::MemoryLedgerStore,
    services::{loans::FixedClock, Services},
    AppConfig, AppState,
};

async fn app() -> (MemoryLedgerStore, Router) {
    let store = MemoryLedgerStore::new();
    store.put_copies(CopyRecord::new(7, 3, 2, 2)).await;
    store
        .add_book(Book { id: 7, title: "Piranesi".into(), author_id: None, publisher_id: None })
        .await;
    store
        .add_branch(Branch { id: 3, name: "Riverside".into(), address: Some("1 Quay St".into()) })
        .await;
    store
        .add_borrower(Borrower { card_no: 42, name: "Alex".into(), address: None, phone: None })
        .await;

    let config = AppConfig::default();
    let services = Services::new(
        Arc::new(store.clone()),
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap())),
        config.loans.clone(),
    );
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };
    (store, api::create_router(state))
}

async fn send(app: &Router, method: Method, uri: &str, role: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        request = request.header(api::ROLE_HEADER, role);
    }
    let request = match body {
        Some(body) => request
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let (_, app) = app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_patron_checkout_and_return() {
    let (store, app) = app().await;
    let key = json!({ "book_id": 7, "branch_id": 3, "card_no": 42 });

    let (status, body) = send(&app, Method::POST, "/api/v1/loans", Some("patron"), Some(key.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["due_date"], "2024-01-08");
    assert_eq!(store.copies(7, 3).await.unwrap().no_of_available_copies, 1);

    let (status, body) = send(&app, Method::POST, "/api/v1/loans", Some("patron"), Some(key.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DuplicateLoan");

    let (status, body) = send(&app, Method::POST, "/api/v1/loans/return", Some("patron"), Some(key.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "returned");
    assert_eq!(body["copies"]["no_of_available_copies"], 2);

    let (status, _) = send(&app, Method::POST, "/api/v1/loans/return", Some("patron"), Some(key)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lookup_absence_is_not_an_error() {
    let (_, app) = app().await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/loans/lookup?book_id=7&branch_id=3&card_no=42",
        Some("librarian"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], false);
    assert!(body["loan"].is_null());
}

#[tokio::test]
async fn test_list_loans_joins_identity() {
    let (_, app) = app().await;
    let key = json!({ "book_id": 7, "branch_id": 3, "card_no": 42 });
    send(&app, Method::POST, "/api/v1/loans", Some("patron"), Some(key)).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/loans", Some("administrator"), None).await;
    assert_eq!(status, StatusCode::OK);
    let loans = body.as_array().unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0]["book"]["title"], "Piranesi");
    assert_eq!(loans[0]["branch"]["name"], "Riverside");
    assert_eq!(loans[0]["borrower"]["name"], "Alex");
}

#[tokio::test]
async fn test_administrator_renewal_must_move_forward() {
    let (_, app) = app().await;
    let key = json!({ "book_id": 7, "branch_id": 3, "card_no": 42 });
    send(&app, Method::POST, "/api/v1/loans", Some("patron"), Some(key)).await;

    let renew = |due: &str| json!({ "book_id": 7, "branch_id": 3, "card_no": 42, "due_date": due });

    let (status, body) = send(&app, Method::POST, "/api/v1/loans/renew", Some("administrator"), Some(renew("2024-01-08"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = send(&app, Method::POST, "/api/v1/loans/renew", Some("administrator"), Some(renew("2024-01-22"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["due_date"], "2024-01-22");

    let (status, _) = send(&app, Method::POST, "/api/v1/loans/renew", Some("patron"), Some(renew("2024-02-01"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_librarian_sets_copies() {
    let (store, app) = app().await;
    let body = json!({ "book_id": 7, "branch_id": 3, "no_of_copies": 5 });

    let (status, response) = send(&app, Method::PUT, "/api/v1/copies", Some("librarian"), Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["no_of_available_copies"], 5);
    assert_eq!(store.copies(7, 3).await, Some(CopyRecord::new(7, 3, 5, 5)));

    let (status, _) = send(&app, Method::PUT, "/api/v1/copies", Some("patron"), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_header_required() {
    let (_, app) = app().await;
    let (status, _) = send(&app, Method::GET, "/api/v1/loans", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/v1/loans", Some("visitor"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_key_rejected() {
    let (_, app) = app().await;
    let key = json!({ "book_id": 0, "branch_id": 3, "card_no": 42 });
    let (status, body) = send(&app, Method::POST, "/api/v1/loans", Some("patron"), Some(key)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}
