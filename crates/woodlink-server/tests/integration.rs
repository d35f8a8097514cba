use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;
use woodlink_core::config::Config;
use woodlink_core::entity::Contact;
use woodlink_core::notify::{DispatchResult, NotificationChannel, Variables};
use woodlink_core::store::WoodlinkDb;
use woodlink_core::types::TemplateKind;
use woodlink_server::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<(String, TemplateKind, Variables)>>,
}

impl RecordingChannel {
    fn sent(&self) -> Vec<(String, TemplateKind, Variables)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(
        &self,
        to: &Contact,
        template: TemplateKind,
        variables: &Variables,
        _allow_fallback: bool,
    ) -> DispatchResult {
        self.sent
            .lock()
            .unwrap()
            .push((to.phone.clone(), template, variables.clone()));
        DispatchResult::DeliveredPrimary
    }
}

struct TestApp {
    _dir: TempDir,
    app: axum::Router,
    channel: Arc<RecordingChannel>,
}

fn setup() -> TestApp {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(WoodlinkDb::open(&dir.path().join("test.redb")).unwrap());
    let channel = Arc::new(RecordingChannel::default());
    let state = AppState::new(db, channel.clone(), &Config::default());
    TestApp {
        _dir: dir,
        app: woodlink_server::build_router(state),
        channel,
    }
}

/// Send a request via `oneshot` and return (status, raw body).
async fn send(app: axum::Router, req: axum::http::Request<axum::body::Body>) -> (StatusCode, String) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

/// Send a GET request and return (status, body text).
async fn get_text(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    send(app, req).await
}

/// Send a GET request and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get_text(app, uri).await;
    let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body and return (status, parsed JSON body).
async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let (status, body) = send(app, req).await;
    let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a PUT request with a JSON body and return (status, parsed JSON body).
async fn put_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let (status, body) = send(app, req).await;
    let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Register a workshop with one priced item; returns (workshop_id, item_id).
async fn seed(app: &axum::Router) -> (String, String) {
    let (status, workshop) = post_json(
        app.clone(),
        "/workshops",
        json!({"name": "Namu Studio", "phone": "02-555-1234", "address": "Seoul"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let workshop_id = workshop["id"].as_str().unwrap().to_string();

    let (status, item) = post_json(
        app.clone(),
        "/items",
        json!({
            "workshop": workshop_id,
            "name": "oak desk",
            "category": "furniture",
            "cost": 3,
            "price": 5,
            "size": ["120x60"],
            "reason": "surface scratch",
            "img": [],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["status"], "available");
    (workshop_id, item["id"].as_str().unwrap().to_string())
}

fn claim_body(name: &str, item_id: &str) -> serde_json::Value {
    json!({
        "name": name,
        "phone": "010-1111-2222",
        "address": "Seoul Mapo-gu",
        "detailedAddress": "101-ho",
        "itemId": item_id,
    })
}

async fn item_status(app: &axum::Router, item_id: &str) -> String {
    let (_, items) = get(app.clone(), "/items").await;
    items
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["id"] == item_id)
        .map(|i| i["status"].as_str().unwrap().to_string())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn root_reports_linked() {
    let t = setup();
    let (status, body) = get_text(t.app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "linked!");
}

// ---------------------------------------------------------------------------
// Claim lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_accept_accept_cancel_lifecycle() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;

    let (status, outcome) = post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["claim"]["status"], "submitted");
    assert_eq!(outcome["claim"]["delivery_address"], "Seoul Mapo-gu, 101-ho");
    let claim_id = outcome["claim"]["id"].as_str().unwrap().to_string();
    assert_eq!(item_status(&t.app, &item_id).await, "available");
    assert_eq!(t.channel.sent().len(), 2);

    let (status, page) = get_text(t.app.clone(), &format!("/claims/accept/{claim_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("접수가 완료되었습니다."));
    assert_eq!(item_status(&t.app, &item_id).await, "claimed");
    let sent = t.channel.sent();
    assert_eq!(sent.len(), 4);
    assert!(sent[2..].iter().all(|(to, _, _)| to == "01011112222"));

    let (status, page) = get_text(t.app.clone(), &format!("/claims/accept/{claim_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("이미 접수된 신청입니다."));
    assert_eq!(t.channel.sent().len(), 4);

    let (status, _) = get_text(t.app.clone(), &format!("/claims/cancel/{claim_id}?by=workshop")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item_status(&t.app, &item_id).await, "available");
    let (to, template, vars) = t.channel.sent().pop().unwrap();
    assert_eq!(to, "025551234");
    assert_eq!(template, TemplateKind::ClaimCancelled);
    assert_eq!(vars["initiate"], "공방");

    let (status, claim) = get(t.app.clone(), &format!("/claims/{claim_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claim["status"], "cancelled");
}

#[tokio::test]
async fn accept_after_cancel_is_conflict() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    let (_, outcome) = post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;
    let claim_id = outcome["claim"]["id"].as_str().unwrap().to_string();

    get_text(t.app.clone(), &format!("/claims/cancel/{claim_id}")).await;
    let (status, body) = get_text(t.app.clone(), &format!("/claims/accept/{claim_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("error"));
    assert_eq!(item_status(&t.app, &item_id).await, "available");
}

// ---------------------------------------------------------------------------
// Submit failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_missing_field_is_400_and_writes_nothing() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    let mut body = claim_body("Kim", &item_id);
    body["phone"] = json!("");

    let (status, err) = post_json(t.app.clone(), "/claims", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap().contains("phone"));

    let (_, claims) = get(t.app.clone(), "/claims").await;
    assert!(claims.as_array().unwrap().is_empty());
    let (_, users) = get(t.app.clone(), "/users").await;
    assert!(users.as_array().unwrap().is_empty());
    assert!(t.channel.sent().is_empty());
}

#[tokio::test]
async fn submit_with_reused_phone_and_other_name_is_identity_mismatch() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    let (status, _) = post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, err) = post_json(t.app.clone(), "/claims", claim_body("Lee", &item_id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap().contains("이름이 일치하지 않습니다"));

    let (_, claims) = get(t.app.clone(), "/claims").await;
    assert_eq!(claims.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn submit_for_claimed_item_is_gone() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    let (_, outcome) = post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;
    let claim_id = outcome["claim"]["id"].as_str().unwrap().to_string();
    get_text(t.app.clone(), &format!("/claims/accept/{claim_id}")).await;

    let (status, _) = post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;
    assert_eq!(status, StatusCode::GONE);
    let (_, claims) = get(t.app.clone(), "/claims").await;
    assert_eq!(claims.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn submit_for_unknown_item_is_404() {
    let t = setup();
    let (status, _) = post_json(
        t.app.clone(),
        "/claims",
        claim_body("Kim", "00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_claim_is_404() {
    let t = setup();
    let (status, _) = get(t.app, "/claims/00000000-0000-0000-0000-000000000000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Change delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn change_delivery_updates_address_and_notifies_workshop() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    let (_, outcome) = post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;
    let claim_id = outcome["claim"]["id"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        t.app.clone(),
        "/claims/change",
        json!({
            "id": claim_id,
            "name": "Kim",
            "phone": "01011112222",
            "address": "Busan Haeundae-gu",
            "detailedAddress": "2F",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["claim"]["delivery_address"], "Busan Haeundae-gu, 2F");
    assert_eq!(body["claim"]["status"], "submitted");

    let (to, template, vars) = t.channel.sent().pop().unwrap();
    assert_eq!(to, "025551234");
    assert_eq!(template, TemplateKind::DeliveryChanged);
    assert_eq!(vars["address"], "Busan Haeundae-gu, 2F");
}

#[tokio::test]
async fn change_delivery_on_cancelled_claim_is_conflict() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    let (_, outcome) = post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;
    let claim_id = outcome["claim"]["id"].as_str().unwrap().to_string();
    get_text(t.app.clone(), &format!("/claims/cancel/{claim_id}")).await;
    let before = t.channel.sent().len();

    let (status, _) = post_json(
        t.app.clone(),
        "/claims/change",
        json!({"id": claim_id, "address": "Busan", "detailedAddress": "2F"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(t.channel.sent().len(), before);
}

// ---------------------------------------------------------------------------
// Reference entities
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claims_list_resolves_names() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;

    let (status, claims) = get(t.app.clone(), "/claims").await;
    assert_eq!(status, StatusCode::OK);
    let first = &claims.as_array().unwrap()[0];
    assert_eq!(first["user_name"], "Kim");
    assert_eq!(first["item_name"], "oak desk");
    assert_eq!(first["workshop_name"], "Namu Studio");
}

#[tokio::test]
async fn user_lookup_accepts_dashed_phone() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;

    let (status, user) = get(t.app.clone(), "/users/010-1111-2222").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["name"], "Kim");

    let (status, _) = get(t.app.clone(), "/users/01099998888").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn items_filter_by_category_and_require_workshop() {
    let t = setup();
    let (workshop_id, _) = seed(&t.app).await;

    let (_, furniture) = get(t.app.clone(), "/items?category=furniture").await;
    assert_eq!(furniture.as_array().unwrap().len(), 1);
    assert_eq!(furniture[0]["workshop_name"], "Namu Studio");
    let (_, other) = get(t.app.clone(), "/items?category=toys").await;
    assert!(other.as_array().unwrap().is_empty());

    let (status, _) = post_json(
        t.app.clone(),
        "/items",
        json!({
            "workshop": "00000000-0000-0000-0000-000000000000",
            "name": "pine shelf",
            "category": "furniture",
            "cost": 1,
            "size": [],
            "reason": "knots",
            "img": [],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!workshop_id.is_empty());
}

#[tokio::test]
async fn reviews_take_user_and_item_from_claim() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    let (_, outcome) = post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;
    let claim_id = outcome["claim"]["id"].as_str().unwrap().to_string();

    let (status, review) = post_json(
        t.app.clone(),
        "/reviews",
        json!({"claimId": claim_id, "content": "sturdy desk", "img": ""}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["item_id"], item_id);

    let (_, reviews) = get(t.app.clone(), "/reviews").await;
    let first = &reviews.as_array().unwrap()[0];
    assert_eq!(first["user_name"], "Kim");
    assert_eq!(first["workshop_name"], "Namu Studio");

    let (status, _) = post_json(
        t.app.clone(),
        "/reviews",
        json!({"claimId": "00000000-0000-0000-0000-000000000000", "content": "x"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn users_can_be_registered_updated_and_soft_deleted() {
    let t = setup();
    let (status, user) = post_json(
        t.app.clone(),
        "/users",
        json!({"name": "Kim", "phone": "010-1111-2222", "address": "Seoul"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["phone"], "01011112222");

    let (status, _) = post_json(
        t.app.clone(),
        "/users",
        json!({"name": "Lee", "phone": "01011112222", "address": "Busan"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = put_json(
        t.app.clone(),
        "/users/010-1111-2222",
        json!({"address": "Incheon", "deleted": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["address"], "Incheon");
    assert_eq!(updated["name"], "Kim");
    assert!(updated["deleted_at"].is_string());

    let (status, _) = put_json(t.app.clone(), "/users/01099998888", json!({"name": "Park"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn item_update_refuses_status_and_keeps_availability() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    let uri = format!("/items/{item_id}");

    let (status, body) = put_json(t.app.clone(), &uri, json!({"status": "claimed"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("status"));
    assert_eq!(item_status(&t.app, &item_id).await, "available");

    let (status, item) = put_json(t.app.clone(), &uri, json!({"name": "oak table", "price": 7})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["name"], "oak table");
    assert_eq!(item["price"], 7);
    assert_eq!(item["category"], "furniture");
    assert_eq!(item["status"], "available");

    let (status, _) = put_json(
        t.app.clone(),
        &uri,
        json!({"workshop": "00000000-0000-0000-0000-000000000000"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = put_json(
        t.app.clone(),
        "/items/00000000-0000-0000-0000-000000000000",
        json!({"name": "ghost"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn workshops_can_be_looked_up_by_name() {
    let t = setup();
    seed(&t.app).await;

    let (status, found) = get(t.app.clone(), "/workshops/Namu%20Studio").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["phone"], "025551234");

    let (_, none) = get(t.app.clone(), "/workshops/Nowhere").await;
    assert!(none.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn reviews_filter_by_reviewer_and_can_be_edited() {
    let t = setup();
    let (_, item_id) = seed(&t.app).await;
    let (_, outcome) = post_json(t.app.clone(), "/claims", claim_body("Kim", &item_id)).await;
    let claim_id = outcome["claim"]["id"].as_str().unwrap().to_string();
    let (_, review) = post_json(
        t.app.clone(),
        "/reviews",
        json!({"claimId": claim_id, "content": "sturdy desk", "img": "desk.png"}),
    )
    .await;
    let review_id = review["id"].as_str().unwrap().to_string();

    let (status, mine) = get(t.app.clone(), "/reviews/Kim").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, others) = get(t.app.clone(), "/reviews/Lee").await;
    assert!(others.as_array().unwrap().is_empty());

    let (status, edited) = put_json(
        t.app.clone(),
        &format!("/reviews/{review_id}"),
        json!({"content": "sturdy desk, fast delivery"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["content"], "sturdy desk, fast delivery");
    assert_eq!(edited["img"], "desk.png");

    let (status, _) = put_json(
        t.app.clone(),
        "/reviews/00000000-0000-0000-0000-000000000000",
        json!({"content": "x"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
