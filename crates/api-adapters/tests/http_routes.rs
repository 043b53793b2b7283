use std::path::PathBuf;
use std::sync::Arc;

use api_adapters::{router, AppState, RouterSettings};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use domains::models::IssueStatus;
use domains::{IssueStore, MockChatTransport, MockMediaStore};
use secrecy::SecretString;
use serde_json::{json, Value};
use services::{BotEngine, EngineSettings, Ports};
use storage_adapters::MemoryIssueStore;
use tower::ServiceExt;

const TOKEN: &str = "api-token";
const WEBHOOK_PATH: &str = "/tg/webhook";

fn app() -> (Router, Arc<MemoryIssueStore>) {
    let store = Arc::new(MemoryIssueStore::new());

    let mut transport = MockChatTransport::new();
    transport.expect_send().returning(|_, _| Ok(1));
    transport.expect_delete_message().returning(|_, _| Ok(()));
    transport.expect_answer_action().returning(|_, _| Ok(()));

    let mut media = MockMediaStore::new();
    media
        .expect_save_upload()
        .returning(|_, name| Ok(format!("stored/{name}")));

    let ports = Ports::new(store.clone(), Arc::new(transport), Arc::new(media));
    let engine = Arc::new(BotEngine::new(ports, EngineSettings::new("bootstrap")));
    let state = AppState::new(
        engine,
        SecretString::from(TOKEN.to_string()),
        Some(SecretString::from("hook-secret".to_string())),
    );
    let settings = RouterSettings {
        webhook_path: WEBHOOK_PATH.to_string(),
        upload_dir: PathBuf::from("uploads"),
    };
    (router(state, &settings), store)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_web_issue(app: &Router) -> i64 {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/issues",
            json!({
                "name": "Ирина",
                "contact": "+380500000000",
                "district": "Ленинский",
                "category": "Дороги и транспорт",
                "description": "Yamy na doroge",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn admin_routes_require_the_token() {
    let (app, _) = app();

    let missing = app
        .clone()
        .oneshot(Request::get("/admin/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(Request::get("/admin/issues?token=nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = app
        .oneshot(
            Request::get(format!("/admin/ping?token={TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_checks_the_secret_header() {
    let (app, _) = app();
    let update = json!({
        "update_id": 10,
        "message": {
            "message_id": 1,
            "from": { "id": 77, "first_name": "Olga" },
            "chat": { "id": 77, "type": "private" },
            "text": "/help"
        }
    });

    let rejected = app
        .clone()
        .oneshot(json_request("POST", WEBHOOK_PATH, update.clone()))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    let mut accepted = json_request("POST", WEBHOOK_PATH, update);
    accepted
        .headers_mut()
        .insert("x-telegram-bot-api-secret-token", "hook-secret".parse().unwrap());
    let response = app.clone().oneshot(accepted).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut malformed = json_request("POST", WEBHOOK_PATH, json!({ "nope": true }));
    malformed
        .headers_mut()
        .insert("x-telegram-bot-api-secret-token", "hook-secret".parse().unwrap());
    let response = app.oneshot(malformed).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn web_submission_is_validated_against_the_catalog() {
    let (app, store) = app();
    let id = create_web_issue(&app).await;

    let issue = store.get_issue(id).await.unwrap().unwrap();
    assert_eq!(issue.status, IssueStatus::New);
    assert_eq!(issue.district.as_deref(), Some("Ленинский"));
    assert!(issue.text.unwrap().contains("Yamy na doroge"));

    let unknown = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/issues",
            json!({ "district": "Марс", "category": "Дороги и транспорт", "description": "x" }),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let half_location = app
        .oneshot(json_request(
            "POST",
            "/api/issues",
            json!({
                "district": "Ленинский",
                "category": "Дороги и транспорт",
                "description": "x",
                "latitude": 48.4
            }),
        ))
        .await
        .unwrap();
    assert_eq!(half_location.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_change_over_the_api_is_audited() {
    let (app, store) = app();
    let id = create_web_issue(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/admin/status",
            json!({ "token": TOKEN, "issue_id": id, "status": "В обработке", "comment": "принято" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let change = body_json(response).await;
    assert_eq!(change["old_status"], "Новая");
    assert_eq!(change["new_status"], "В обработке");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/admin/status",
            json!({ "token": TOKEN, "issue_id": id, "status": "done" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let trail = store.list_status_changes(id).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[1].new_status, IssueStatus::Done);
    assert_eq!(trail[1].changed_by, None);

    let unknown = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/admin/status",
            json!({ "token": TOKEN, "issue_id": id, "status": "Потеряно" }),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .oneshot(json_request(
            "POST",
            "/admin/status",
            json!({ "token": TOKEN, "issue_id": 9999, "status": "done" }),
        ))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_returns_a_csv_attachment() {
    let (app, _) = app();
    create_web_issue(&app).await;
    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/export?token={TOKEN}&from={today}&to={today}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()["content-disposition"].to_str().unwrap().to_string();
    assert_eq!(
        disposition,
        format!("attachment; filename=\"issues_{today}_{today}.csv\"")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(csv.lines().next(), Some(services::export::CSV_HEADER));
    assert!(csv.contains("Yamy na doroge"));

    let bad = app
        .oneshot(
            Request::get(format!("/export?token={TOKEN}&from=yesterday&to={today}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn catalog_is_public() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::get("/api/districts").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let districts = body_json(response).await;
    assert!(districts
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d == "Ленинский"));
}
