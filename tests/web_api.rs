use std::sync::Arc;

use actix_web::{test, web, App};
use serde_json::{json, Value};

use event_console::config::ConsoleConfig;
use event_console::store::MemoryStore;
use event_console::web::{configure, AppState};

fn app_state() -> web::Data<AppState> {
    let store = MemoryStore::default();
    store.set(
        "questionIntake/events",
        json!({"E1": {"name": "Open Campus", "schedules": {"S1": {"label": "Morning", "location": "Hall A"}}}}),
    );
    store.set("questionIntake/tokens", json!({"existing": {}}));
    store.set(
        "glIntake/applications/E1",
        json!({"g1": {"name": "田中"}, "g2": {"name": "佐藤", "faculty": "理学部"}}),
    );
    store.set(
        "glAssignments/E1",
        json!({"g1": {"status": "欠席"}, "g2": {"status": "team", "teamId": "A"}}),
    );
    web::Data::new(AppState::new(Arc::new(store), ConsoleConfig::default()))
}

#[actix_web::test]
async fn test_lists_events() {
    let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;
    let req = test::TestRequest::get().uri("/api/events").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body[0]["id"], "E1");
    assert_eq!(body[0]["schedules"][0]["location"], "Hall A");
}

#[actix_web::test]
async fn test_group_leaders_endpoint() {
    let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;

    let req = test::TestRequest::get()
        .uri("/api/events/E1/leaders?group=%E3%82%AD%E3%83%A3%E3%83%B3%E3%82%BB%E3%83%AB")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["leaders"], json!([{"id": "g1", "name": "田中", "meta": "欠席"}]));

    let req = test::TestRequest::get()
        .uri("/api/events/E1/leaders?group=a&schedule=S1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["leaders"][0]["name"], "佐藤");
    assert_eq!(body["leaders"][0]["meta"], "理学部");
    assert_eq!(body["scheduleId"], "S1");
    assert_eq!(body["eventId"], "E1");
}

#[actix_web::test]
async fn test_mint_requires_admin_password() {
    let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/tokens")
        .set_json(json!({"count": 2}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/tokens")
        .insert_header(("X-Admin-Password", "admin123"))
        .set_json(json!({"count": 2}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let tokens = body["tokens"].as_array().unwrap();
    assert_eq!(tokens.len(), 2);
    assert!(tokens.iter().all(|t| t.as_str().unwrap().len() == 32 && t != "existing"));
}

#[actix_web::test]
async fn test_session_resolves_deep_link() {
    let app = test::init_service(App::new().app_data(app_state()).configure(configure)).await;

    let req = test::TestRequest::get()
        .uri("/api/session?eventId=E1&scheduleId=S9&scheduleLabel=Night")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["selectedEventId"], "E1");
    assert_eq!(body["selectedScheduleId"], "S9");
    assert_eq!(body["schedule"]["label"], "Night");
    assert_eq!(body["schedule"]["synthesized"], true);
    assert!(body["schedule"].get("startAt").is_some());
    assert_eq!(body["overrides"][0]["scheduleId"], "S9");

    let req = test::TestRequest::get()
        .uri("/api/session?eventId=E404")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["selectedEventId"].is_null());
    assert!(body["notice"].as_str().unwrap().contains("E404"));
}
