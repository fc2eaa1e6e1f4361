//! Contract tests for `HttpGateway` against a mock task server.

use chrono::{Datelike, Timelike};
use serde_json::json;
use std::time::Duration;
use tasksync_client::{GatewayError, HttpGateway, TaskGateway};
use tasksync_core::{Regularity, Section, TaskDraft, TaskId, TaskPatch, Urgency, Weekday};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> HttpGateway {
    HttpGateway::new(server.uri(), Duration::from_secs(2)).unwrap()
}

fn task_json(id: &str, title: &str, section: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "why": "because",
        "urgency": "medium",
        "section": section
    })
}

#[tokio::test]
async fn test_list_section_parses_tasks() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tasks/future"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "1",
                "title": "Dentist",
                "why": "Checkup",
                "urgency": "high",
                "section": "future",
                "plannedDate": "2030-03-14"
            },
            {
                "id": "2",
                "title": "Renew passport",
                "why": "Expires soon",
                "urgency": "low",
                "section": "future",
                "plannedDate": "2030-05-01T09:30:00Z"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = gateway(&server).list(Section::Future).await.unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].urgency, Urgency::High);
    let planned = tasks[0].planned_date.expect("date-only value parsed");
    assert_eq!((planned.year(), planned.month(), planned.day()), (2030, 3, 14));
    assert_eq!(planned.hour(), 0);
    let planned = tasks[1].planned_date.expect("timestamp parsed");
    assert_eq!((planned.hour(), planned.minute()), (9, 30));
}

#[tokio::test]
async fn test_list_accepts_both_regularity_shapes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tasks/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "1",
                "title": "Gym",
                "why": "Strength",
                "section": "active",
                "regularity": ["MO", "WE", "FR"]
            },
            {
                "id": "2",
                "title": "Water plants",
                "why": "Still alive",
                "section": "active",
                "regularity": {"type": "everyNDays", "n": 3}
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = gateway(&server).list(Section::Active).await.unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(
        tasks[0].regularity,
        Some(Regularity::weekly([Weekday::Monday, Weekday::Wednesday, Weekday::Friday]).unwrap())
    );
    assert_eq!(tasks[1].regularity, Some(Regularity::every_n_days(3).unwrap()));
}

#[tokio::test]
async fn test_create_posts_draft_to_task_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/task"))
        .and(body_partial_json(json!({
            "title": "Water plants",
            "why": "They are wilting",
            "urgency": "critical",
            "section": "active"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(task_json("srv-9", "Water plants", "active")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let draft = TaskDraft::new("Water plants", "They are wilting").with_urgency(Urgency::Critical);
    let created = gateway(&server).create(&draft).await.unwrap();

    assert_eq!(created.id, TaskId::new("srv-9"));
}

#[tokio::test]
async fn test_update_sends_only_changed_fields() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/task/42"))
        .and(body_json(json!({ "title": "Renamed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("42", "Renamed", "active")))
        .expect(1)
        .mount(&server)
        .await;

    let patch = TaskPatch::default().with_title("Renamed");
    let updated = gateway(&server)
        .update(&TaskId::new("42"), &patch)
        .await
        .unwrap();

    assert_eq!(updated.title, "Renamed");
}

#[tokio::test]
async fn test_complete_and_activate_endpoints() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/task/7/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "7",
            "title": "Laundry",
            "why": "Clean clothes",
            "section": "done",
            "completedAt": "2030-01-02T03:04:05Z"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/task/7/activate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("7", "Laundry", "active")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let id = TaskId::new("7");

    let done = gateway.complete(&id).await.unwrap();
    assert_eq!(done.section, Section::Done);
    assert!(done.completed_at.is_some());
    assert_eq!(done.urgency, Urgency::Low, "Missing urgency defaults to low");

    let active = gateway.activate(&id).await.unwrap();
    assert_eq!(active.section, Section::Active);
}

#[tokio::test]
async fn test_reserved_characters_stay_in_the_id_segment() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/task/a%2Fb%3Fc/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json("a/b?c", "Odd id", "done")))
        .expect(1)
        .mount(&server)
        .await;

    let done = gateway(&server)
        .complete(&TaskId::new("a/b?c"))
        .await
        .unwrap();
    assert_eq!(done.id, TaskId::new("a/b?c"));
}

#[tokio::test]
async fn test_delete_response_shapes() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/task/message-only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Task deleted" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/task/refused"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/task/empty"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    assert!(gateway.delete(&TaskId::new("message-only")).await.unwrap());
    assert!(!gateway.delete(&TaskId::new("refused")).await.unwrap());
    assert!(gateway.delete(&TaskId::new("empty")).await.unwrap());
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/task/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Task not found" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/active"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let gateway = gateway(&server);

    let err = gateway.get(&TaskId::new("missing")).await.unwrap_err();
    assert!(err.is_not_found(), "Expected 404, got: {err:?}");

    match gateway.list(Section::Active).await {
        Err(GatewayError::Status { status, path }) => {
            assert_eq!(status, 500);
            assert_eq!(path, "/tasks/active");
        }
        other => panic!("Expected Status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/task/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = gateway(&server).get(&TaskId::new("1")).await.unwrap_err();
    assert!(
        matches!(err, GatewayError::Decode(_)),
        "Expected Decode, got: {err:?}"
    );
}

#[tokio::test]
async fn test_health_probe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let result = gateway(&server).health(Duration::from_secs(1)).await;
    assert!(result.is_ok(), "Expected healthy, got: {result:?}");
}

#[tokio::test]
async fn test_health_probe_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(100);
    let err = gateway(&server).health(timeout).await.unwrap_err();
    assert!(
        matches!(err, GatewayError::Timeout(t) if t == timeout),
        "Expected Timeout, got: {err:?}"
    );
}

#[tokio::test]
async fn test_unreachable_server() {
    // Nothing listens on the discard port.
    let gateway = HttpGateway::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();

    let err = gateway.health(Duration::from_millis(500)).await.unwrap_err();
    assert!(
        matches!(err, GatewayError::Http(_) | GatewayError::Timeout(_)),
        "Expected transport failure, got: {err:?}"
    );
}

#[test]
fn test_base_url_trailing_slash_trimmed() {
    let gateway = HttpGateway::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
    assert_eq!(gateway.base_url(), "http://localhost:8000");
}
