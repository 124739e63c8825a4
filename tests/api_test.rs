use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use assessment_engine::middleware::rate_limit::{session_rate_limit, SessionRateLimiter};
use assessment_engine::models::answer::QuestionId;
use assessment_engine::models::test_definition::{AnswerKey, KeyEntry, TestDefinition};
use assessment_engine::repository::MemoryResultRepository;
use assessment_engine::routes;
use assessment_engine::services::test_provider::StaticTestDefinitionProvider;
use assessment_engine::utils::clock::ManualClock;
use assessment_engine::AppState;

fn app(test_id: Uuid) -> (Router, ManualClock) {
    let definition = TestDefinition {
        test_id,
        max_score: 10.0,
        time_limit_seconds: 60,
        passing_threshold: 60.0,
        max_attempts: Some(2),
        answer_key: AnswerKey(BTreeMap::from([
            (
                QuestionId::from("q1"),
                KeyEntry {
                    expected: json!("borrow checker"),
                    weight: 7.0,
                },
            ),
            (
                QuestionId::from("q2"),
                KeyEntry {
                    expected: json!(42),
                    weight: 3.0,
                },
            ),
        ])),
    };

    let clock = ManualClock::new(Utc::now());
    let state = AppState::new(
        Arc::new(MemoryResultRepository::new()),
        Arc::new(StaticTestDefinitionProvider::new([definition])),
        None,
        Arc::new(clock.clone()),
    );

    let router = Router::new()
        .route("/api/sessions", post(routes::sessions::start_session))
        .route("/api/sessions/:id", get(routes::sessions::get_session_status))
        .route(
            "/api/sessions/:id/submit",
            post(routes::sessions::submit_session),
        )
        .route(
            "/api/sessions/:id/abandon",
            post(routes::sessions::abandon_session),
        )
        .route("/api/results/:id", get(routes::results::get_result))
        .route("/api/results", get(routes::results::list_results))
        .route(
            "/api/results/:id/feedback",
            post(routes::results::post_feedback),
        )
        .route(
            "/api/applications/:id/results",
            get(routes::results::list_results_for_application),
        )
        .route(
            "/api/tests/:id/ranking",
            get(routes::results::list_test_ranking),
        )
        .with_state(state);

    (router, clock)
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn session_flow_end_to_end_over_http() {
    let test_id = Uuid::new_v4();
    let candidate_id = Uuid::new_v4();
    let application_id = Uuid::new_v4();
    let (router, clock) = app(test_id);

    let (status, started) = call(
        &router,
        "POST",
        "/api/sessions",
        Some(json!({
            "candidate_id": candidate_id,
            "test_id": test_id,
            "application_id": application_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["attempt_number"], 1);
    let session_id = started["session_id"].as_str().unwrap().to_string();

    // A second start for the same pair is rejected while the first is live.
    let (status, error) = call(
        &router,
        "POST",
        "/api/sessions",
        Some(json!({ "candidate_id": candidate_id, "test_id": test_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "attempt_in_progress");

    let (status, probe) = call(&router, "GET", &format!("/api/sessions/{session_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(probe["status"], "in_progress");
    assert_eq!(probe["remaining_seconds"], 60);

    clock.advance(Duration::seconds(30));
    let (status, submitted) = call(
        &router,
        "POST",
        &format!("/api/sessions/{session_id}/submit"),
        Some(json!({ "answers": { "q1": "borrow checker", "q2": 41 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["status"], "completed");
    assert_eq!(submitted["score"], 7.0);
    assert_eq!(submitted["percentage"], 70);
    assert_eq!(submitted["passed"], true);
    assert_eq!(submitted["duration_seconds"], 30);

    // Double submit surfaces the benign conflict.
    let (status, error) = call(
        &router,
        "POST",
        &format!("/api/sessions/{session_id}/submit"),
        Some(json!({ "answers": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "invalid_state");

    let (status, result) = call(&router, "GET", &format!("/api/results/{session_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["score"], 7.0);
    assert_eq!(result["answers"]["q1"], "borrow checker");

    let (status, feedback) = call(
        &router,
        "POST",
        &format!("/api/results/{session_id}/feedback"),
        Some(json!({ "feedback": "strong fundamentals" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feedback["feedback"], "strong fundamentals");

    let (status, listed) = call(
        &router,
        "GET",
        &format!("/api/results?candidate_id={candidate_id}&test_id={test_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, by_application) = call(
        &router,
        "GET",
        &format!("/api/applications/{application_id}/results"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_application.as_array().unwrap().len(), 1);

    let (status, ranking) = call(
        &router,
        "GET",
        &format!("/api/tests/{test_id}/ranking?limit=5"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ranking.as_array().unwrap().len(), 1);
    assert_eq!(ranking[0]["percentage"], 70);
}

#[tokio::test]
async fn late_submit_expires_over_http() {
    let test_id = Uuid::new_v4();
    let (router, clock) = app(test_id);

    let (_, started) = call(
        &router,
        "POST",
        "/api/sessions",
        Some(json!({ "candidate_id": Uuid::new_v4(), "test_id": test_id })),
    )
    .await;
    let session_id = started["session_id"].as_str().unwrap().to_string();

    clock.advance(Duration::seconds(61));
    let (status, submitted) = call(
        &router,
        "POST",
        &format!("/api/sessions/{session_id}/submit"),
        Some(json!({ "answers": { "q1": "borrow checker", "q2": 42 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["status"], "expired");
    assert_eq!(submitted["score"], 0.0);
    assert_eq!(submitted["passed"], false);
}

#[tokio::test]
async fn attempt_limit_surfaces_as_forbidden() {
    let test_id = Uuid::new_v4();
    let candidate_id = Uuid::new_v4();
    let (router, _clock) = app(test_id);

    for _ in 0..2 {
        let (_, started) = call(
            &router,
            "POST",
            "/api/sessions",
            Some(json!({ "candidate_id": candidate_id, "test_id": test_id })),
        )
        .await;
        let session_id = started["session_id"].as_str().unwrap();
        let (status, _) = call(
            &router,
            "POST",
            &format!("/api/sessions/{session_id}/abandon"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, error) = call(
        &router,
        "POST",
        "/api/sessions",
        Some(json!({ "candidate_id": candidate_id, "test_id": test_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["error"], "attempt_limit_exceeded");
}

#[tokio::test]
async fn unknown_session_and_test_are_not_found() {
    let (router, _clock) = app(Uuid::new_v4());

    let (status, error) = call(
        &router,
        "POST",
        &format!("/api/sessions/{}/submit", Uuid::new_v4()),
        Some(json!({ "answers": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "session_not_found");

    let (status, error) = call(
        &router,
        "POST",
        "/api/sessions",
        Some(json!({ "candidate_id": Uuid::new_v4(), "test_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "not_found");
}

#[tokio::test]
async fn session_routes_shed_load_with_the_shared_error_shape() {
    let test_id = Uuid::new_v4();
    let (inner, _clock) = app(test_id);
    let router = inner.layer(axum::middleware::from_fn_with_state(
        SessionRateLimiter::new(1),
        session_rate_limit,
    ));

    let (status, started) = call(
        &router,
        "POST",
        "/api/sessions",
        Some(json!({ "candidate_id": Uuid::new_v4(), "test_id": test_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = started["session_id"].as_str().unwrap().to_string();

    let (status, error) = call(
        &router,
        "POST",
        "/api/sessions",
        Some(json!({ "candidate_id": Uuid::new_v4(), "test_id": test_id })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error["error"], "rate_limited");
    assert!(error["message"].is_string());

    // Per-session traffic rides its own bucket, so the probe still works.
    let (status, probe) = call(&router, "GET", &format!("/api/sessions/{session_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(probe["status"], "in_progress");
}
