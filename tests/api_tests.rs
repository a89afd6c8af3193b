mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use rollsignal::config::RuntimeSettings;
use rollsignal::db::{OutcomeStore, SignalStore};
use rollsignal::ingestion::IngestorState;
use rollsignal::intelligence::StrategyEngine;
use rollsignal::models::{Color, Outcome, Prediction, Signal};

use common::{build_test_app, TestApp};

fn test_app() -> TestApp {
    build_test_app(RuntimeSettings::default(), StrategyEngine::default())
}

async fn get_json(app: &TestApp, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app
        .router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn put_config(app: &TestApp, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let resp = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/config")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app();
    let (status, json) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_recent_outcomes_most_recent_first() {
    let app = test_app();
    for o in common::alternating_outcomes(5) {
        app.store.insert_outcome(&o).await.unwrap();
    }

    let (status, json) = get_json(&app, "/api/outcomes/recent?limit=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data[0]["external_id"], "r4");
    assert_eq!(data[0]["color"], "red");
    assert_eq!(data[2]["external_id"], "r2");
}

#[tokio::test]
async fn test_signals_and_stats() {
    let app = test_app();
    let prediction = Prediction {
        color: Color::Black,
        confidence: 77.0,
        rationale: "api test".into(),
        strategy_name: "momentum".into(),
    };
    let signal = Signal::pending(&prediction, Utc::now());
    app.store.insert_signal(&signal).await.unwrap();

    let (status, json) = get_json(&app, "/api/signals/recent").await;
    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["predicted_color"], "black");
    assert_eq!(data[0]["result"], "PENDING");
    assert!(data[0]["actual_color"].is_null());

    let (status, json) = get_json(&app, &format!("/api/signals/{}", signal.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["strategy_name"], "momentum");

    let (status, json) = get_json(&app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["stats"]["total"], 1);
    assert_eq!(json["data"]["stats"]["pending"], 1);
    assert_eq!(json["data"]["stats_by_strategy"][0]["strategy"], "momentum");
}

#[tokio::test]
async fn test_unknown_signal_is_not_found() {
    let app = test_app();
    let (status, json) = get_json(&app, &format!("/api/signals/{}", uuid::Uuid::new_v4())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_status_reports_pipeline_state() {
    let app = test_app();
    app.orchestrator
        .on_new_outcome(Outcome::from_roll("s1", 0, Utc::now()).unwrap())
        .await
        .unwrap();
    app.ingestor_state.send_replace(IngestorState::Degraded);

    let (status, json) = get_json(&app, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["run_state"], "running");
    assert_eq!(json["stream"], "degraded");
    assert_eq!(json["degraded"], true);
    assert_eq!(json["last_processed_id"], "s1");
    assert_eq!(json["total_outcomes"], 1);
    assert_eq!(json["strategies"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_config_get_and_update() {
    let app = test_app();

    let (status, json) = get_json(&app, "/api/config").await;
    assert_eq!(status, StatusCode::OK);
    let entries = json.as_array().unwrap();
    assert!(entries
        .iter()
        .any(|e| e["key"] == "min_confidence" && e["value"] == "65"));

    let (status, json) = put_config(
        &app,
        serde_json::json!({ "entries": { "min_confidence": "70", "dedupe_window_secs": "45" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["updated"], 2);

    let current = app.settings.current();
    assert_eq!(current.min_confidence, 70.0);
    assert_eq!(current.dedupe_window_secs, 45);
    assert_eq!(app.orchestrator.settings(), current);
}

#[tokio::test]
async fn test_config_update_rejects_unknown_keys() {
    let app = test_app();

    let (status, json) = put_config(
        &app,
        serde_json::json!({ "entries": { "bankroll": "1000" } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(app.settings.current(), RuntimeSettings::default());

    let (status, _) = put_config(&app, serde_json::json!({ "entries": {} })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = test_app();

    let resp = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let _text = String::from_utf8(body.to_vec()).unwrap();
    // Endpoint returns valid text; the test recorder is not global, so
    // metric names may not appear.
}
