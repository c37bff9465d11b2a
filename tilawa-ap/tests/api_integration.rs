//! Integration tests for the Tilawa Audio Player API
//!
//! Exercises the router end to end against an in-memory database and the
//! recording fake player: health, playback control, settings, verse text and
//! surah changes.

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tilawa_ap::api::{create_router, AppContext};
use tilawa_ap::db;
use tilawa_ap::playback::VersePlaybackEngine;
use tilawa_common::events::{EventBus, Phase};
use tilawa_common::SurahContext;

struct TestServer {
    app: axum::Router,
    engine: VersePlaybackEngine,
    factory: FakePlayerFactory,
    db_pool: Pool<Sqlite>,
}

/// Router around a fresh engine (Al-Fatiha, autoplay off) and database
async fn setup_test_server() -> TestServer {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    db::init::create_schema(&db_pool).await.unwrap();
    db::init::init_settings_defaults(&db_pool).await.unwrap();

    let factory = FakePlayerFactory::new();
    let engine = VersePlaybackEngine::spawn(
        test_config(),
        Arc::new(factory.clone()),
        SurahContext::for_surah(1).unwrap(),
        false,
        EventBus::new(64),
    );

    let app = create_router(AppContext {
        engine: engine.clone(),
        db_pool: db_pool.clone(),
        port: 5750,
    });

    TestServer {
        app,
        engine,
        factory,
        db_pool,
    }
}

/// Helper function to make HTTP requests to the test server
async fn make_request(
    app: &axum::Router,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    use axum::body::Body;
    use http::{Method, Request};
    use tower::ServiceExt;

    let method = match method {
        "GET" => Method::GET,
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        _ => panic!("Unsupported method"),
    };

    let request = Request::builder().method(method).uri(path);
    let request = match body {
        Some(json_body) => request
            .header("content-type", "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json_body = if !body.is_empty() {
        Some(serde_json::from_slice(&body).unwrap())
    } else {
        None
    };

    (status, json_body)
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = setup_test_server().await;

    let (status, body) = make_request(&server.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "tilawa-ap");
    assert_eq!(body["port"], 5750);
}

#[tokio::test]
async fn test_initial_state_is_idle() {
    let server = setup_test_server().await;

    let (status, body) = make_request(&server.app, "GET", "/api/v1/playback/state", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["surah"], 1);
    assert_eq!(body["total_verses"], 7);
    assert_eq!(body["verse"], Value::Null);
    assert_eq!(body["autoplay_enabled"], false);
}

#[tokio::test]
async fn test_play_then_state_reports_playing() {
    let server = setup_test_server().await;

    let (status, body) = make_request(
        &server.app,
        "POST",
        "/api/v1/playback/play",
        Some(json!({ "verse": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "ok");

    wait_playing(&server.engine, 5).await;

    let (_, body) = make_request(&server.app, "GET", "/api/v1/playback/state", None).await;
    let body = body.unwrap();
    assert_eq!(body["phase"], "playing");
    assert_eq!(body["verse"], 5);
    assert_eq!(body["duration_ms"], FAKE_DURATION_MS);
    assert_eq!(server.factory.created(), 1);
}

#[tokio::test]
async fn test_play_out_of_range_verse_is_rejected() {
    let server = setup_test_server().await;

    let (status, body) = make_request(
        &server.app,
        "POST",
        "/api/v1/playback/play",
        Some(json!({ "verse": 8 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.unwrap()["error"].as_str().unwrap().contains("1:8"));
    assert_eq!(server.engine.state().phase, Phase::Idle);
    assert_eq!(server.factory.created(), 0);
}

#[tokio::test]
async fn test_pause_resume_stop_round() {
    let server = setup_test_server().await;

    make_request(&server.app, "POST", "/api/v1/playback/play", Some(json!({ "verse": 1 }))).await;
    wait_playing(&server.engine, 1).await;

    let (status, _) = make_request(&server.app, "POST", "/api/v1/playback/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    wait_phase(&server.engine, Phase::Paused).await;

    let (status, _) = make_request(&server.app, "POST", "/api/v1/playback/resume", None).await;
    assert_eq!(status, StatusCode::OK);
    wait_playing(&server.engine, 1).await;

    let (status, _) = make_request(&server.app, "POST", "/api/v1/playback/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    wait_phase(&server.engine, Phase::Idle).await;

    assert_eq!(server.factory.created(), 1);
    assert_eq!(server.factory.live(), 0);
}

#[tokio::test]
async fn test_seek_endpoint() {
    let server = setup_test_server().await;

    make_request(&server.app, "POST", "/api/v1/playback/play", Some(json!({ "verse": 2 }))).await;
    wait_playing(&server.engine, 2).await;

    let (status, _) = make_request(
        &server.app,
        "POST",
        "/api/v1/playback/seek",
        Some(json!({ "position_ms": 2500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let state = wait_for_state(&server.engine, |s| {
        s.phase == Phase::Playing && s.position_ms == 2500
    })
    .await;
    assert_eq!(state.pending_seek, None);
}

#[tokio::test]
async fn test_autoplay_setting_is_persisted_and_applied() {
    let server = setup_test_server().await;

    let (status, body) = make_request(&server.app, "GET", "/api/v1/settings/autoplay", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["enabled"], false);

    let (status, body) = make_request(
        &server.app,
        "POST",
        "/api/v1/settings/autoplay",
        Some(json!({ "enabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["enabled"], true);

    assert!(db::settings::get_autoplay_enabled(&server.db_pool).await.unwrap());
    wait_for_state(&server.engine, |s| s.autoplay_enabled).await;

    let (_, body) = make_request(&server.app, "GET", "/api/v1/settings/autoplay", None).await;
    assert_eq!(body.unwrap()["enabled"], true);
}

#[tokio::test]
async fn test_change_surah_resets_session() {
    let server = setup_test_server().await;

    make_request(&server.app, "POST", "/api/v1/playback/play", Some(json!({ "verse": 3 }))).await;
    let before = wait_playing(&server.engine, 3).await;

    let (status, body) = make_request(
        &server.app,
        "POST",
        "/api/v1/playback/surah",
        Some(json!({ "surah": 114 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["surah"], 114);
    assert_eq!(body["total_verses"], 6);
    assert_eq!(body["phase"], "idle");
    assert_ne!(body["session_id"], json!(before.session_id));

    assert_eq!(server.factory.live(), 0);
    let last = db::settings::get_last_surah(&server.db_pool).await.unwrap();
    assert_eq!(last, Some(SurahContext::new(114, 6)));
}

#[tokio::test]
async fn test_change_to_unknown_surah_is_rejected() {
    let server = setup_test_server().await;

    let (status, body) = make_request(
        &server.app,
        "POST",
        "/api/v1/playback/surah",
        Some(json!({ "surah": 115 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.unwrap()["error"].is_string());
    assert_eq!(server.engine.state().surah.surah, 1);
}

#[tokio::test]
async fn test_stored_verses_are_listed_in_order() {
    let server = setup_test_server().await;

    let (status, body) = make_request(
        &server.app,
        "PUT",
        "/api/v1/surahs/112/verses/2",
        Some(json!({ "text": "Allahu s-samad", "translation": "Allah, the Eternal Refuge" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["stored_verses"], 1);
    assert_eq!(body["total_verses"], 4);

    let (status, body) = make_request(
        &server.app,
        "PUT",
        "/api/v1/surahs/112/verses/1",
        Some(json!({ "text": "Qul huwa Allahu ahad" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["stored_verses"], 2);

    let (status, body) = make_request(&server.app, "GET", "/api/v1/surahs/112/verses", None).await;

    assert_eq!(status, StatusCode::OK);
    let verses = body.unwrap();
    let verses = verses.as_array().unwrap();
    assert_eq!(verses.len(), 2);
    assert_eq!(verses[0]["number_in_surah"], 1);
    assert_eq!(verses[0]["translation"], Value::Null);
    assert_eq!(verses[1]["translation"], "Allah, the Eternal Refuge");
}

#[tokio::test]
async fn test_storing_verse_outside_surah_is_rejected() {
    let server = setup_test_server().await;

    let (status, _) = make_request(
        &server.app,
        "PUT",
        "/api/v1/surahs/112/verses/5",
        Some(json!({ "text": "not a verse" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(
        &server.app,
        "PUT",
        "/api/v1/surahs/112/verses/1",
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(db::verses::count_verses(&server.db_pool, 112).await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_verses_of_unknown_surah() {
    let server = setup_test_server().await;

    let (status, _) = make_request(&server.app, "GET", "/api/v1/surahs/0/verses", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stopped_engine_reports_unavailable() {
    let server = setup_test_server().await;
    server.engine.shutdown().await.unwrap();

    let (status, body) = make_request(&server.app, "POST", "/api/v1/playback/pause", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.unwrap()["error"].is_string());
}
