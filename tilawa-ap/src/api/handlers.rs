//! HTTP request handlers
//!
//! Playback requests are queued for the engine and answered immediately; the
//! outcome shows up in `/playback/state` and on the SSE stream.

use crate::api::server::AppContext;
use crate::db;
use crate::error::Error;
use crate::playback::PlaybackSnapshot;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tilawa_common::SurahContext;
use tracing::{error, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_profile: String,
    port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    /// Verse number within the current surah
    verse: u16,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    position_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SurahRequest {
    surah: u16,
}

#[derive(Debug, Deserialize)]
pub struct VerseTextRequest {
    text: String,
    #[serde(default)]
    translation: Option<String>,
}

/// How much of a surah's text is stored
#[derive(Debug, Serialize, Deserialize)]
pub struct VerseImportResponse {
    pub surah: u16,
    pub stored_verses: u16,
    pub total_verses: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoplayBody {
    pub enabled: bool,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        Error::InvalidKey(_) | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::EngineStopped => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn accepted(result: crate::error::Result<()>) -> ApiResult<StatusResponse> {
    result.map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "tilawa-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        port: ctx.port,
    })
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// POST /playback/play - Play a verse of the current surah
pub async fn play(
    State(ctx): State<AppContext>,
    Json(req): Json<PlayRequest>,
) -> ApiResult<StatusResponse> {
    accepted(ctx.engine.request_play(req.verse))
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    accepted(ctx.engine.request_pause())
}

/// POST /playback/resume
pub async fn resume(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    accepted(ctx.engine.request_resume())
}

/// POST /playback/stop
pub async fn stop(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    accepted(ctx.engine.request_stop())
}

/// POST /playback/seek - Seek within the current verse
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<StatusResponse> {
    accepted(ctx.engine.request_seek(req.position_ms))
}

/// GET /playback/state - Snapshot of the engine
pub async fn get_state(State(ctx): State<AppContext>) -> Json<PlaybackSnapshot> {
    Json(ctx.engine.snapshot())
}

/// POST /playback/surah - Start a new reading session
///
/// Waits until the previous session's player is released, then remembers
/// the surah for the next start.
pub async fn change_surah(
    State(ctx): State<AppContext>,
    Json(req): Json<SurahRequest>,
) -> ApiResult<PlaybackSnapshot> {
    let surah = SurahContext::for_surah(req.surah).map_err(|e| error_response(e.into()))?;

    ctx.engine.change_surah(surah).await.map_err(error_response)?;

    if let Err(e) = db::settings::set_last_surah(&ctx.db_pool, surah.surah).await {
        // Session already switched; losing the preference is not fatal
        warn!("Failed to persist last surah: {}", e);
    }

    Ok(Json(ctx.engine.snapshot()))
}

// ============================================================================
// Settings Endpoints
// ============================================================================

/// GET /settings/autoplay
pub async fn get_autoplay(State(ctx): State<AppContext>) -> ApiResult<AutoplayBody> {
    let enabled = db::settings::get_autoplay_enabled(&ctx.db_pool)
        .await
        .map_err(error_response)?;
    Ok(Json(AutoplayBody { enabled }))
}

/// POST /settings/autoplay - Persist the setting and push it into the engine
pub async fn set_autoplay(
    State(ctx): State<AppContext>,
    Json(req): Json<AutoplayBody>,
) -> ApiResult<AutoplayBody> {
    db::settings::set_autoplay_enabled(&ctx.db_pool, req.enabled)
        .await
        .map_err(error_response)?;
    ctx.engine.set_autoplay(req.enabled).map_err(error_response)?;
    Ok(Json(AutoplayBody {
        enabled: req.enabled,
    }))
}

// ============================================================================
// Verse Endpoints
// ============================================================================

/// GET /surahs/:surah/verses - Verse text of a surah
pub async fn list_verses(
    State(ctx): State<AppContext>,
    Path(surah): Path<u16>,
) -> ApiResult<Vec<db::verses::Verse>> {
    SurahContext::for_surah(surah).map_err(|e| error_response(e.into()))?;

    let verses = db::verses::list_verses(&ctx.db_pool, surah)
        .await
        .map_err(error_response)?;
    Ok(Json(verses))
}

/// PUT /surahs/:surah/verses/:verse - Store the text of one verse
pub async fn put_verse(
    State(ctx): State<AppContext>,
    Path((surah, verse)): Path<(u16, u16)>,
    Json(req): Json<VerseTextRequest>,
) -> ApiResult<VerseImportResponse> {
    let context = SurahContext::for_surah(surah).map_err(|e| error_response(e.into()))?;
    let key = context.key(verse);
    if !key.is_within(&context) {
        return Err(error_response(Error::InvalidKey(format!(
            "{} is not a verse of surah {} (1-{})",
            key, surah, context.total_verses
        ))));
    }
    if req.text.trim().is_empty() {
        return Err(error_response(Error::BadRequest("verse text is empty".to_string())));
    }

    db::verses::upsert_verse(&ctx.db_pool, surah, verse, &req.text, req.translation.as_deref())
        .await
        .map_err(error_response)?;
    let stored_verses = db::verses::count_verses(&ctx.db_pool, surah)
        .await
        .map_err(error_response)?;

    Ok(Json(VerseImportResponse {
        surah,
        stored_verses,
        total_verses: context.total_verses,
    }))
}
