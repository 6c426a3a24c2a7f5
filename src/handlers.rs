use std::collections::HashMap;
use axum::extract::{Path as AxumPath, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, trace};

use crate::errors::{ProxyError, Result};
use crate::recording::{GeneratedRecording, RecordingOutcome, RecordingParams, CONTENT_TYPE_MP4};
use crate::recording_files::{delete_file, resolve_in_dir};
use crate::utils::parse_int_param;
use crate::AppState;

pub const INVALID_RESPONSE: &str = "Invalid Response";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/list_cameras", get(list_cameras))
        .route("/get_recording", get(get_recording))
        .route("/generate_qvr_recording", get(generate_qvr_recording))
        .route("/get_recording/*filename", get(get_recording_file))
        .route("/delete_recordings/*filename", get(delete_recording).post(delete_recording))
        .route("/health_check", get(health_check))
        .with_state(state)
}

pub async fn list_cameras(State(state): State<AppState>) -> Result<Json<Value>> {
    let client = state.connector.connect().await?;
    Ok(Json(client.list_cameras().await?))
}

pub async fn get_recording(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response> {
    let params = RecordingParams {
        pre_period: parse_int_param(query.get("pre_period")),
        post_period: parse_int_param(query.get("post_period")),
        offset: parse_int_param(query.get("offset")),
    };
    trace!(?params, "get_recording called");

    let client = state.connector.connect().await?;
    let outcome = state.recordings.fetch_recording(client.as_ref(), params).await?;

    Ok(match outcome {
        RecordingOutcome::Video(body) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE_MP4)], body).into_response()
        }
        RecordingOutcome::UpstreamError(body) => ProxyError::Upstream { body }.into_response(),
        RecordingOutcome::Unexpected { .. } => {
            (StatusCode::BAD_GATEWAY, INVALID_RESPONSE).into_response()
        }
    })
}

pub async fn generate_qvr_recording(State(state): State<AppState>) -> Result<Json<GeneratedRecording>> {
    let client = state.connector.connect().await?;
    let generated = state.recordings.generate_recording(client.as_ref()).await?;
    Ok(Json(generated))
}

pub async fn get_recording_file(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
    request: Request,
) -> Response {
    let Some(path) = resolve_in_dir(state.recordings.recording_dir(), &filename) else {
        debug!("Rejected recording file path: {}", filename);
        return StatusCode::NOT_FOUND.into_response();
    };

    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

pub async fn delete_recording(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> &'static str {
    delete_file(state.recordings.recording_dir(), &filename).await.as_str()
}

pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}
