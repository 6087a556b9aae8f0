//! Camera analysis endpoints.
//!
//! A camera is supervised as a stream worker under the key `camera-<camera_id>`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::control::error::ApiError;
use crate::control::state::ControlState;
use crate::detect::Detection;
use crate::{WorkerInfo, WorkerSpec};

pub(super) fn routes() -> Router<ControlState> {
    Router::new()
        .route("/analyze", post(start_analysis))
        .route("/stop-analyze", post(stop_analysis))
        .route("/analyze/:camera_id/latest", get(latest_detections))
}

/// Registry key of a camera's detection worker.
pub fn camera_key(camera_id: u64) -> String {
    format!("camera-{camera_id}")
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    camera_id: u64,
    rtsp_url: String,
}

#[derive(Debug, Deserialize)]
struct StopAnalyzeRequest {
    camera_id: u64,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    status: &'static str,
    message: String,
    worker: WorkerInfo,
}

/// `POST /analyze`
async fn start_analysis(
    State(state): State<ControlState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<(StatusCode, Json<AnalyzeResponse>), ApiError> {
    if req.rtsp_url.trim().is_empty() {
        return Err(ApiError::bad_request("rtsp_url must not be empty"));
    }
    let key = camera_key(req.camera_id);
    let worker = state
        .supervisor
        .start(&key, WorkerSpec::stream(req.rtsp_url))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AnalyzeResponse {
            status: "success",
            message: format!("analysis started for camera {}", req.camera_id),
            worker,
        }),
    ))
}

/// `POST /stop-analyze`
async fn stop_analysis(
    State(state): State<ControlState>,
    Json(req): Json<StopAnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let worker = state.supervisor.stop(&camera_key(req.camera_id)).await?;
    Ok(Json(AnalyzeResponse {
        status: "success",
        message: format!("analysis stopped for camera {}", req.camera_id),
        worker,
    }))
}

#[derive(Debug, Serialize)]
struct DetectionSummary {
    camera_id: u64,
    frame_index: u64,
    annotated: bool,
    age_ms: u64,
    count: usize,
    detections: Vec<Detection>,
}

/// `GET /analyze/:camera_id/latest`
async fn latest_detections(
    State(state): State<ControlState>,
    Path(camera_id): Path<u64>,
) -> Result<Json<DetectionSummary>, ApiError> {
    let frames = state.frames.as_ref().ok_or_else(|| ApiError::NotFound {
        code: "frames_not_retained",
        message: "this service does not retain frames".to_string(),
    })?;
    let latest = frames
        .get(&camera_key(camera_id))
        .ok_or_else(|| ApiError::NotFound {
            code: "no_frame",
            message: format!("no frame received yet for camera {camera_id}"),
        })?;

    let age_ms = latest.frame.captured_at.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;
    Ok(Json(DetectionSummary {
        camera_id,
        frame_index: latest.frame_index,
        annotated: latest.annotated,
        age_ms,
        count: latest.detections.len(),
        detections: latest.detections.to_vec(),
    }))
}
