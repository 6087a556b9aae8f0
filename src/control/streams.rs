//! Relay endpoints.
//!
//! A relay is supervised as a process worker keyed by its stream name. The media server
//! serves it at `<output_base>/<stream_name>`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::control::error::ApiError;
use crate::control::state::ControlState;
use crate::error::RegistryError;
use crate::resources::{RelayRequest, redact_credentials};
use crate::{WorkerKind, WorkerSpec, WorkerState};

pub(super) fn routes() -> Router<ControlState> {
    Router::new()
        .route("/streams", get(list_streams))
        .route("/stream/start", post(start_stream))
        .route("/stream/stop/:name", post(stop_stream))
        .route("/stream/:name", delete(stop_stream))
}

#[derive(Debug, Deserialize)]
struct StartStreamRequest {
    stream_name: String,
    rtsp_url: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct StreamResponse {
    stream_name: String,
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mediamtx_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
}

#[derive(Debug, Serialize)]
struct StreamEntry {
    stream_name: String,
    status: &'static str,
    pid: Option<u32>,
}

#[derive(Debug, Serialize)]
struct StreamList {
    total: usize,
    streams: Vec<StreamEntry>,
}

fn validate(req: &StartStreamRequest) -> Result<(), ApiError> {
    let name = req.stream_name.as_str();
    if name.is_empty() || name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(ApiError::bad_request(
            "stream_name must be a non-empty path segment without whitespace",
        ));
    }
    if req.rtsp_url.trim().is_empty() {
        return Err(ApiError::bad_request("rtsp_url must not be empty"));
    }
    Ok(())
}

/// `GET /streams`
async fn list_streams(State(state): State<ControlState>) -> Json<StreamList> {
    let streams: Vec<StreamEntry> = state
        .supervisor
        .list()
        .into_iter()
        .filter(|w| w.kind == WorkerKind::Process)
        .map(|w| {
            let running = w.state == WorkerState::Running;
            StreamEntry {
                stream_name: w.key,
                status: if running { "running" } else { "stopped" },
                pid: w.pid.filter(|_| running),
            }
        })
        .collect();
    Json(StreamList {
        total: streams.len(),
        streams,
    })
}

/// `POST /stream/start`
async fn start_stream(
    State(state): State<ControlState>,
    Json(req): Json<StartStreamRequest>,
) -> Result<(StatusCode, Json<StreamResponse>), ApiError> {
    validate(&req)?;
    let relay = RelayRequest {
        stream_name: req.stream_name,
        rtsp_url: req.rtsp_url,
        username: req.username,
        password: req.password,
    };
    tracing::info!(
        stream = %relay.stream_name,
        input = %redact_credentials(&relay.input_url()),
        "starting relay"
    );

    let worker = state
        .supervisor
        .start(&relay.stream_name, WorkerSpec::process(relay.command(&state.relay)))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(StreamResponse {
            mediamtx_url: Some(relay.output_url(&state.relay)),
            stream_name: relay.stream_name,
            status: "started",
            message: "relay started".to_string(),
            pid: worker.pid,
        }),
    ))
}

/// `POST /stream/stop/:name` and `DELETE /stream/:name`
async fn stop_stream(
    State(state): State<ControlState>,
    Path(name): Path<String>,
) -> Result<Json<StreamResponse>, ApiError> {
    let is_relay = state
        .supervisor
        .get(&name)
        .is_some_and(|w| w.kind == WorkerKind::Process);
    if !is_relay {
        return Err(RegistryError::NotFound { key: name }.into());
    }

    state.supervisor.stop(&name).await?;
    Ok(Json(StreamResponse {
        stream_name: name,
        status: "stopped",
        message: "relay stopped".to_string(),
        mediamtx_url: None,
        pid: None,
    }))
}
