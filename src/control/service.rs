//! Service-level endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::WorkerInfo;
use crate::control::state::ControlState;

pub(super) fn routes() -> Router<ControlState> {
    Router::new()
        .route("/", get(root))
        .route("/workers", get(list_workers))
}

#[derive(Debug, Serialize)]
struct ServiceSummary {
    service: &'static str,
    version: &'static str,
    active_streams: usize,
}

/// `GET /`
async fn root(State(state): State<ControlState>) -> Json<ServiceSummary> {
    Json(ServiceSummary {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        active_streams: state.supervisor.active_count(),
    })
}

#[derive(Debug, Serialize)]
struct WorkerList {
    total: usize,
    workers: Vec<WorkerInfo>,
}

/// `GET /workers`
async fn list_workers(State(state): State<ControlState>) -> Json<WorkerList> {
    let workers = state.supervisor.list();
    Json(WorkerList {
        total: workers.len(),
        workers,
    })
}
