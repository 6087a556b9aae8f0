//! HTTP control surface.
//!
//! A thin axum layer over an injected [`Supervisor`]: every handler translates a request into
//! one registry operation and the registry's error into an HTTP status.
//!
//! | Route                              | Operation                         |
//! |------------------------------------|-----------------------------------|
//! | `GET /`                            | service summary                   |
//! | `GET /workers`                     | all workers                       |
//! | `POST /analyze`                    | start a camera detection worker   |
//! | `POST /stop-analyze`               | stop it                           |
//! | `GET /analyze/:camera_id/latest`   | newest detection summary          |
//! | `GET /streams`                     | relay workers                     |
//! | `POST /stream/start`               | start a relay                     |
//! | `POST /stream/stop/:name`          | stop a relay                      |
//! | `DELETE /stream/:name`             | stop a relay                      |

mod analyze;
mod error;
mod service;
mod state;
mod streams;

use axum::Router;

pub use analyze::camera_key;
pub use error::{ApiError, ErrorBody};
pub use state::ControlState;

/// Builds the control router.
pub fn router(state: ControlState) -> Router {
    Router::new()
        .merge(service::routes())
        .merge(analyze::routes())
        .merge(streams::routes())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::detect::LatestFrameSink;
    use crate::testing::{FakeLauncher, OpenOutcome, ProcessPlan, ScriptedSource};
    use crate::{Config, Supervisor};

    struct Harness {
        app: Router,
        launcher: Arc<FakeLauncher>,
    }

    fn harness(launcher: FakeLauncher, source: ScriptedSource) -> Harness {
        let launcher = Arc::new(launcher);
        let frames = Arc::new(LatestFrameSink::new());
        let supervisor = Supervisor::builder(Config::default())
            .with_launcher(launcher.clone())
            .with_stream_source(Arc::new(source))
            .with_sink(frames.clone())
            .build();
        let app = router(ControlState::new(supervisor).with_frames(frames));
        Harness { app, launcher }
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app
            .clone()
            .oneshot(req.body(body).expect("request"))
            .await
            .expect("infallible");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    fn relay(name: &str) -> Value {
        json!({ "stream_name": name, "rtsp_url": "rtsp://10.0.0.8/live", "username": "admin", "password": "pw" })
    }

    #[tokio::test(start_paused = true)]
    async fn relay_lifecycle() {
        let h = harness(FakeLauncher::default(), ScriptedSource::new([]));

        let (status, body) = call(&h.app, Method::POST, "/stream/start", Some(relay("lobby"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "started");
        assert_eq!(body["mediamtx_url"], "rtsp://localhost:8554/lobby");
        assert_eq!(body["pid"], 1000);

        let (status, body) = call(&h.app, Method::POST, "/stream/start", Some(relay("lobby"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "worker_already_active");
        assert_eq!(h.launcher.spawns(), 1);

        let (status, body) = call(&h.app, Method::GET, "/streams", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["streams"][0]["stream_name"], "lobby");
        assert_eq!(body["streams"][0]["status"], "running");

        let (status, body) = call(&h.app, Method::POST, "/stream/stop/lobby", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "stopped");
        assert!(h.launcher.probes()[0].was_terminated());

        let (status, body) = call(&h.app, Method::POST, "/stream/stop/lobby", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "worker_not_found");

        call(&h.app, Method::POST, "/stream/start", Some(relay("lobby"))).await;
        let (status, _) = call(&h.app, Method::DELETE, "/stream/lobby", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&h.app, Method::GET, "/streams", None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_relay_is_listed_as_stopped_and_can_be_restarted() {
        let h = harness(FakeLauncher::default(), ScriptedSource::new([]));
        let (status, _) = call(&h.app, Method::POST, "/stream/start", Some(relay("lobby"))).await;
        assert_eq!(status, StatusCode::CREATED);

        h.launcher.probes()[0].crash();
        let (_, body) = call(&h.app, Method::GET, "/streams", None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["streams"][0]["status"], "stopped");
        assert_eq!(body["streams"][0]["pid"], Value::Null);

        let (status, body) = call(&h.app, Method::POST, "/stream/start", Some(relay("lobby"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["pid"], 1001);

        let (_, body) = call(&h.app, Method::GET, "/streams", None).await;
        assert_eq!(body["streams"][0]["status"], "running");
        assert_eq!(body["streams"][0]["pid"], 1001);
    }

    #[tokio::test(start_paused = true)]
    async fn relay_start_failures_map_to_statuses() {
        let h = harness(FakeLauncher::unavailable("ffmpeg"), ScriptedSource::new([]));
        let (status, body) = call(&h.app, Method::POST, "/stream/start", Some(relay("lobby"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "launch_unavailable");

        let plan = ProcessPlan {
            dies_at_start: true,
            diagnostics: "Connection refused".to_string(),
            ..ProcessPlan::default()
        };
        let h = harness(FakeLauncher::with_plans([plan]), ScriptedSource::new([]));
        let (status, body) = call(&h.app, Method::POST, "/stream/start", Some(relay("lobby"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "launch_exited_early");
        assert!(body["message"].as_str().expect("message").contains("Connection refused"));

        let (_, body) = call(&h.app, Method::GET, "/streams", None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn relay_requests_are_validated() {
        let h = harness(FakeLauncher::default(), ScriptedSource::new([]));
        for name in ["", "a/b", "two words"] {
            let (status, body) = call(&h.app, Method::POST, "/stream/start", Some(relay(name))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{name:?}");
            assert_eq!(body["code"], "bad_request");
        }
        assert_eq!(h.launcher.spawns(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_analysis_lifecycle() {
        let h = harness(
            FakeLauncher::default(),
            ScriptedSource::new([OpenOutcome::Frames(u32::MAX)]),
        );
        let camera = json!({ "camera_id": 7, "rtsp_url": "rtsp://10.0.0.7/stream1" });

        let (status, body) = call(&h.app, Method::POST, "/analyze", Some(camera.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");
        assert_eq!(body["worker"]["key"], "camera-7");
        assert_eq!(body["worker"]["kind"], "stream");

        let (status, _) = call(&h.app, Method::POST, "/analyze", Some(camera)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let (status, body) = call(&h.app, Method::GET, "/analyze/7/latest", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["camera_id"], 7);
        assert!(body["frame_index"].as_u64().expect("index") > 0);

        let (status, body) = call(&h.app, Method::GET, "/workers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        let (_, body) = call(&h.app, Method::GET, "/streams", None).await;
        assert_eq!(body["total"], 0);

        let stop = json!({ "camera_id": 7 });
        let (status, _) = call(&h.app, Method::POST, "/stop-analyze", Some(stop.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&h.app, Method::POST, "/stop-analyze", Some(stop)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&h.app, Method::GET, "/analyze/7/latest", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "no_frame");
    }

    #[tokio::test(start_paused = true)]
    async fn relay_stop_ignores_camera_workers() {
        let h = harness(
            FakeLauncher::default(),
            ScriptedSource::new([OpenOutcome::Frames(u32::MAX)]),
        );
        call(
            &h.app,
            Method::POST,
            "/analyze",
            Some(json!({ "camera_id": 3, "rtsp_url": "rtsp://cam/3" })),
        )
        .await;
        let (status, _) = call(&h.app, Method::DELETE, "/stream/camera-3", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&h.app, Method::GET, "/", None).await;
        assert_eq!(body["active_streams"], 1);
    }
}
