use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::errors::PipelineError;
use crate::pipeline::{AdvanceRequest, Orchestrator};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub orchestrator: Orchestrator,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

/// Pipeline errors mapped onto the HTTP surface. Every error body carries a
/// stable code plus the step that raised it, so clients can distinguish "fix
/// your request" from "try again later" without string matching.
pub struct ApiError {
    error: PipelineError,
    step: u32,
}

impl ApiError {
    pub fn at_step(error: PipelineError, step: u32) -> Self {
        Self { error, step }
    }

    fn status(&self) -> StatusCode {
        match self.error {
            PipelineError::Validation(_) | PipelineError::UnknownStep { .. } => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            PipelineError::Provider { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::Configuration(_) | PipelineError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.error.code(),
                "message": self.error.to_string(),
                "step": self.step,
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

struct NotFound(String);

impl IntoResponse for NotFound {
    fn into_response(self) -> Response {
        let body = json!({
            "error": { "code": "NOT_FOUND", "message": self.0 }
        });
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    }
}

fn store_failure(e: anyhow::Error) -> Response {
    ApiError::at_step(PipelineError::Store(e), 0).into_response()
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/pipeline/advance", post(advance_pipeline))
        .route("/api/projects/{id}", get(get_project))
        .route("/api/projects/{id}/frames", get(get_frames))
        .route("/api/projects/{id}/events", get(get_events))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn advance_pipeline(
    State(state): State<SharedState>,
    Json(req): Json<AdvanceRequest>,
) -> Response {
    let step = req.step;
    match state.orchestrator.advance(req).await {
        Ok(output) => Json(json!({ "data": output.data })).into_response(),
        Err(e) => ApiError::at_step(e, step).into_response(),
    }
}

async fn get_project(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let lookup = id.clone();
    match state
        .orchestrator
        .store()
        .call(move |db| db.get_project(&lookup))
        .await
    {
        Ok(Some(project)) => Json(json!({ "data": project })).into_response(),
        Ok(None) => NotFound(format!("Project {} not found", id)).into_response(),
        Err(e) => store_failure(e),
    }
}

async fn get_frames(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match state
        .orchestrator
        .store()
        .call(move |db| db.get_frames(&id))
        .await
    {
        Ok(frames) => Json(json!({ "data": frames })).into_response(),
        Err(e) => store_failure(e),
    }
}

async fn get_events(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match state
        .orchestrator
        .store()
        .call(move |db| db.list_events(&id))
        .await
    {
        Ok(events) => Json(json!({ "data": events })).into_response(),
        Err(e) => store_failure(e),
    }
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::poller::Poller;
    use crate::providers::{
        ClipSpec, ConcatOutput, GenerationOptions, ImageGenerator, ImageSpec, ProviderError,
        Providers, TextGenerator, VideoConcatenator, VideoGenerator, VideoJob, VideoJobStatus,
    };
    use crate::store::{ProjectStore, StoreHandle};

    use super::*;

    struct FixedText(&'static str);

    #[async_trait]
    impl TextGenerator for FixedText {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }
    }

    struct RateLimitedText;

    #[async_trait]
    impl TextGenerator for RateLimitedText {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, ProviderError> {
            Err(ProviderError::RateLimited("quota exceeded".into()))
        }
    }

    struct FixedImage;

    #[async_trait]
    impl ImageGenerator for FixedImage {
        async fn generate(&self, _prompt: &str, _spec: &ImageSpec) -> Result<String, ProviderError> {
            Ok("https://images.test/frame.png".into())
        }
    }

    struct InstantVideo;

    #[async_trait]
    impl VideoGenerator for InstantVideo {
        async fn start(
            &self,
            _image_url: &str,
            _prompt: &str,
            _spec: &ClipSpec,
        ) -> Result<VideoJob, ProviderError> {
            Ok(VideoJob::Completed {
                video_url: "https://videos.test/clip.mp4".into(),
            })
        }

        async fn check(&self, _request_id: &str) -> Result<VideoJobStatus, ProviderError> {
            Ok(VideoJobStatus::Completed {
                video_url: "https://videos.test/clip.mp4".into(),
            })
        }
    }

    struct FixedConcat;

    #[async_trait]
    impl VideoConcatenator for FixedConcat {
        async fn concatenate(
            &self,
            _clip_urls: &[String],
            _audio_url: Option<&str>,
        ) -> Result<ConcatOutput, ProviderError> {
            Ok(ConcatOutput {
                video_url: "https://videos.test/final.mp4".into(),
                thumbnail_url: Some("https://videos.test/final.jpg".into()),
            })
        }
    }

    fn test_router_with_text(text: Arc<dyn TextGenerator>) -> Router {
        let store = StoreHandle::new(ProjectStore::new_in_memory().unwrap());
        let providers = Providers {
            text,
            image: Arc::new(FixedImage),
            video: Arc::new(InstantVideo),
            concat: Arc::new(FixedConcat),
        };
        let poller = Poller::with_schedule(Duration::from_millis(1), 3);
        let orchestrator = Orchestrator::new(store, providers, poller);
        api_router().with_state(Arc::new(AppState { orchestrator }))
    }

    fn test_router() -> Router {
        test_router_with_text(Arc::new(FixedText("A cinematic brief")))
    }

    fn advance_body(value: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/pipeline/advance")
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap()
    }

    async fn response_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let resp = test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn advance_step_one_returns_brief_and_next_step() {
        let resp = test_router()
            .oneshot(advance_body(json!({
                "userMessage": "Make a video about ocean conservation",
                "step": 1,
                "action": "start"
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = response_json(resp).await;
        assert_eq!(body["data"]["creativeBrief"], "A cinematic brief");
        assert_eq!(body["data"]["nextStep"], 2);
        assert!(body["data"]["projectId"].is_string());
    }

    #[tokio::test]
    async fn missing_user_message_is_a_validation_error() {
        let resp = test_router()
            .oneshot(advance_body(json!({ "step": 1, "action": "start" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = response_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["step"], 1);
    }

    #[tokio::test]
    async fn unknown_step_is_rejected() {
        let resp = test_router()
            .oneshot(advance_body(json!({
                "userMessage": "x",
                "step": 9,
                "action": "start"
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = response_json(resp).await;
        assert_eq!(body["error"]["code"], "UNKNOWN_STEP");
    }

    #[tokio::test]
    async fn rate_limited_provider_maps_to_429() {
        let router = test_router_with_text(Arc::new(RateLimitedText));
        let resp = router
            .oneshot(advance_body(json!({
                "userMessage": "Make a video",
                "step": 1,
                "action": "start"
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = response_json(resp).await;
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn review_gate_holds_without_side_effects() {
        let router = test_router();
        let resp = router
            .clone()
            .oneshot(advance_body(json!({
                "userMessage": "Make a video",
                "step": 1,
                "action": "start"
            })))
            .await
            .unwrap();
        let body = response_json(resp).await;
        let project_id = body["data"]["projectId"].as_str().unwrap().to_string();

        let resp = router
            .clone()
            .oneshot(advance_body(json!({
                "projectId": project_id,
                "step": 4,
                "action": "start"
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = response_json(resp).await;
        assert_eq!(body["data"]["status"], "awaiting_review");
        assert_eq!(body["data"]["nextStep"], 5);

        // The gate writes no progress events: the latest event is still the
        // step-1 completion.
        let resp = router
            .oneshot(
                Request::builder()
                    .uri(format!("/api/projects/{}/events", project_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = response_json(resp).await;
        let events = body["data"].as_array().unwrap();
        assert!(events.iter().all(|e| e["step"] != 4));
    }

    #[tokio::test]
    async fn project_lookup_404s_for_unknown_id() {
        let resp = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/projects/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = response_json(resp).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn frames_endpoint_returns_persisted_frames() {
        let router = test_router();
        let resp = router
            .clone()
            .oneshot(advance_body(json!({
                "userMessage": "ignored",
                "step": 2,
                "action": "start",
                "sessionData": { "scenePrompts": ["a reef", "a diver"] }
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = response_json(resp).await;
        let project_id = body["data"]["projectId"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["sceneCount"], 2);

        let resp = router
            .oneshot(
                Request::builder()
                    .uri(format!("/api/projects/{}/frames", project_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = response_json(resp).await;
        let frames = body["data"].as_array().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["frame_number"], 1);
    }
}
