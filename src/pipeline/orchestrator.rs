//! Pipeline orchestrator: request envelope in, executed step out.
//!
//! The orchestrator owns the step dispatch table and the progress-event
//! bracket around each executed step (a `processing` event before, a
//! `completed` or `error` event after). The review gate at step 4 is the one
//! exception: it reads and writes nothing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::poller::Poller;
use crate::providers::{ImageSpec, Providers};
use crate::store::StoreHandle;
use crate::store::models::{Clip, ClipType, EventStatus, Frame, ProjectStatus};

use super::steps::{self, StepOutcome};

pub const FIRST_STEP: u32 = 1;
pub const LAST_STEP: u32 = 8;

/// What the caller wants done this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    Start,
    RegenerateFrame,
}

/// Storyboard frame as it travels through session data and responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub frame_number: i64,
    pub scene_description: String,
    #[serde(default)]
    pub image_prompt: String,
    pub image_url: String,
    #[serde(default)]
    pub image_seed: String,
    #[serde(default = "default_frame_duration")]
    pub duration: f64,
}

fn default_frame_duration() -> f64 {
    steps::FRAME_DURATION_SECS
}

impl From<&Frame> for FramePayload {
    fn from(frame: &Frame) -> Self {
        Self {
            id: Some(frame.id.clone()),
            frame_number: frame.frame_number,
            scene_description: frame.scene_description.clone(),
            image_prompt: frame.image_prompt.clone(),
            image_url: frame.image_url.clone(),
            image_seed: frame.image_seed.clone(),
            duration: frame.duration,
        }
    }
}

/// Video clip as it travels through session data and responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub frame_number: i64,
    #[serde(default)]
    pub clip_type: String,
    pub video_url: String,
    pub duration: f64,
    #[serde(default)]
    pub generation_seed: String,
    #[serde(default)]
    pub status: String,
}

impl ClipPayload {
    pub fn from_clip(clip: &Clip, frame_number: i64) -> Self {
        Self {
            id: Some(clip.id.clone()),
            frame_number,
            clip_type: clip.clip_type.as_str().to_string(),
            video_url: clip.video_url.clone(),
            duration: clip.duration,
            generation_seed: clip.generation_seed.clone(),
            status: clip.status.as_str().to_string(),
        }
    }
}

/// Client-held working state, echoed back with each request. The store is the
/// durable record; the session carries the subset a step needs from its
/// predecessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionData {
    pub context: Option<String>,
    pub creative_brief: Option<String>,
    pub scene_prompts: Option<Vec<String>>,
    pub storyboard_frames: Option<Vec<FramePayload>>,
    pub video_clips: Option<Vec<ClipPayload>>,
    pub final_video_clips: Option<Vec<ClipPayload>>,
    pub background_audio: Option<String>,
    pub final_video_url: Option<String>,
}

/// One pipeline advance request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvanceRequest {
    pub user_message: Option<String>,
    pub project_id: Option<String>,
    pub step: u32,
    pub action: Action,
    pub session_data: SessionData,
    pub frame_id: Option<String>,
    pub new_prompt: Option<String>,
}

impl Default for AdvanceRequest {
    fn default() -> Self {
        Self {
            user_message: None,
            project_id: None,
            step: FIRST_STEP,
            action: Action::Start,
            session_data: SessionData::default(),
            frame_id: None,
            new_prompt: None,
        }
    }
}

/// Result of an advance: the step payload plus routing fields, already merged
/// into one object for the response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceOutput {
    #[serde(flatten)]
    pub data: serde_json::Value,
}

pub struct Orchestrator {
    store: StoreHandle,
    providers: Providers,
    poller: Poller,
}

impl Orchestrator {
    pub fn new(store: StoreHandle, providers: Providers, poller: Poller) -> Self {
        Self {
            store,
            providers,
            poller,
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Execute one pipeline request to completion.
    pub async fn advance(&self, req: AdvanceRequest) -> Result<AdvanceOutput, PipelineError> {
        if req.action == Action::RegenerateFrame {
            return self.regenerate_frame(&req).await;
        }

        let step = req.step;
        if !(FIRST_STEP..=LAST_STEP).contains(&step) {
            return Err(PipelineError::UnknownStep { step });
        }
        if step == FIRST_STEP {
            let message = req.user_message.as_deref().unwrap_or("").trim();
            if message.is_empty() {
                return Err(PipelineError::Validation(
                    "A user message is required to start a project".into(),
                ));
            }
        }

        let project_id = self.resolve_project(req.project_id.clone()).await?;

        // Review gate: report readiness and hand control back to the caller.
        if step == 4 {
            return Ok(merge_output(
                json!({ "status": ProjectStatus::AwaitingReview.as_str() }),
                &project_id,
                Some(5),
                "Draft clips are ready for review. Approve to generate final videos.",
            ));
        }

        self.record(&project_id, step, EventStatus::Processing, start_message(step), None)
            .await?;

        match self.run_step(step, &project_id, &req).await {
            Ok(outcome) => {
                self.record(
                    &project_id,
                    step,
                    EventStatus::Completed,
                    &outcome.message,
                    Some(&outcome.payload),
                )
                .await?;
                tracing::info!(%project_id, step, "pipeline step completed");
                Ok(merge_output(
                    outcome.payload,
                    &project_id,
                    outcome.next_step,
                    &outcome.message,
                ))
            }
            Err(e) => {
                tracing::error!(%project_id, step, error = %e, "pipeline step failed");
                // Best effort: the step error is what the caller must see even
                // if the event row cannot be written.
                if let Err(record_err) = self
                    .record(&project_id, step, EventStatus::Error, &e.to_string(), None)
                    .await
                {
                    tracing::warn!(%project_id, step, error = %record_err, "failed to record error event");
                }
                Err(e)
            }
        }
    }

    async fn run_step(
        &self,
        step: u32,
        project_id: &str,
        req: &AdvanceRequest,
    ) -> Result<StepOutcome, PipelineError> {
        let session = &req.session_data;
        match step {
            1 => {
                let message = req.user_message.as_deref().unwrap_or("").trim();
                steps::run_brief(&self.store, &self.providers, project_id, message, session).await
            }
            2 => steps::run_storyboard(&self.store, &self.providers, project_id, session).await,
            3 => {
                steps::run_clip_generation(
                    &self.store,
                    &self.providers,
                    &self.poller,
                    project_id,
                    session,
                    ClipType::Draft,
                )
                .await
            }
            5 => {
                steps::run_clip_generation(
                    &self.store,
                    &self.providers,
                    &self.poller,
                    project_id,
                    session,
                    ClipType::Final,
                )
                .await
            }
            6 => steps::run_concatenation(&self.store, &self.providers, project_id, session).await,
            7 => steps::run_playbook(&self.store, &self.providers, project_id, session).await,
            8 => steps::run_publish(&self.store, project_id).await,
            other => Err(PipelineError::UnknownStep { step: other }),
        }
    }

    /// Replace one storyboard frame's image without touching its neighbors or
    /// the step counter.
    async fn regenerate_frame(&self, req: &AdvanceRequest) -> Result<AdvanceOutput, PipelineError> {
        let frame_id = req
            .frame_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::Validation("A frame id is required to regenerate a frame".into())
            })?;
        let new_prompt = req
            .new_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                PipelineError::Validation("A new prompt is required to regenerate a frame".into())
            })?;

        let lookup_id = frame_id.to_string();
        let frame = self
            .store
            .call(move |db| db.get_frame(&lookup_id))
            .await
            .map_err(PipelineError::Store)?
            .ok_or_else(|| {
                PipelineError::Validation(format!("Frame {} not found", frame_id))
            })?;
        let project_id = frame.project_id.clone();

        self.record(
            &project_id,
            req.step,
            EventStatus::Processing,
            &format!("Regenerating frame {}...", frame.frame_number),
            None,
        )
        .await?;

        let result = self.regenerate_frame_image(&frame, new_prompt).await;
        match result {
            Ok(updated) => {
                let payload = json!({ "frame": FramePayload::from(&updated) });
                let message = format!("Frame {} regenerated successfully!", updated.frame_number);
                self.record(
                    &project_id,
                    req.step,
                    EventStatus::Completed,
                    &message,
                    Some(&payload),
                )
                .await?;
                Ok(merge_output(payload, &project_id, None, &message))
            }
            Err(e) => {
                tracing::error!(%project_id, frame_id, error = %e, "frame regeneration failed");
                if let Err(record_err) = self
                    .record(&project_id, req.step, EventStatus::Error, &e.to_string(), None)
                    .await
                {
                    tracing::warn!(%project_id, error = %record_err, "failed to record error event");
                }
                Err(e)
            }
        }
    }

    async fn regenerate_frame_image(
        &self,
        frame: &Frame,
        new_prompt: &str,
    ) -> Result<Frame, PipelineError> {
        let full_prompt = format!(
            "{}, professional cinematography, high quality, detailed, 16:9 aspect ratio",
            new_prompt
        );
        let image_url = self
            .providers
            .image
            .generate(&full_prompt, &ImageSpec::default())
            .await?;
        let seed = format!("dalle-{}-regen", Utc::now().timestamp_millis());

        let frame_id = frame.id.clone();
        let prompt = new_prompt.to_string();
        self.store
            .call(move |db| db.update_frame(&frame_id, &prompt, &prompt, &image_url, &seed))
            .await
            .map_err(PipelineError::Store)
    }

    /// Use the caller's project or open a fresh one. A supplied id must name
    /// an existing project; a typo should fail validation here, not as a
    /// foreign-key violation at the first event write.
    async fn resolve_project(&self, project_id: Option<String>) -> Result<String, PipelineError> {
        match project_id {
            Some(id) if !id.trim().is_empty() => {
                let lookup = id.clone();
                let known = self
                    .store
                    .call(move |db| db.get_project(&lookup))
                    .await
                    .map_err(PipelineError::Store)?;
                if known.is_none() {
                    return Err(PipelineError::Validation(format!(
                        "Project {} not found",
                        id
                    )));
                }
                Ok(id)
            }
            _ => {
                let id = Uuid::new_v4().to_string();
                let title = format!("Video Project {}", Utc::now().format("%Y-%m-%d %H:%M"));
                let create_id = id.clone();
                self.store
                    .call(move |db| db.create_project(&create_id, &title).map(|_| ()))
                    .await
                    .map_err(PipelineError::Store)?;
                tracing::info!(project_id = %id, "created project");
                Ok(id)
            }
        }
    }

    async fn record(
        &self,
        project_id: &str,
        step: u32,
        status: EventStatus,
        message: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<(), PipelineError> {
        let project_id = project_id.to_string();
        let message = message.to_string();
        let payload = payload.cloned();
        self.store
            .call(move |db| {
                db.append_event(&project_id, step, status, &message, payload.as_ref())
                    .map(|_| ())
            })
            .await
            .map_err(PipelineError::Store)
    }
}

fn start_message(step: u32) -> &'static str {
    match step {
        1 => "Generating creative brief...",
        2 => "Generating storyboard frames...",
        3 => "Creating draft video previews...",
        5 => "Generating final high-quality videos...",
        6 => "Concatenating videos into final cut...",
        7 => "Generating project playbook...",
        8 => "Publishing project...",
        _ => "Processing...",
    }
}

fn merge_output(
    payload: serde_json::Value,
    project_id: &str,
    next_step: Option<u32>,
    message: &str,
) -> AdvanceOutput {
    let mut data = match payload {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("result".into(), other);
            map
        }
    };
    data.insert("projectId".into(), json!(project_id));
    if let Some(next) = next_step {
        data.insert("nextStep".into(), json!(next));
    }
    data.insert("message".into(), json!(message));
    AdvanceOutput {
        data: serde_json::Value::Object(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_from_camel_case() {
        let body = serde_json::json!({
            "userMessage": "Make a video about ocean conservation",
            "step": 1,
            "action": "start",
            "sessionData": {
                "creativeBrief": "brief text",
                "scenePrompts": ["a", "b"],
            }
        });
        let req: AdvanceRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.step, 1);
        assert_eq!(req.action, Action::Start);
        assert_eq!(req.session_data.creative_brief.as_deref(), Some("brief text"));
        assert_eq!(
            req.session_data.scene_prompts.as_deref(),
            Some(["a".to_string(), "b".to_string()].as_slice())
        );
        assert!(req.project_id.is_none());
    }

    #[test]
    fn regenerate_action_parses() {
        let body = serde_json::json!({
            "step": 3,
            "action": "regenerate_frame",
            "frameId": "f-1",
            "newPrompt": "a stormy sea at dusk"
        });
        let req: AdvanceRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.action, Action::RegenerateFrame);
        assert_eq!(req.frame_id.as_deref(), Some("f-1"));
    }

    #[test]
    fn missing_fields_default() {
        let req: AdvanceRequest = serde_json::from_value(serde_json::json!({"step": 4})).unwrap();
        assert_eq!(req.action, Action::Start);
        assert!(req.session_data.storyboard_frames.is_none());

        let empty: AdvanceRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(empty.step, FIRST_STEP);
    }

    #[test]
    fn output_merges_routing_fields() {
        let out = merge_output(
            serde_json::json!({"creativeBrief": "b"}),
            "p-1",
            Some(2),
            "done",
        );
        assert_eq!(out.data["projectId"], "p-1");
        assert_eq!(out.data["nextStep"], 2);
        assert_eq!(out.data["message"], "done");
        assert_eq!(out.data["creativeBrief"], "b");
    }

    #[test]
    fn frame_payload_round_trips_frame_fields() {
        let frame = Frame {
            id: "f-9".into(),
            project_id: "p-1".into(),
            frame_number: 2,
            scene_description: "a reef".into(),
            image_prompt: "a reef, cinematic".into(),
            image_url: "https://img/reef.png".into(),
            image_seed: "dalle-1-1".into(),
            duration: 4.0,
        };
        let payload = FramePayload::from(&frame);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["frameNumber"], 2);
        assert_eq!(value["imageUrl"], "https://img/reef.png");
        let back: FramePayload = serde_json::from_value(value).unwrap();
        assert_eq!(back.id.as_deref(), Some("f-9"));
    }
}
