//! Step executors for the 8-stage pipeline.
//!
//! Each executor is a function of (persisted project state, caller-supplied
//! session data) that writes its rows, returns a payload plus the next step
//! number, and leaves retry decisions to the caller. Fan-out item failures
//! (one scene image, one frame's clip) are logged and dropped; a step only
//! fails when it produces nothing at all.

use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::poller::{PollCheck, PollOutcome, Poller};
use crate::providers::{ClipSpec, GenerationOptions, ImageSpec, Providers, VideoJob, VideoJobStatus};
use crate::store::StoreHandle;
use crate::store::models::{Clip, ClipStatus, ClipType, Frame, ProjectStatus};

use super::orchestrator::{ClipPayload, FramePayload, SessionData};
use super::scenes;

/// Seconds of screen time per storyboard frame.
pub const FRAME_DURATION_SECS: f64 = 4.0;

/// Result of one executed step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Step-specific payload, merged into the response `data` object.
    pub payload: serde_json::Value,
    pub next_step: Option<u32>,
    pub message: String,
}

fn store_err(e: anyhow::Error) -> PipelineError {
    PipelineError::Store(e)
}

// ── Step 1: creative brief ────────────────────────────────────────────

fn brief_prompt(user_message: &str, context: Option<&str>) -> String {
    format!(
        "You are a professional video production creative director. Based on the user's \
         request, create a comprehensive creative brief for video production.\n\n\
         User Request: \"{}\"\n\
         Additional Context: {}\n\n\
         Please generate a creative brief that includes:\n\
         1. PROJECT GOAL: What is the main objective?\n\
         2. TARGET AUDIENCE: Who is this video for?\n\
         3. TONE & STYLE: What mood and visual style should it have?\n\
         4. KEY SCENES: List 3-5 key scenes that tell the story (each scene should be 4 seconds)\n\
         5. VISUAL STYLE: Cinematic style, color palette, composition\n\
         6. DELIVERABLES: Final video specifications\n\n\
         Format your response as a structured creative brief that's both professional and \
         actionable.",
        user_message,
        context.unwrap_or("None provided"),
    )
}

pub async fn run_brief(
    store: &StoreHandle,
    providers: &Providers,
    project_id: &str,
    user_message: &str,
    session: &SessionData,
) -> Result<StepOutcome, PipelineError> {
    let prompt = brief_prompt(user_message, session.context.as_deref());
    let brief = providers
        .text
        .generate(&prompt, &GenerationOptions::creative())
        .await?;

    let id = project_id.to_string();
    let brief_clone = brief.clone();
    store
        .call(move |db| db.set_creative_brief(&id, &brief_clone))
        .await
        .map_err(store_err)?;

    Ok(StepOutcome {
        payload: json!({ "creativeBrief": brief }),
        next_step: Some(2),
        message: "Creative brief generated successfully! Proceeding to storyboard generation..."
            .into(),
    })
}

// ── Step 2: storyboard ────────────────────────────────────────────────

pub async fn run_storyboard(
    store: &StoreHandle,
    providers: &Providers,
    project_id: &str,
    session: &SessionData,
) -> Result<StepOutcome, PipelineError> {
    let scene_prompts = match session.scene_prompts.as_deref() {
        Some(prompts) if !prompts.is_empty() => prompts.to_vec(),
        _ => {
            let brief = session.creative_brief.as_deref().ok_or_else(|| {
                PipelineError::Validation("Creative brief or scene prompts are required".into())
            })?;
            let response = providers
                .text
                .generate(
                    &scenes::extraction_prompt(brief),
                    &GenerationOptions::extraction(),
                )
                .await?;
            scenes::scenes_from_response(&response)
        }
    };

    // Fan out one image request per scene. Frame numbers come from the
    // scene's position in the original list, assigned before filtering, so
    // failed scenes leave gaps rather than renumbering their neighbors.
    let batch_started = Utc::now().timestamp_millis();
    let requests = scene_prompts.iter().enumerate().map(|(index, scene)| {
        let image = providers.image.clone();
        let scene = scene.clone();
        let project_id = project_id.to_string();
        async move {
            let prompt = format!(
                "{}, professional cinematography, high quality, detailed, 16:9 aspect ratio",
                scene
            );
            match image.generate(&prompt, &ImageSpec::default()).await {
                Ok(image_url) => Some(Frame {
                    id: Uuid::new_v4().to_string(),
                    project_id,
                    frame_number: index as i64 + 1,
                    scene_description: scene.clone(),
                    image_prompt: scene,
                    image_url,
                    image_seed: format!("dalle-{}-{}", batch_started, index),
                    duration: FRAME_DURATION_SECS,
                }),
                Err(e) => {
                    tracing::warn!(scene = index + 1, error = %e, "scene image generation failed, dropping scene");
                    None
                }
            }
        }
    });

    let frames: Vec<Frame> = join_all(requests).await.into_iter().flatten().collect();
    if frames.is_empty() {
        return Err(PipelineError::Provider {
            message: "No storyboard frames could be generated".into(),
        });
    }

    let to_persist = frames.clone();
    let id = project_id.to_string();
    store
        .call(move |db| db.replace_frames(&id, &to_persist))
        .await
        .map_err(store_err)?;

    let requested = scene_prompts.len();
    let generated = frames.len();
    if generated < requested {
        tracing::warn!(requested, generated, "storyboard completed with partial frame set");
    }

    let frame_payloads: Vec<FramePayload> = frames.iter().map(FramePayload::from).collect();
    Ok(StepOutcome {
        payload: json!({
            "storyboardFrames": frame_payloads,
            "sceneCount": generated,
            "scenesRequested": requested,
        }),
        next_step: Some(3),
        message: "Storyboard frames generated! Creating video previews...".into(),
    })
}

// ── Steps 3 and 5: draft and final clip generation ────────────────────

pub async fn run_clip_generation(
    store: &StoreHandle,
    providers: &Providers,
    poller: &Poller,
    project_id: &str,
    session: &SessionData,
    clip_type: ClipType,
) -> Result<StepOutcome, PipelineError> {
    let frames = match session.storyboard_frames.as_deref() {
        Some(frames) if !frames.is_empty() => frames,
        _ => {
            return Err(PipelineError::Validation(
                "Storyboard frames are required".into(),
            ));
        }
    };

    let spec = match clip_type {
        ClipType::Draft => ClipSpec::draft(),
        ClipType::Final => ClipSpec::final_render(),
    };

    // Persisted frame rows resolve session frame numbers to frame ids.
    let id = project_id.to_string();
    let stored_frames = store
        .call(move |db| db.get_frames(&id))
        .await
        .map_err(store_err)?;
    let frame_ids: std::collections::HashMap<i64, String> = stored_frames
        .iter()
        .map(|f| (f.frame_number, f.id.clone()))
        .collect();

    // Strictly sequential across frames: one in-flight video job at a time
    // bounds our load on the provider.
    let mut clips: Vec<ClipPayload> = Vec::new();
    for frame in frames {
        let video_url = match generate_one_clip(providers, poller, frame, &spec).await {
            Some(url) => url,
            None => continue,
        };

        let seed = format!(
            "veo-{}-{}",
            Utc::now().timestamp_millis(),
            frame.frame_number
        );
        match frame_ids
            .get(&frame.frame_number)
            .cloned()
            .or_else(|| frame.id.clone())
        {
            Some(frame_id) => {
                let clip = Clip {
                    id: Uuid::new_v4().to_string(),
                    frame_id,
                    clip_type,
                    video_url,
                    duration: spec.duration_secs,
                    generation_seed: seed,
                    status: ClipStatus::Completed,
                };
                let to_persist = clip.clone();
                store
                    .call(move |db| db.insert_clip(&to_persist))
                    .await
                    .map_err(store_err)?;
                clips.push(ClipPayload::from_clip(&clip, frame.frame_number));
            }
            // No frame row to attach the clip to. It still goes back to the
            // caller; only the store write is skipped.
            None => {
                tracing::warn!(
                    frame = frame.frame_number,
                    "no persisted frame for generated clip, returning it unpersisted"
                );
                clips.push(ClipPayload {
                    id: None,
                    frame_number: frame.frame_number,
                    clip_type: clip_type.as_str().to_string(),
                    video_url,
                    duration: spec.duration_secs,
                    generation_seed: seed,
                    status: ClipStatus::Completed.as_str().to_string(),
                });
            }
        }
        tracing::info!(
            frame = frame.frame_number,
            clip_type = clip_type.as_str(),
            "clip generated"
        );
    }

    if clips.is_empty() {
        return Err(PipelineError::Provider {
            message: "No video clips could be generated".into(),
        });
    }

    let status = match clip_type {
        ClipType::Draft => ProjectStatus::DraftClipsGenerated,
        ClipType::Final => ProjectStatus::FinalClipsGenerated,
    };
    let id = project_id.to_string();
    store
        .call(move |db| db.update_project_status(&id, &status))
        .await
        .map_err(store_err)?;

    let (clips_key, next_step, message) = match clip_type {
        ClipType::Draft => (
            "videoClips",
            4,
            "Draft video previews ready! Please review and approve to continue.",
        ),
        ClipType::Final => (
            "finalVideoClips",
            6,
            "Final high-quality videos generated! Concatenating into single video...",
        ),
    };
    let generated = clips.len();
    Ok(StepOutcome {
        payload: json!({
            (clips_key): clips,
            "clipsGenerated": generated,
            "framesRequested": frames.len(),
            "clipType": clip_type.as_str(),
        }),
        next_step: Some(next_step),
        message: message.into(),
    })
}

/// Run one frame's image-to-video generation to a terminal result. Failures
/// and timeouts come back as `None`; the caller drops the frame and moves on.
async fn generate_one_clip(
    providers: &Providers,
    poller: &Poller,
    frame: &FramePayload,
    spec: &ClipSpec,
) -> Option<String> {
    let prompt = format!(
        "{}, cinematic motion, smooth camera movement, professional cinematography",
        frame.scene_description
    );
    let job = match providers.video.start(&frame.image_url, &prompt, spec).await {
        Ok(job) => job,
        Err(e) => {
            tracing::warn!(frame = frame.frame_number, error = %e, "video generation request failed, skipping frame");
            return None;
        }
    };

    match job {
        VideoJob::Completed { video_url } => Some(video_url),
        VideoJob::Queued { request_id } => {
            tracing::info!(frame = frame.frame_number, %request_id, "polling queued video job");
            let video = providers.video.clone();
            let outcome = poller
                .wait_for(move || {
                    let video = video.clone();
                    let request_id = request_id.clone();
                    async move {
                        Ok(match video.check(&request_id).await? {
                            VideoJobStatus::Pending => PollCheck::Pending,
                            VideoJobStatus::Completed { video_url } => {
                                PollCheck::Completed(video_url)
                            }
                            VideoJobStatus::Failed { reason } => PollCheck::Failed(reason),
                        })
                    }
                })
                .await;
            match outcome {
                PollOutcome::Completed(video_url) => Some(video_url),
                PollOutcome::Failed(reason) => {
                    tracing::warn!(frame = frame.frame_number, %reason, "video generation failed, skipping frame");
                    None
                }
                PollOutcome::TimedOut => {
                    tracing::warn!(frame = frame.frame_number, "video generation timed out, skipping frame");
                    None
                }
            }
        }
    }
}

// ── Step 6: concatenation ─────────────────────────────────────────────

pub async fn run_concatenation(
    store: &StoreHandle,
    providers: &Providers,
    project_id: &str,
    session: &SessionData,
) -> Result<StepOutcome, PipelineError> {
    // Final clips win when both generations are present in the session.
    let clips = match (
        session.final_video_clips.as_deref(),
        session.video_clips.as_deref(),
    ) {
        (Some(finals), _) if !finals.is_empty() => finals,
        (_, Some(drafts)) if !drafts.is_empty() => drafts,
        _ => {
            return Err(PipelineError::Validation("Video clips are required".into()));
        }
    };

    let clip_urls: Vec<String> = clips.iter().map(|c| c.video_url.clone()).collect();
    let output = providers
        .concat
        .concatenate(&clip_urls, session.background_audio.as_deref())
        .await?;

    let total_duration: f64 = clips.iter().map(|c| c.duration).sum();
    let id = project_id.to_string();
    let video_url = output.video_url.clone();
    let thumbnail_url = output.thumbnail_url.clone();
    store
        .call(move |db| {
            db.set_final_video(&id, &video_url, thumbnail_url.as_deref(), total_duration)
        })
        .await
        .map_err(store_err)?;

    Ok(StepOutcome {
        payload: json!({
            "finalVideoUrl": output.video_url,
            "thumbnailUrl": output.thumbnail_url,
            "totalDuration": total_duration,
        }),
        next_step: Some(7),
        message: "Video concatenation completed! Generating project playbook...".into(),
    })
}

// ── Step 7: playbook ──────────────────────────────────────────────────

fn playbook_prompt(brief: &str, frames: &[Frame], final_video_url: Option<&str>) -> String {
    let frame_lines: String = frames
        .iter()
        .map(|f| {
            format!(
                "- Frame {}: prompt=\"{}\" seed={} duration={}s\n",
                f.frame_number, f.image_prompt, f.image_seed, f.duration
            )
        })
        .collect();
    format!(
        "Produce a structured reproducibility playbook for this video project as JSON with \
         keys: parameters, seeds, tools, stages. Record every parameter and seed needed to \
         reproduce or remix the project.\n\n\
         Creative Brief:\n{}\n\n\
         Storyboard frames:\n{}\n\
         Final video: {}\n\
         Tools used: gemini-1.5-pro (text), dall-e-3 (images), veo-3 (video).",
        brief,
        frame_lines,
        final_video_url.unwrap_or("not yet available"),
    )
}

pub async fn run_playbook(
    store: &StoreHandle,
    providers: &Providers,
    project_id: &str,
    session: &SessionData,
) -> Result<StepOutcome, PipelineError> {
    let id = project_id.to_string();
    let (project, frames) = store
        .call(move |db| {
            let project = db
                .get_project(&id)?
                .ok_or_else(|| anyhow::anyhow!("Project {} not found", id))?;
            let frames = db.get_frames(&project.id)?;
            Ok((project, frames))
        })
        .await
        .map_err(store_err)?;

    let brief = session
        .creative_brief
        .clone()
        .or(project.creative_brief)
        .ok_or_else(|| PipelineError::Validation("Creative brief is required".into()))?;
    let final_video_url = project
        .final_video_url
        .or_else(|| session.final_video_url.clone());

    let content = providers
        .text
        .generate(
            &playbook_prompt(&brief, &frames, final_video_url.as_deref()),
            &GenerationOptions::creative(),
        )
        .await?;

    let id = project_id.to_string();
    let playbook_id = Uuid::new_v4().to_string();
    let content_clone = content.clone();
    let playbook = store
        .call(move |db| db.upsert_playbook(&playbook_id, &id, &content_clone))
        .await
        .map_err(store_err)?;

    Ok(StepOutcome {
        payload: json!({
            "playbook": playbook.content,
            "playbookId": playbook.id,
        }),
        next_step: Some(8),
        message: "Project playbook generated! Publishing project...".into(),
    })
}

// ── Step 8: publish ───────────────────────────────────────────────────

pub async fn run_publish(
    store: &StoreHandle,
    project_id: &str,
) -> Result<StepOutcome, PipelineError> {
    let id = project_id.to_string();
    store
        .call(move |db| db.publish_project(&id))
        .await
        .map_err(store_err)?;

    Ok(StepOutcome {
        payload: json!({
            "status": "completed",
            "isComplete": true,
        }),
        next_step: None,
        message: "Project completed and published!".into(),
    })
}
