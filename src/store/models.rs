use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a project, one per completed pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Started,
    BriefGenerated,
    StoryboardGenerated,
    DraftClipsGenerated,
    AwaitingReview,
    FinalClipsGenerated,
    VideoConcatenated,
    PlaybookGenerated,
    Published,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::BriefGenerated => "brief_generated",
            Self::StoryboardGenerated => "storyboard_generated",
            Self::DraftClipsGenerated => "draft_clips_generated",
            Self::AwaitingReview => "awaiting_review",
            Self::FinalClipsGenerated => "final_clips_generated",
            Self::VideoConcatenated => "video_concatenated",
            Self::PlaybookGenerated => "playbook_generated",
            Self::Published => "published",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "brief_generated" => Ok(Self::BriefGenerated),
            "storyboard_generated" => Ok(Self::StoryboardGenerated),
            "draft_clips_generated" => Ok(Self::DraftClipsGenerated),
            "awaiting_review" => Ok(Self::AwaitingReview),
            "final_clips_generated" => Ok(Self::FinalClipsGenerated),
            "video_concatenated" => Ok(Self::VideoConcatenated),
            "playbook_generated" => Ok(Self::PlaybookGenerated),
            "published" => Ok(Self::Published),
            _ => Err(format!("Invalid project status: {}", s)),
        }
    }
}

/// A clip generation is either the short draft preview or the final render —
/// never both for the same generation pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ClipType {
    Draft,
    Final,
}

impl ClipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Final => "final",
        }
    }
}

impl FromStr for ClipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "final" => Ok(Self::Final),
            _ => Err(format!("Invalid clip type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    Pending,
    Completed,
    Failed,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ClipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid clip status: {}", s)),
        }
    }
}

/// Phase of a progress event within a step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Processing,
    Completed,
    Error,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid event status: {}", s)),
        }
    }
}

/// One end-to-end video-generation request and its accumulated artifacts.
/// Owned by the orchestrator; mutated only through step executors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub creative_brief: Option<String>,
    pub status: ProjectStatus,
    pub scene_count: i64,
    pub total_duration: f64,
    pub final_video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One storyboard still plus its generation metadata. Frame numbers are
/// 1-based and unique within a project; regeneration preserves the number
/// and identity while replacing content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: String,
    pub project_id: String,
    pub frame_number: i64,
    pub scene_description: String,
    pub image_prompt: String,
    pub image_url: String,
    pub image_seed: String,
    pub duration: f64,
}

/// One generated video segment derived from a single frame. Superseded on
/// regeneration, never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    pub frame_id: String,
    pub clip_type: ClipType,
    pub video_url: String,
    pub duration: f64,
    pub generation_seed: String,
    pub status: ClipStatus,
}

/// Structured reproducibility record for a completed project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    pub id: String,
    pub project_id: String,
    pub content: String,
    pub published: bool,
    pub published_at: Option<String>,
    pub created_at: String,
}

/// Append-only audit record; the latest event for a project determines where
/// to resume after a crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub id: i64,
    pub project_id: String,
    pub step: u32,
    pub status: EventStatus,
    pub message: String,
    pub payload: Option<serde_json::Value>,
    pub created_at: String,
}
