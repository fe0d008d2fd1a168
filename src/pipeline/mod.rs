//! The 8-step video production pipeline.

pub mod orchestrator;
pub mod scenes;
pub mod steps;

pub use orchestrator::{
    Action, AdvanceOutput, AdvanceRequest, ClipPayload, FramePayload, Orchestrator, SessionData,
};
pub use steps::StepOutcome;
