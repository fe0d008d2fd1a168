//! Durable project store: projects, frames, clips, playbooks, and the
//! append-only progress log.

pub mod db;
pub mod models;

pub use db::{ProjectStore, StoreHandle};
