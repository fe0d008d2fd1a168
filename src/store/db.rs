use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::models::*;

/// Async-safe handle to the project store.
///
/// Wraps `ProjectStore` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<std::sync::Mutex<ProjectStore>>,
}

impl StoreHandle {
    pub fn new(store: ProjectStore) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(store)),
        }
    }

    /// Run a closure with access to the store on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ProjectStore) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store
                .lock()
                .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("Store task panicked")?
    }
}

pub struct ProjectStore {
    conn: Connection,
}

impl ProjectStore {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS projects (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    creative_brief TEXT,
                    status TEXT NOT NULL DEFAULT 'started',
                    scene_count INTEGER NOT NULL DEFAULT 0,
                    total_duration REAL NOT NULL DEFAULT 0,
                    final_video_url TEXT,
                    thumbnail_url TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS storyboard_frames (
                    id TEXT PRIMARY KEY,
                    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    frame_number INTEGER NOT NULL,
                    scene_description TEXT NOT NULL,
                    image_prompt TEXT NOT NULL,
                    image_url TEXT NOT NULL,
                    image_seed TEXT NOT NULL,
                    duration REAL NOT NULL DEFAULT 4.0,
                    UNIQUE(project_id, frame_number)
                );

                CREATE TABLE IF NOT EXISTS video_clips (
                    id TEXT PRIMARY KEY,
                    frame_id TEXT NOT NULL REFERENCES storyboard_frames(id) ON DELETE CASCADE,
                    clip_type TEXT NOT NULL,
                    video_url TEXT NOT NULL,
                    duration REAL NOT NULL DEFAULT 0,
                    generation_seed TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending'
                );

                CREATE TABLE IF NOT EXISTS playbooks (
                    id TEXT PRIMARY KEY,
                    project_id TEXT NOT NULL UNIQUE REFERENCES projects(id) ON DELETE CASCADE,
                    content TEXT NOT NULL,
                    published INTEGER NOT NULL DEFAULT 0,
                    published_at TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS progress_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    step INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    message TEXT NOT NULL,
                    payload TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_frames_project
                    ON storyboard_frames(project_id, frame_number);
                CREATE INDEX IF NOT EXISTS idx_clips_frame ON video_clips(frame_id, clip_type);
                CREATE INDEX IF NOT EXISTS idx_events_project ON progress_events(project_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Project CRUD ──────────────────────────────────────────────────

    pub fn create_project(&self, id: &str, title: &str) -> Result<Project> {
        self.conn
            .execute(
                "INSERT INTO projects (id, title) VALUES (?1, ?2)",
                params![id, title],
            )
            .context("Failed to insert project")?;
        self.get_project(id)?
            .ok_or_else(|| anyhow::anyhow!("Project {} not found after insert", id))
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.conn
            .query_row(
                "SELECT id, title, creative_brief, status, scene_count, total_duration,
                        final_video_url, thumbnail_url, created_at, updated_at
                 FROM projects WHERE id = ?1",
                params![id],
                row_to_project,
            )
            .optional()
            .context("Failed to query project")
    }

    pub fn update_project_status(&self, id: &str, status: &ProjectStatus) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE projects SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![status.as_str(), id],
            )
            .context("Failed to update project status")?;
        if changed == 0 {
            anyhow::bail!("Project {} not found", id);
        }
        Ok(())
    }

    pub fn set_creative_brief(&self, id: &str, brief: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE projects SET creative_brief = ?1, status = ?2,
                        updated_at = datetime('now')
                 WHERE id = ?3",
                params![brief, ProjectStatus::BriefGenerated.as_str(), id],
            )
            .context("Failed to store creative brief")?;
        if changed == 0 {
            anyhow::bail!("Project {} not found", id);
        }
        Ok(())
    }

    pub fn set_final_video(
        &self,
        id: &str,
        video_url: &str,
        thumbnail_url: Option<&str>,
        total_duration: f64,
    ) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE projects SET final_video_url = ?1, thumbnail_url = ?2,
                        total_duration = ?3, status = ?4, updated_at = datetime('now')
                 WHERE id = ?5",
                params![
                    video_url,
                    thumbnail_url,
                    total_duration,
                    ProjectStatus::VideoConcatenated.as_str(),
                    id
                ],
            )
            .context("Failed to store final video reference")?;
        if changed == 0 {
            anyhow::bail!("Project {} not found", id);
        }
        Ok(())
    }

    // ── Frames ────────────────────────────────────────────────────────

    /// Replace the project's entire frame set. Re-running storyboard
    /// generation overwrites prior frames rather than duplicating them.
    pub fn replace_frames(&self, project_id: &str, frames: &[Frame]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to start frame transaction")?;
        tx.execute(
            "DELETE FROM storyboard_frames WHERE project_id = ?1",
            params![project_id],
        )
        .context("Failed to clear prior frames")?;
        for frame in frames {
            tx.execute(
                "INSERT INTO storyboard_frames
                    (id, project_id, frame_number, scene_description, image_prompt,
                     image_url, image_seed, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    frame.id,
                    project_id,
                    frame.frame_number,
                    frame.scene_description,
                    frame.image_prompt,
                    frame.image_url,
                    frame.image_seed,
                    frame.duration
                ],
            )
            .context("Failed to insert frame")?;
        }
        tx.execute(
            "UPDATE projects SET scene_count = ?1, status = ?2, updated_at = datetime('now')
             WHERE id = ?3",
            params![
                frames.len() as i64,
                ProjectStatus::StoryboardGenerated.as_str(),
                project_id
            ],
        )
        .context("Failed to update project scene count")?;
        tx.commit().context("Failed to commit frame replacement")
    }

    pub fn get_frame(&self, frame_id: &str) -> Result<Option<Frame>> {
        self.conn
            .query_row(
                "SELECT id, project_id, frame_number, scene_description, image_prompt,
                        image_url, image_seed, duration
                 FROM storyboard_frames WHERE id = ?1",
                params![frame_id],
                row_to_frame,
            )
            .optional()
            .context("Failed to query frame")
    }

    /// Frames for a project, ordered by frame number.
    pub fn get_frames(&self, project_id: &str) -> Result<Vec<Frame>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, frame_number, scene_description, image_prompt,
                        image_url, image_seed, duration
                 FROM storyboard_frames WHERE project_id = ?1 ORDER BY frame_number",
            )
            .context("Failed to prepare frame query")?;
        let frames = stmt
            .query_map(params![project_id], row_to_frame)
            .context("Failed to query frames")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read frame rows")?;
        Ok(frames)
    }

    /// Overwrite a frame in place: same id and frame number, new content.
    pub fn update_frame(
        &self,
        frame_id: &str,
        scene_description: &str,
        image_prompt: &str,
        image_url: &str,
        image_seed: &str,
    ) -> Result<Frame> {
        let changed = self
            .conn
            .execute(
                "UPDATE storyboard_frames
                 SET scene_description = ?1, image_prompt = ?2, image_url = ?3, image_seed = ?4
                 WHERE id = ?5",
                params![scene_description, image_prompt, image_url, image_seed, frame_id],
            )
            .context("Failed to update frame")?;
        if changed == 0 {
            anyhow::bail!("Frame {} not found", frame_id);
        }
        self.get_frame(frame_id)?
            .ok_or_else(|| anyhow::anyhow!("Frame {} not found after update", frame_id))
    }

    // ── Clips ─────────────────────────────────────────────────────────

    /// Insert a clip, superseding any prior clip of the same type for the
    /// frame. At most one completed clip per (frame, type) at any time.
    pub fn insert_clip(&self, clip: &Clip) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to start clip transaction")?;
        tx.execute(
            "DELETE FROM video_clips WHERE frame_id = ?1 AND clip_type = ?2",
            params![clip.frame_id, clip.clip_type.as_str()],
        )
        .context("Failed to supersede prior clip")?;
        tx.execute(
            "INSERT INTO video_clips
                (id, frame_id, clip_type, video_url, duration, generation_seed, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                clip.id,
                clip.frame_id,
                clip.clip_type.as_str(),
                clip.video_url,
                clip.duration,
                clip.generation_seed,
                clip.status.as_str()
            ],
        )
        .context("Failed to insert clip")?;
        tx.commit().context("Failed to commit clip insert")
    }

    /// Clips of the given type for a project, ordered by frame number.
    pub fn get_clips(&self, project_id: &str, clip_type: ClipType) -> Result<Vec<Clip>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT c.id, c.frame_id, c.clip_type, c.video_url, c.duration,
                        c.generation_seed, c.status
                 FROM video_clips c
                 JOIN storyboard_frames f ON f.id = c.frame_id
                 WHERE f.project_id = ?1 AND c.clip_type = ?2
                 ORDER BY f.frame_number",
            )
            .context("Failed to prepare clip query")?;
        let clips = stmt
            .query_map(params![project_id, clip_type.as_str()], row_to_clip)
            .context("Failed to query clips")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read clip rows")?;
        Ok(clips)
    }

    // ── Playbooks ─────────────────────────────────────────────────────

    /// Create or overwrite the project's single playbook row.
    pub fn upsert_playbook(&self, id: &str, project_id: &str, content: &str) -> Result<Playbook> {
        self.conn
            .execute(
                "INSERT INTO playbooks (id, project_id, content) VALUES (?1, ?2, ?3)
                 ON CONFLICT(project_id) DO UPDATE SET content = excluded.content",
                params![id, project_id, content],
            )
            .context("Failed to upsert playbook")?;
        self.conn
            .execute(
                "UPDATE projects SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![ProjectStatus::PlaybookGenerated.as_str(), project_id],
            )
            .context("Failed to update project status for playbook")?;
        self.get_playbook(project_id)?
            .ok_or_else(|| anyhow::anyhow!("Playbook for {} not found after upsert", project_id))
    }

    pub fn get_playbook(&self, project_id: &str) -> Result<Option<Playbook>> {
        self.conn
            .query_row(
                "SELECT id, project_id, content, published, published_at, created_at
                 FROM playbooks WHERE project_id = ?1",
                params![project_id],
                row_to_playbook,
            )
            .optional()
            .context("Failed to query playbook")
    }

    /// Flip project and playbook to published.
    pub fn publish_project(&self, project_id: &str) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to start publish transaction")?;
        let changed = tx
            .execute(
                "UPDATE projects SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![ProjectStatus::Published.as_str(), project_id],
            )
            .context("Failed to publish project")?;
        if changed == 0 {
            anyhow::bail!("Project {} not found", project_id);
        }
        tx.execute(
            "UPDATE playbooks SET published = 1, published_at = datetime('now')
             WHERE project_id = ?1",
            params![project_id],
        )
        .context("Failed to publish playbook")?;
        tx.commit().context("Failed to commit publish")
    }

    // ── Progress events ───────────────────────────────────────────────

    /// Append-only; events are never mutated or deleted.
    pub fn append_event(
        &self,
        project_id: &str,
        step: u32,
        status: EventStatus,
        message: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<ProgressEvent> {
        let payload_text = payload.map(|p| p.to_string());
        self.conn
            .execute(
                "INSERT INTO progress_events (project_id, step, status, message, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![project_id, step, status.as_str(), message, payload_text],
            )
            .context("Failed to append progress event")?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, project_id, step, status, message, payload, created_at
                 FROM progress_events WHERE id = ?1",
                params![id],
                row_to_event,
            )
            .context("Failed to read back progress event")
    }

    /// The most recent event for a project; used for resume after a crash.
    pub fn latest_event(&self, project_id: &str) -> Result<Option<ProgressEvent>> {
        self.conn
            .query_row(
                "SELECT id, project_id, step, status, message, payload, created_at
                 FROM progress_events WHERE project_id = ?1 ORDER BY id DESC LIMIT 1",
                params![project_id],
                row_to_event,
            )
            .optional()
            .context("Failed to query latest progress event")
    }

    pub fn list_events(&self, project_id: &str) -> Result<Vec<ProgressEvent>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, step, status, message, payload, created_at
                 FROM progress_events WHERE project_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare event query")?;
        let events = stmt
            .query_map(params![project_id], row_to_event)
            .context("Failed to query events")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read event rows")?;
        Ok(events)
    }
}

// ── Row mapping ───────────────────────────────────────────────────────

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let status_text: String = row.get(3)?;
    Ok(Project {
        id: row.get(0)?,
        title: row.get(1)?,
        creative_brief: row.get(2)?,
        status: ProjectStatus::from_str(&status_text).unwrap_or(ProjectStatus::Started),
        scene_count: row.get(4)?,
        total_duration: row.get(5)?,
        final_video_url: row.get(6)?,
        thumbnail_url: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn row_to_frame(row: &rusqlite::Row<'_>) -> rusqlite::Result<Frame> {
    Ok(Frame {
        id: row.get(0)?,
        project_id: row.get(1)?,
        frame_number: row.get(2)?,
        scene_description: row.get(3)?,
        image_prompt: row.get(4)?,
        image_url: row.get(5)?,
        image_seed: row.get(6)?,
        duration: row.get(7)?,
    })
}

fn row_to_clip(row: &rusqlite::Row<'_>) -> rusqlite::Result<Clip> {
    let type_text: String = row.get(2)?;
    let status_text: String = row.get(6)?;
    Ok(Clip {
        id: row.get(0)?,
        frame_id: row.get(1)?,
        clip_type: ClipType::from_str(&type_text).unwrap_or(ClipType::Draft),
        video_url: row.get(3)?,
        duration: row.get(4)?,
        generation_seed: row.get(5)?,
        status: ClipStatus::from_str(&status_text).unwrap_or(ClipStatus::Pending),
    })
}

fn row_to_playbook(row: &rusqlite::Row<'_>) -> rusqlite::Result<Playbook> {
    let published: i64 = row.get(3)?;
    Ok(Playbook {
        id: row.get(0)?,
        project_id: row.get(1)?,
        content: row.get(2)?,
        published: published != 0,
        published_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProgressEvent> {
    let status_text: String = row.get(3)?;
    let payload_text: Option<String> = row.get(5)?;
    Ok(ProgressEvent {
        id: row.get(0)?,
        project_id: row.get(1)?,
        step: row.get(2)?,
        status: EventStatus::from_str(&status_text).unwrap_or(EventStatus::Processing),
        message: row.get(4)?,
        payload: payload_text.and_then(|t| serde_json::from_str(&t).ok()),
        created_at: row.get(6)?,
    })
}
