//! Database schema definition.
//!
//! The schema is applied on startup as an idempotent script. Triggers keep
//! `updated_at` current on every UPDATE; timestamps are RFC 3339 text.

/// Current schema version, recorded in the `metadata` table.
pub const SCHEMA_VERSION: i32 = 1;

/// Idempotent DDL for the whole store.
pub const SCHEMA_SQL: &str = r#"
-- Users: multi-passcode access
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    passcode TEXT UNIQUE NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0
);

-- Projects: group videos, captions and jobs
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- Videos: artifacts plus lineage
CREATE TABLE IF NOT EXISTS videos (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    title TEXT NOT NULL,
    filename TEXT NOT NULL,
    source_url TEXT,
    duration REAL,
    width INTEGER,
    height INTEGER,
    size_bytes INTEGER,
    is_clip INTEGER NOT NULL DEFAULT 0,
    parent_video_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (parent_video_id) REFERENCES videos(id) ON DELETE SET NULL
);

-- Jobs: durable asynchronous work records
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    priority INTEGER NOT NULL DEFAULT 0,
    project_id TEXT,
    video_id TEXT,
    input_data TEXT,
    output_data TEXT,
    progress INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL DEFAULT 3,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE
);

-- Captions: subtitle artifacts
CREATE TABLE IF NOT EXISTS captions (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    language TEXT NOT NULL DEFAULT 'en',
    format TEXT NOT NULL DEFAULT 'srt',
    style TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE
);

-- Settings: application-wide key/value configuration
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    description TEXT,
    updated_at TEXT NOT NULL
);

-- Metadata: schema version tracking
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ','now'))
);

CREATE INDEX IF NOT EXISTS idx_users_passcode ON users(passcode);
CREATE INDEX IF NOT EXISTS idx_projects_user_id ON projects(user_id);
CREATE INDEX IF NOT EXISTS idx_projects_is_deleted ON projects(is_deleted);
CREATE INDEX IF NOT EXISTS idx_videos_project_id ON videos(project_id);
CREATE INDEX IF NOT EXISTS idx_videos_is_deleted ON videos(is_deleted);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
CREATE INDEX IF NOT EXISTS idx_jobs_type ON jobs(type);
CREATE INDEX IF NOT EXISTS idx_jobs_priority ON jobs(priority DESC);
CREATE INDEX IF NOT EXISTS idx_jobs_project_id ON jobs(project_id);
CREATE INDEX IF NOT EXISTS idx_jobs_video_id ON jobs(video_id);
CREATE INDEX IF NOT EXISTS idx_captions_video_id ON captions(video_id);

CREATE TRIGGER IF NOT EXISTS projects_touch_updated_at
    AFTER UPDATE ON projects
BEGIN
    UPDATE projects SET updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ','now') WHERE id = NEW.id;
END;

CREATE TRIGGER IF NOT EXISTS videos_touch_updated_at
    AFTER UPDATE ON videos
BEGIN
    UPDATE videos SET updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ','now') WHERE id = NEW.id;
END;

CREATE TRIGGER IF NOT EXISTS jobs_touch_updated_at
    AFTER UPDATE ON jobs
BEGIN
    UPDATE jobs SET updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ','now') WHERE id = NEW.id;
END;

CREATE TRIGGER IF NOT EXISTS captions_touch_updated_at
    AFTER UPDATE ON captions
BEGIN
    UPDATE captions SET updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ','now') WHERE id = NEW.id;
END;
"#;
