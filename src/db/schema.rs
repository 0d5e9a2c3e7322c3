//! Database schema and migrations for filedepot.
//!
//! This module contains all database migrations that will be applied
//! sequentially when the database is first opened or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Folders table - the hierarchy backbone
    r#"
-- Folders form an acyclic tree; parent_id is NULL for roots
CREATE TABLE folders (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    parent_id   TEXT REFERENCES folders(id),
    owner_id    INTEGER,
    access      TEXT NOT NULL DEFAULT 'private',   -- 'private', 'public', 'shared'
    is_public   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_folders_parent_id ON folders(parent_id);
CREATE INDEX idx_folders_owner_id ON folders(owner_id);

-- Sibling names are unique case-insensitively; this closes the
-- validate-then-insert race at the store level
CREATE UNIQUE INDEX idx_folders_sibling_name
    ON folders(COALESCE(parent_id, ''), lower(name));
"#,
    // v2: Files table
    r#"
CREATE TABLE files (
    id              TEXT PRIMARY KEY,
    original_name   TEXT NOT NULL,
    stored_name     TEXT NOT NULL,
    path            TEXT NOT NULL UNIQUE,
    thumbnail_path  TEXT,
    size            INTEGER NOT NULL,
    mime_type       TEXT NOT NULL,
    folder_id       TEXT REFERENCES folders(id),
    owner_id        INTEGER,
    access          TEXT NOT NULL DEFAULT 'private',
    downloads       INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_files_folder_id ON files(folder_id);
CREATE INDEX idx_files_owner_id ON files(owner_id);
"#,
    // v3: Share grants for files and folders
    r#"
-- user_id NULL means a public grant (anyone)
CREATE TABLE file_shares (
    id          TEXT PRIMARY KEY,
    file_id     TEXT NOT NULL REFERENCES files(id),
    user_id     INTEGER,
    access      TEXT NOT NULL DEFAULT 'read',      -- 'read', 'write'
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_file_shares_file_id ON file_shares(file_id);
CREATE INDEX idx_file_shares_user_id ON file_shares(user_id);

CREATE TABLE folder_shares (
    id          TEXT PRIMARY KEY,
    folder_id   TEXT NOT NULL REFERENCES folders(id),
    user_id     INTEGER,
    access      TEXT NOT NULL DEFAULT 'read',
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_folder_shares_folder_id ON folder_shares(folder_id);
CREATE INDEX idx_folder_shares_user_id ON folder_shares(user_id);
"#,
    // v4: Publication attachments referencing file ids from another
    // subsystem; rows here must be removed when the file is deleted
    r#"
CREATE TABLE post_attachments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id     INTEGER NOT NULL,
    file_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_post_attachments_file_id ON post_attachments(file_id);
CREATE INDEX idx_post_attachments_post_id ON post_attachments(post_id);
"#,
];
