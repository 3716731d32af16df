//! Database schema and migrations for Sharebox.
//!
//! This module contains all database migrations that will be applied
//! sequentially when the database is first opened or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Users provisioned by the identity provider
    r#"
CREATE TABLE users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    TEXT NOT NULL UNIQUE,
    avatar      TEXT,                    -- stored name under the avatar directory
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_users_username ON users(username);
CREATE UNIQUE INDEX idx_users_avatar ON users(avatar) WHERE avatar IS NOT NULL;
"#,
    // v2: Folder tree, one owner per folder
    r#"
CREATE TABLE folders (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    owner_id        INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    parent_id       INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    password_hash   TEXT,                -- Argon2 hash, NULL when not gated
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_folders_owner_parent ON folders(owner_id, parent_id);
"#,
    // v3: Stored files
    r#"
CREATE TABLE files (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    filename        TEXT NOT NULL,       -- logical name shown to users
    stored_name     TEXT NOT NULL UNIQUE,
    content_type    TEXT NOT NULL,
    size            INTEGER NOT NULL,
    password_hash   TEXT,
    owner_id        INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    folder_id       INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_files_owner_folder ON files(owner_id, folder_id);
CREATE INDEX idx_files_folder_id ON files(folder_id);
"#,
    // v4: Recipients, the single relationship behind "shared with" and "received"
    r#"
CREATE TABLE file_recipients (
    file_id     INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    shared_at   TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (file_id, user_id)
);

CREATE INDEX idx_file_recipients_user_id ON file_recipients(user_id);
"#,
];
