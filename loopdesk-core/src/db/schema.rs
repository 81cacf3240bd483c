//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Incident records and their append-only history
    r#"
    CREATE TABLE IF NOT EXISTS incidents (
        id            TEXT PRIMARY KEY,
        group_id      TEXT NOT NULL,
        status        TEXT NOT NULL,
        title         TEXT,
        query         TEXT NOT NULL,
        category      TEXT,
        subcategory   TEXT,
        ai_draft      TEXT,
        users         JSON NOT NULL,
        final_answer  TEXT,
        thread_ref    TEXT,
        created_at    DATETIME NOT NULL,
        updated_at    DATETIME NOT NULL
    );

    -- History is stored append-only; entry_hash keys each entry by
    -- content+timestamp so replayed appends are detected and skipped.
    CREATE TABLE IF NOT EXISTS incident_history (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        incident_id  TEXT NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
        role         TEXT NOT NULL,
        message      TEXT NOT NULL,
        ts           DATETIME NOT NULL,
        entry_hash   TEXT NOT NULL,

        UNIQUE(incident_id, entry_hash)
    );

    CREATE INDEX IF NOT EXISTS idx_incidents_status ON incidents(status);
    CREATE INDEX IF NOT EXISTS idx_incidents_group ON incidents(group_id);
    CREATE INDEX IF NOT EXISTS idx_history_incident ON incident_history(incident_id);
    "#,
    // Version 2: Durable notification acknowledgment.
    // DEFAULT 1 means every record that predates this column counts as
    // already notified, so legacy data never triggers a notification storm.
    r#"
    ALTER TABLE incidents ADD COLUMN notified INTEGER NOT NULL DEFAULT 1;

    CREATE INDEX IF NOT EXISTS idx_incidents_unnotified ON incidents(status) WHERE notified = 0;
    "#,
    // Version 3: Knowledge-base entries back-filled from resolutions
    r#"
    CREATE TABLE IF NOT EXISTS kb_entries (
        id          TEXT PRIMARY KEY,
        category    TEXT NOT NULL,
        question    TEXT NOT NULL,
        resolution  TEXT NOT NULL,
        tags        TEXT,
        created_at  DATETIME NOT NULL
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
