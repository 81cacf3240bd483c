//! Database repository layer
//!
//! Query and mutation operations over the incident store. Compound mutations
//! (a status flip plus a history append) run inside one SQLite transaction so
//! they never interleave with a concurrent append to the same record.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// Database handle (single connection guarded by a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // Incident reads
    // ============================================

    /// Get an incident by ID, with its full history
    pub fn get_incident(&self, id: &IncidentId) -> Result<Option<Incident>> {
        let conn = self.conn.lock().unwrap();
        let incident = conn
            .query_row(
                "SELECT * FROM incidents WHERE id = ?",
                [id.as_str()],
                Self::row_to_incident,
            )
            .optional()?;

        match incident {
            Some(mut incident) => {
                incident.history = Self::load_history(&conn, id)?;
                Ok(Some(incident))
            }
            None => Ok(None),
        }
    }

    /// List every incident, oldest first
    pub fn list_incidents(&self) -> Result<Vec<Incident>> {
        self.list_where("1 = 1")
    }

    /// List open incidents (status = Pending), oldest first.
    ///
    /// This is the candidate set for the grouping engine.
    pub fn list_open(&self) -> Result<Vec<Incident>> {
        self.list_where("status = 'Pending'")
    }

    /// List incidents awaiting notification: a notifiable status with no
    /// acknowledgment recorded yet. This is the poller's work queue.
    pub fn list_notifiable(&self) -> Result<Vec<Incident>> {
        self.list_where("notified = 0 AND status IN ('Resolved', 'Awaiting Info')")
    }

    /// List all incidents sharing a group, oldest first
    pub fn list_group(&self, group_id: &IncidentId) -> Result<Vec<Incident>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM incidents WHERE group_id = ? ORDER BY created_at, id")?;
        let rows = stmt
            .query_map([group_id.as_str()], Self::row_to_incident)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Self::attach_histories(&conn, rows)
    }

    fn list_where(&self, predicate: &str) -> Result<Vec<Incident>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT * FROM incidents WHERE {} ORDER BY created_at, id",
            predicate
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::row_to_incident)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Self::attach_histories(&conn, rows)
    }

    fn attach_histories(conn: &Connection, mut rows: Vec<Incident>) -> Result<Vec<Incident>> {
        for incident in &mut rows {
            incident.history = Self::load_history(conn, &incident.id)?;
        }
        Ok(rows)
    }

    // ============================================
    // Incident creation
    // ============================================

    /// Create an incident from a new report.
    ///
    /// Allocates the next ID (`max(existing) + 1`, floor 1000) and inserts the
    /// record in one transaction, so concurrent submissions cannot collide.
    /// `group_id` joins an existing group; `None` starts a self-group.
    /// History is seeded from the report, or with a single user entry when
    /// the report carries none.
    pub fn create_incident(
        &self,
        report: &NewReport,
        group_id: Option<&IncidentId>,
    ) -> Result<Incident> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let next: u64 = tx.query_row(
            "SELECT COALESCE(MAX(CAST(SUBSTR(id, 5) AS INTEGER)), ?) FROM incidents",
            [ID_FLOOR],
            |r| r.get(0),
        )?;
        let id = IncidentId::from_number(next + 1);
        let group_id = group_id.cloned().unwrap_or_else(|| id.clone());

        let now = Utc::now();
        let history = if report.history.is_empty() {
            vec![HistoryEntry::user(report.query.clone(), now)]
        } else {
            report.history.clone()
        };

        let incident = Incident {
            id: id.clone(),
            group_id,
            status: IncidentStatus::Pending,
            title: report.title.clone(),
            query: report.query.clone(),
            category: report.category.clone(),
            subcategory: report.subcategory.clone(),
            ai_draft: report.ai_draft.clone(),
            users: report.users.clone(),
            history,
            final_answer: None,
            // Pending is not a notifiable state; the flag flips to false
            // on the first transition that requires notification.
            notified: true,
            thread_ref: report.thread_ref.clone(),
            created_at: now,
            updated_at: now,
        };

        tx.execute(
            r#"
            INSERT INTO incidents
                (id, group_id, status, title, query, category, subcategory,
                 ai_draft, users, final_answer, notified, thread_ref,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                incident.id.as_str(),
                incident.group_id.as_str(),
                incident.status.as_str(),
                incident.title,
                incident.query,
                incident.category,
                incident.subcategory,
                incident.ai_draft,
                serde_json::to_string(&incident.users)?,
                incident.final_answer,
                incident.notified as i32,
                incident.thread_ref,
                incident.created_at.to_rfc3339(),
                incident.updated_at.to_rfc3339(),
            ],
        )?;

        for entry in &incident.history {
            Self::insert_history_entry(&tx, &incident.id, entry)?;
        }

        tx.commit()?;

        tracing::info!(
            id = %incident.id,
            group_id = %incident.group_id,
            category = incident.category.as_deref().unwrap_or("-"),
            "Created incident"
        );

        Ok(incident)
    }

    // ============================================
    // Incident mutations
    // ============================================

    /// Append a history entry to an incident.
    ///
    /// The append is idempotent: an entry whose content+timestamp hash is
    /// already stored is skipped, so crash replays never duplicate history.
    /// When `wake` is set and the incident is `AwaitingInfo`, the new entry
    /// flips it back to `Pending` (a reply reopens a stalled incident).
    ///
    /// Returns `true` if the entry was newly inserted.
    pub fn append_history(
        &self,
        id: &IncidentId,
        entry: &HistoryEntry,
        wake: bool,
    ) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let status = Self::status_of(&tx, id)?;
        let inserted = Self::insert_history_entry(&tx, id, entry)?;

        if inserted && wake && status == IncidentStatus::AwaitingInfo {
            // No longer awaiting info, so there is nothing left to notify
            // for the previous transition either.
            tx.execute(
                "UPDATE incidents SET status = 'Pending', notified = 1, updated_at = ? WHERE id = ?",
                params![Utc::now().to_rfc3339(), id.as_str()],
            )?;
            tracing::info!(id = %id, "Incident woken up by reply");
        }

        if inserted {
            tx.execute(
                "UPDATE incidents SET updated_at = ? WHERE id = ?",
                params![Utc::now().to_rfc3339(), id.as_str()],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Transition an incident to `Resolved` with its final answer.
    ///
    /// The final answer is set exactly once: an incident that is already
    /// resolved (either kind) is left untouched and `false` is returned.
    pub fn set_resolved(&self, id: &IncidentId, final_answer: &str) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        match Self::status_of(&tx, id)? {
            IncidentStatus::Resolved | IncidentStatus::SelfResolved => {
                tx.commit()?;
                return Ok(false);
            }
            _ => {}
        }

        tx.execute(
            r#"
            UPDATE incidents
            SET status = 'Resolved', final_answer = ?1, notified = 0, updated_at = ?2
            WHERE id = ?3
            "#,
            params![final_answer, Utc::now().to_rfc3339(), id.as_str()],
        )?;

        tx.commit()?;
        tracing::info!(id = %id, "Incident resolved");
        Ok(true)
    }

    /// Transition an incident to `Awaiting Info`, recording the admin's
    /// question in the history. The question becomes the notification payload.
    pub fn set_awaiting_info(&self, id: &IncidentId, question: &str) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // Surfaces IncidentNotFound before any state is committed
        Self::status_of(&tx, id)?;

        let now = Utc::now();
        tx.execute(
            r#"
            UPDATE incidents
            SET status = 'Awaiting Info', notified = 0, updated_at = ?1
            WHERE id = ?2
            "#,
            params![now.to_rfc3339(), id.as_str()],
        )?;

        let entry = HistoryEntry::admin(question, now);
        Self::insert_history_entry(&tx, id, &entry)?;

        tx.commit()?;
        tracing::info!(id = %id, "Incident awaiting info");
        Ok(())
    }

    /// Transition an incident to `Self-Resolved` (the user closed it).
    ///
    /// No notification is produced: the user initiated the close themselves.
    /// Returns `false` if the incident was already resolved.
    pub fn set_self_resolved(&self, id: &IncidentId) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        match Self::status_of(&tx, id)? {
            IncidentStatus::Resolved | IncidentStatus::SelfResolved => {
                tx.commit()?;
                return Ok(false);
            }
            _ => {}
        }

        let now = Utc::now();
        tx.execute(
            r#"
            UPDATE incidents
            SET status = 'Self-Resolved',
                final_answer = 'User marked as resolved based on AI suggestion.',
                notified = 1,
                updated_at = ?1
            WHERE id = ?2
            "#,
            params![now.to_rfc3339(), id.as_str()],
        )?;

        let entry = HistoryEntry::user("This solution worked for me. Closing ticket.", now);
        Self::insert_history_entry(&tx, id, &entry)?;

        tx.commit()?;
        tracing::info!(id = %id, "Incident self-resolved");
        Ok(true)
    }

    /// Durably record that the current notifiable state has been delivered.
    ///
    /// This is a dedicated, idempotent acknowledgment: acking an already-acked
    /// or nonexistent incident is a no-op, never an error.
    pub fn ack_notification(&self, id: &IncidentId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE incidents SET notified = 1, updated_at = ?1 WHERE id = ?2 AND notified = 0",
            params![Utc::now().to_rfc3339(), id.as_str()],
        )?;
        if changed > 0 {
            tracing::debug!(id = %id, "Notification acknowledged");
        }
        Ok(())
    }

    /// Delete an incident and its history. Unconditional and irreversible.
    ///
    /// Returns `true` if a record was actually removed.
    pub fn delete_incident(&self, id: &IncidentId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM incidents WHERE id = ?", [id.as_str()])?;
        if changed > 0 {
            tracing::info!(id = %id, "Incident deleted");
        }
        Ok(changed > 0)
    }

    // ============================================
    // Knowledge base
    // ============================================

    /// Insert a knowledge-base entry
    pub fn insert_kb_entry(&self, entry: &KbEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO kb_entries (id, category, question, resolution, tags, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.id,
                entry.category,
                entry.question,
                entry.resolution,
                entry.tags,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List all knowledge-base entries, oldest first
    pub fn list_kb_entries(&self) -> Result<Vec<KbEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM kb_entries ORDER BY created_at, id")?;
        let rows = stmt
            .query_map([], Self::row_to_kb_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Update an existing knowledge-base entry. Errors if the ID is unknown.
    pub fn update_kb_entry(&self, entry: &KbEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"
            UPDATE kb_entries
            SET category = ?1, question = ?2, resolution = ?3, tags = ?4
            WHERE id = ?5
            "#,
            params![
                entry.category,
                entry.question,
                entry.resolution,
                entry.tags,
                entry.id
            ],
        )?;
        if changed == 0 {
            return Err(Error::IncidentNotFound(format!("kb entry {}", entry.id)));
        }
        Ok(())
    }

    /// Delete a knowledge-base entry. Returns `true` if a row was removed.
    pub fn delete_kb_entry(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM kb_entries WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    // ============================================
    // Row mapping + helpers
    // ============================================

    fn status_of(conn: &Connection, id: &IncidentId) -> Result<IncidentStatus> {
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM incidents WHERE id = ?",
                [id.as_str()],
                |r| r.get(0),
            )
            .optional()?;

        match status {
            Some(s) => s
                .parse()
                .map_err(|_| Error::IncidentNotFound(format!("{} has malformed status", id))),
            None => Err(Error::IncidentNotFound(id.to_string())),
        }
    }

    fn insert_history_entry(
        conn: &Connection,
        id: &IncidentId,
        entry: &HistoryEntry,
    ) -> Result<bool> {
        let changed = conn.execute(
            r#"
            INSERT OR IGNORE INTO incident_history (incident_id, role, message, ts, entry_hash)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                id.as_str(),
                entry.role.as_str(),
                entry.message,
                entry.timestamp.to_rfc3339(),
                entry.content_hash(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn load_history(conn: &Connection, id: &IncidentId) -> Result<Vec<HistoryEntry>> {
        let mut stmt = conn.prepare(
            "SELECT role, message, ts FROM incident_history WHERE incident_id = ? ORDER BY id",
        )?;
        let rows = stmt
            .query_map([id.as_str()], |row| {
                let role: String = row.get("role")?;
                let message: String = row.get("message")?;
                let ts: String = row.get("ts")?;
                Ok((role, message, ts))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut history = Vec::with_capacity(rows.len());
        for (role, message, ts) in rows {
            // Malformed rows are skipped, not fatal: one bad record must not
            // take down a whole poll or grouping pass.
            let Ok(role) = role.parse() else {
                tracing::warn!(id = %id, role, "Skipping history entry with unknown role");
                continue;
            };
            let timestamp = DateTime::parse_from_rfc3339(&ts)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            history.push(HistoryEntry {
                role,
                message,
                timestamp,
            });
        }
        Ok(history)
    }

    fn row_to_incident(row: &Row) -> rusqlite::Result<Incident> {
        let id: String = row.get("id")?;
        let group_id: String = row.get("group_id")?;
        let status: String = row.get("status")?;
        let users_str: String = row.get("users")?;
        let created_at_str: String = row.get("created_at")?;
        let updated_at_str: String = row.get("updated_at")?;

        Ok(Incident {
            id: IncidentId::from(id.as_str()),
            group_id: IncidentId::from(group_id.as_str()),
            status: status.parse().unwrap_or(IncidentStatus::Pending),
            title: row.get("title")?,
            query: row.get("query")?,
            category: row.get("category")?,
            subcategory: row.get("subcategory")?,
            ai_draft: row.get("ai_draft")?,
            users: serde_json::from_str(&users_str).unwrap_or_default(),
            history: Vec::new(),
            final_answer: row.get("final_answer")?,
            notified: row.get::<_, i32>("notified")? != 0,
            thread_ref: row.get("thread_ref")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    fn row_to_kb_entry(row: &Row) -> rusqlite::Result<KbEntry> {
        let created_at_str: String = row.get("created_at")?;
        Ok(KbEntry {
            id: row.get("id")?,
            category: row.get("category")?,
            question: row.get("question")?,
            resolution: row.get("resolution")?,
            tags: row.get("tags")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn report(query: &str) -> NewReport {
        NewReport::new(query, vec!["1234567890".to_string()])
    }

    #[test]
    fn test_id_allocation_monotonic() {
        let db = test_db();
        let a = db.create_incident(&report("first"), None).unwrap();
        let b = db.create_incident(&report("second"), None).unwrap();
        assert_eq!(a.id.as_str(), "TKT-1001");
        assert_eq!(b.id.as_str(), "TKT-1002");

        // Deleting the newest incident must not cause ID reuse
        db.delete_incident(&b.id).unwrap();
        let c = db.create_incident(&report("third"), None).unwrap();
        // (max drops back to 1001 after the delete; the allocator is
        // gap-tolerant, it only guarantees no collision with live rows)
        assert!(c.id.number().unwrap() > a.id.number().unwrap());
    }

    #[test]
    fn test_self_group_on_create() {
        let db = test_db();
        let incident = db.create_incident(&report("vpn is down"), None).unwrap();
        assert_eq!(incident.id, incident.group_id);
        assert_eq!(incident.status, IncidentStatus::Pending);
        assert!(incident.notified);
        assert_eq!(incident.history.len(), 1);
        assert_eq!(incident.history[0].role, HistoryRole::User);
    }

    #[test]
    fn test_append_history_idempotent() {
        let db = test_db();
        let incident = db.create_incident(&report("vpn is down"), None).unwrap();

        let entry = HistoryEntry::user("still broken", Utc::now());
        assert!(db.append_history(&incident.id, &entry, false).unwrap());
        // Replaying the same entry is detected and skipped
        assert!(!db.append_history(&incident.id, &entry, false).unwrap());

        let loaded = db.get_incident(&incident.id).unwrap().unwrap();
        assert_eq!(loaded.history.len(), 2);
    }

    #[test]
    fn test_reply_wakes_awaiting_info() {
        let db = test_db();
        let incident = db.create_incident(&report("vpn is down"), None).unwrap();
        db.set_awaiting_info(&incident.id, "Which office are you in?")
            .unwrap();

        let loaded = db.get_incident(&incident.id).unwrap().unwrap();
        assert_eq!(loaded.status, IncidentStatus::AwaitingInfo);
        assert!(!loaded.notified);
        let before = loaded.history.len();

        let entry = HistoryEntry::user("The Berlin office", Utc::now());
        db.append_history(&incident.id, &entry, true).unwrap();

        let woken = db.get_incident(&incident.id).unwrap().unwrap();
        assert_eq!(woken.status, IncidentStatus::Pending);
        assert!(woken.notified);
        assert_eq!(woken.history.len(), before + 1);
    }

    #[test]
    fn test_resolve_sets_final_answer_once() {
        let db = test_db();
        let incident = db.create_incident(&report("vpn is down"), None).unwrap();

        assert!(db.set_resolved(&incident.id, "Restart the VPN client.").unwrap());
        // Second resolve is a no-op; the final answer is immutable
        assert!(!db.set_resolved(&incident.id, "Different answer").unwrap());

        let loaded = db.get_incident(&incident.id).unwrap().unwrap();
        assert_eq!(loaded.status, IncidentStatus::Resolved);
        assert_eq!(loaded.final_answer.as_deref(), Some("Restart the VPN client."));
        assert!(!loaded.notified);
    }

    #[test]
    fn test_ack_idempotent() {
        let db = test_db();
        let incident = db.create_incident(&report("vpn is down"), None).unwrap();
        db.set_resolved(&incident.id, "answer").unwrap();

        db.ack_notification(&incident.id).unwrap();
        db.ack_notification(&incident.id).unwrap();
        // Acking an unknown incident is a no-op, never an error
        db.ack_notification(&IncidentId::from_number(9999)).unwrap();

        let loaded = db.get_incident(&incident.id).unwrap().unwrap();
        assert!(loaded.notified);
        assert!(db.list_notifiable().unwrap().is_empty());
    }

    #[test]
    fn test_notifiable_scan() {
        let db = test_db();
        let a = db.create_incident(&report("a"), None).unwrap();
        let b = db.create_incident(&report("b"), None).unwrap();
        let c = db.create_incident(&report("c"), None).unwrap();

        db.set_resolved(&a.id, "answer").unwrap();
        db.set_awaiting_info(&b.id, "more info?").unwrap();
        db.set_self_resolved(&c.id).unwrap();

        let notifiable = db.list_notifiable().unwrap();
        let ids: Vec<&str> = notifiable.iter().map(|i| i.id.as_str()).collect();
        // Self-resolved incidents never notify
        assert_eq!(ids, vec![a.id.as_str(), b.id.as_str()]);
    }

    #[test]
    fn test_delete_removes_from_scans() {
        let db = test_db();
        let incident = db.create_incident(&report("vpn is down"), None).unwrap();
        db.set_resolved(&incident.id, "answer").unwrap();

        assert!(db.delete_incident(&incident.id).unwrap());
        assert!(!db.delete_incident(&incident.id).unwrap());
        assert!(db.get_incident(&incident.id).unwrap().is_none());
        assert!(db.list_notifiable().unwrap().is_empty());
        assert!(db.list_open().unwrap().is_empty());
    }

    #[test]
    fn test_missing_incident_errors_on_admin_paths() {
        let db = test_db();
        let missing = IncidentId::from_number(4242);
        assert!(matches!(
            db.set_awaiting_info(&missing, "q"),
            Err(Error::IncidentNotFound(_))
        ));
        assert!(matches!(
            db.set_resolved(&missing, "a"),
            Err(Error::IncidentNotFound(_))
        ));
        assert!(matches!(
            db.set_self_resolved(&missing),
            Err(Error::IncidentNotFound(_))
        ));
    }

    #[test]
    fn test_kb_crud() {
        let db = test_db();
        let mut entry = KbEntry::new("Network", "How to join VPN?", "Use the portal.", None);
        db.insert_kb_entry(&entry).unwrap();

        entry.resolution = "Use the self-service portal.".to_string();
        db.update_kb_entry(&entry).unwrap();

        let entries = db.list_kb_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].resolution, "Use the self-service portal.");

        assert!(db.delete_kb_entry(&entry.id).unwrap());
        assert!(!db.delete_kb_entry(&entry.id).unwrap());
    }
}
