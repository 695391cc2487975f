//! Dashboard store (SQLite).
//!
//! Flat relational tables behind every route: users, knowledge entries, and
//! four append-only logs (anomaly, query, encryption, audit). A connection is
//! opened per call from the held path; each route runs a short sequential
//! chain of these calls with no pooling and no cross-request state.
//!
//! The ingest path is the one place two writes are logically a single
//! operation (`processing` -> `indexed`), so it runs inside one transaction.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct DashboardSqlite {
    db_path: PathBuf,
}

/// Closed set of audit verbs. Serialized as the wire strings the audit log
/// and its consumers expect (`ENCRYPT_DATA`, `USER_UPDATED`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    EncryptData,
    DecryptData,
    KnowledgeIngest,
    UserUpdated,
    AnomalyReported,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EncryptData => "ENCRYPT_DATA",
            Self::DecryptData => "DECRYPT_DATA",
            Self::KnowledgeIngest => "KNOWLEDGE_INGEST",
            Self::UserUpdated => "USER_UPDATED",
            Self::AnomalyReported => "ANOMALY_REPORTED",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct KnowledgeEntryRow {
    pub id: String,
    pub title: String,
    pub entry_type: String,
    pub status: String,
    pub content: Option<String>,
    pub metadata: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AnomalyRow {
    pub id: String,
    pub anomaly_type: String,
    pub message: String,
    pub source: String,
    pub severity: i64,
    pub resolved: bool,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryLogRow {
    pub id: String,
    pub query: String,
    pub response: String,
    pub confidence: i64,
    pub result_count: i64,
    pub processing_time_ms: i64,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EncryptionLogRow {
    pub id: String,
    pub operation: String,
    pub algorithm: String,
    pub data_size: i64,
    pub processing_time_ms: i64,
    pub success: bool,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditLogRow {
    pub id: String,
    pub action: String,
    pub resource: String,
    pub details: String,
    pub ip_address: String,
    pub created_at_ms: i64,
}

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl DashboardSqlite {
    pub fn new(db_path: PathBuf) -> Result<Self, rusqlite::Error> {
        let this = Self { db_path };
        this.init()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
    }

    fn init(&self) -> Result<(), rusqlite::Error> {
        if let Some(parent) = self.db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS knowledge_entries (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                entry_type TEXT NOT NULL,
                status TEXT NOT NULL,
                content TEXT NULL,
                metadata TEXT NULL,
                uploaded_by TEXT NULL,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entries_status ON knowledge_entries(status);
            CREATE INDEX IF NOT EXISTS idx_entries_created_at ON knowledge_entries(created_at_ms);

            CREATE TABLE IF NOT EXISTS anomaly_logs (
                id TEXT PRIMARY KEY,
                anomaly_type TEXT NOT NULL,
                message TEXT NOT NULL,
                source TEXT NOT NULL,
                severity INTEGER NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0,
                created_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_anomalies_created_at ON anomaly_logs(created_at_ms);
            CREATE INDEX IF NOT EXISTS idx_anomalies_resolved ON anomaly_logs(resolved);

            CREATE TABLE IF NOT EXISTS query_logs (
                id TEXT PRIMARY KEY,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                confidence INTEGER NOT NULL,
                result_count INTEGER NOT NULL,
                processing_time_ms INTEGER NOT NULL,
                created_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_query_logs_created_at ON query_logs(created_at_ms);

            CREATE TABLE IF NOT EXISTS encryption_logs (
                id TEXT PRIMARY KEY,
                operation TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                data_size INTEGER NOT NULL,
                processing_time_ms INTEGER NOT NULL,
                success INTEGER NOT NULL,
                created_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_encryption_logs_created_at ON encryption_logs(created_at_ms);
            CREATE INDEX IF NOT EXISTS idx_encryption_logs_operation ON encryption_logs(operation);

            CREATE TABLE IF NOT EXISTS audit_logs (
                id TEXT PRIMARY KEY,
                action TEXT NOT NULL,
                resource TEXT NOT NULL,
                details TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs(created_at_ms);
            "#,
        )?;
        Ok(())
    }

    // --- users ---------------------------------------------------------

    /// Upsert by unique email (seed path). An existing row keeps its values.
    pub fn upsert_user(
        &self,
        email: &str,
        name: &str,
        role: &str,
        status: &str,
    ) -> Result<UserRow, rusqlite::Error> {
        let conn = self.open()?;
        let ts = now_ms();
        conn.execute(
            r#"
            INSERT INTO users (id, email, name, role, status, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(email) DO NOTHING
            "#,
            params![new_id(), email.trim(), name, role, status, ts],
        )?;
        conn.query_row(
            "SELECT id, email, name, role, status, created_at_ms, updated_at_ms FROM users WHERE email = ?1",
            params![email.trim()],
            Self::map_user,
        )
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>, rusqlite::Error> {
        let conn = self.open()?;
        self.user_by_id(&conn, id)
    }

    /// Patch role and/or status; `None` leaves the column untouched.
    /// Returns `None` when no user matches the id.
    pub fn update_user(
        &self,
        id: &str,
        role: Option<&str>,
        status: Option<&str>,
    ) -> Result<Option<UserRow>, rusqlite::Error> {
        let conn = self.open()?;
        let changed = conn.execute(
            "UPDATE users SET role = COALESCE(?1, role), status = COALESCE(?2, status), updated_at_ms = ?3 WHERE id = ?4",
            params![role, status, now_ms(), id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.user_by_id(&conn, id)
    }

    fn user_by_id(&self, conn: &Connection, id: &str) -> Result<Option<UserRow>, rusqlite::Error> {
        conn.query_row(
            "SELECT id, email, name, role, status, created_at_ms, updated_at_ms FROM users WHERE id = ?1",
            params![id],
            Self::map_user,
        )
        .optional()
    }

    fn map_user(r: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
        Ok(UserRow {
            id: r.get(0)?,
            email: r.get(1)?,
            name: r.get(2)?,
            role: r.get(3)?,
            status: r.get(4)?,
            created_at_ms: r.get(5)?,
            updated_at_ms: r.get(6)?,
        })
    }

    // --- knowledge entries ---------------------------------------------

    /// Create an entry in `processing` and promote it to `indexed` within the
    /// same transaction, so a crash can never strand a half-ingested row.
    pub fn insert_entry(
        &self,
        title: &str,
        entry_type: &str,
        content: Option<&str>,
        metadata: Option<&str>,
        uploaded_by: Option<&str>,
    ) -> Result<KnowledgeEntryRow, rusqlite::Error> {
        let mut conn = self.open()?;
        let id = new_id();
        let ts = now_ms();
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO knowledge_entries
                (id, title, entry_type, status, content, metadata, uploaded_by, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, 'processing', ?4, ?5, ?6, ?7, ?7)
            "#,
            params![id, title, entry_type, content, metadata, uploaded_by, ts],
        )?;
        // No real indexing pipeline exists; the entry is indexed synchronously.
        tx.execute(
            "UPDATE knowledge_entries SET status = 'indexed', updated_at_ms = ?1 WHERE id = ?2",
            params![now_ms(), id],
        )?;
        tx.commit()?;

        self.get_entry(&id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<KnowledgeEntryRow>, rusqlite::Error> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT id, title, entry_type, status, content, metadata, uploaded_by, created_at_ms, updated_at_ms
             FROM knowledge_entries WHERE id = ?1",
            params![id],
            Self::map_entry,
        )
        .optional()
    }

    pub fn list_entries_recent(&self, limit: usize) -> Result<Vec<KnowledgeEntryRow>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, entry_type, status, content, metadata, uploaded_by, created_at_ms, updated_at_ms
             FROM knowledge_entries ORDER BY created_at_ms DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_indexed_entries(&self, limit: usize) -> Result<Vec<KnowledgeEntryRow>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, entry_type, status, content, metadata, uploaded_by, created_at_ms, updated_at_ms
             FROM knowledge_entries WHERE status = 'indexed' ORDER BY created_at_ms DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_indexed_entries(&self) -> Result<i64, rusqlite::Error> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT COUNT(*) FROM knowledge_entries WHERE status = 'indexed'",
            [],
            |r| r.get(0),
        )
    }

    pub fn entry_counts_by_type(&self) -> Result<Vec<(String, i64)>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT entry_type, COUNT(*) FROM knowledge_entries GROUP BY entry_type ORDER BY entry_type",
        )?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_entry(r: &rusqlite::Row<'_>) -> Result<KnowledgeEntryRow, rusqlite::Error> {
        Ok(KnowledgeEntryRow {
            id: r.get(0)?,
            title: r.get(1)?,
            entry_type: r.get(2)?,
            status: r.get(3)?,
            content: r.get(4)?,
            metadata: r.get(5)?,
            uploaded_by: r.get(6)?,
            created_at_ms: r.get(7)?,
            updated_at_ms: r.get(8)?,
        })
    }

    // --- anomaly log (append-only) -------------------------------------

    pub fn insert_anomaly(
        &self,
        anomaly_type: &str,
        message: &str,
        source: &str,
        severity: i64,
    ) -> Result<AnomalyRow, rusqlite::Error> {
        let conn = self.open()?;
        let id = new_id();
        let ts = now_ms();
        conn.execute(
            "INSERT INTO anomaly_logs (id, anomaly_type, message, source, severity, resolved, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![id, anomaly_type, message, source, severity, ts],
        )?;
        Ok(AnomalyRow {
            id,
            anomaly_type: anomaly_type.to_string(),
            message: message.to_string(),
            source: source.to_string(),
            severity,
            resolved: false,
            created_at_ms: ts,
        })
    }

    pub fn list_anomalies_recent(&self, limit: usize) -> Result<Vec<AnomalyRow>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, anomaly_type, message, source, severity, resolved, created_at_ms
             FROM anomaly_logs ORDER BY created_at_ms DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_anomaly)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_unresolved_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRow>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, anomaly_type, message, source, severity, resolved, created_at_ms
             FROM anomaly_logs WHERE resolved = 0 ORDER BY created_at_ms DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_anomaly)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_unresolved_anomalies(&self) -> Result<i64, rusqlite::Error> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT COUNT(*) FROM anomaly_logs WHERE resolved = 0",
            [],
            |r| r.get(0),
        )
    }

    pub fn unresolved_anomaly_counts_by_type(&self) -> Result<Vec<(String, i64)>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT anomaly_type, COUNT(*) FROM anomaly_logs WHERE resolved = 0 GROUP BY anomaly_type ORDER BY anomaly_type",
        )?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_anomaly(r: &rusqlite::Row<'_>) -> Result<AnomalyRow, rusqlite::Error> {
        Ok(AnomalyRow {
            id: r.get(0)?,
            anomaly_type: r.get(1)?,
            message: r.get(2)?,
            source: r.get(3)?,
            severity: r.get(4)?,
            resolved: r.get::<_, i64>(5)? != 0,
            created_at_ms: r.get(6)?,
        })
    }

    // --- query log (append-only) ---------------------------------------

    pub fn insert_query_log(
        &self,
        query: &str,
        response: &str,
        confidence: i64,
        result_count: i64,
        processing_time_ms: i64,
    ) -> Result<QueryLogRow, rusqlite::Error> {
        let conn = self.open()?;
        let id = new_id();
        let ts = now_ms();
        conn.execute(
            "INSERT INTO query_logs (id, query, response, confidence, result_count, processing_time_ms, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, query, response, confidence, result_count, processing_time_ms, ts],
        )?;
        Ok(QueryLogRow {
            id,
            query: query.to_string(),
            response: response.to_string(),
            confidence,
            result_count,
            processing_time_ms,
            created_at_ms: ts,
        })
    }

    pub fn count_queries_since(&self, since_ms: i64) -> Result<i64, rusqlite::Error> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT COUNT(*) FROM query_logs WHERE created_at_ms >= ?1",
            params![since_ms],
            |r| r.get(0),
        )
    }

    /// Timestamps of query log rows since `since_ms`, oldest first (trend bucketing).
    pub fn query_timestamps_since(&self, since_ms: i64) -> Result<Vec<i64>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT created_at_ms FROM query_logs WHERE created_at_ms >= ?1 ORDER BY created_at_ms ASC",
        )?;
        let rows = stmt
            .query_map(params![since_ms], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- encryption log (append-only) ----------------------------------

    pub fn insert_encryption_log(
        &self,
        operation: &str,
        algorithm: &str,
        data_size: i64,
        processing_time_ms: i64,
        success: bool,
    ) -> Result<EncryptionLogRow, rusqlite::Error> {
        let conn = self.open()?;
        let id = new_id();
        let ts = now_ms();
        conn.execute(
            "INSERT INTO encryption_logs (id, operation, algorithm, data_size, processing_time_ms, success, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, operation, algorithm, data_size, processing_time_ms, success as i64, ts],
        )?;
        Ok(EncryptionLogRow {
            id,
            operation: operation.to_string(),
            algorithm: algorithm.to_string(),
            data_size,
            processing_time_ms,
            success,
            created_at_ms: ts,
        })
    }

    pub fn count_encrypt_operations(&self) -> Result<i64, rusqlite::Error> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT COUNT(*) FROM encryption_logs WHERE operation = 'encrypt'",
            [],
            |r| r.get(0),
        )
    }

    /// Average processing time of `encrypt` rows; `None` when no rows exist.
    pub fn avg_encrypt_time_ms(&self) -> Result<Option<f64>, rusqlite::Error> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT AVG(processing_time_ms) FROM encryption_logs WHERE operation = 'encrypt'",
            [],
            |r| r.get(0),
        )
    }

    /// `(operation, created_at_ms)` pairs since `since_ms`, oldest first.
    pub fn encryption_ops_since(&self, since_ms: i64) -> Result<Vec<(String, i64)>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT operation, created_at_ms FROM encryption_logs WHERE created_at_ms >= ?1 ORDER BY created_at_ms ASC",
        )?;
        let rows = stmt
            .query_map(params![since_ms], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- audit log (append-only) ---------------------------------------

    pub fn insert_audit(
        &self,
        action: AuditAction,
        resource: &str,
        details: &str,
        ip_address: &str,
    ) -> Result<AuditLogRow, rusqlite::Error> {
        let conn = self.open()?;
        let id = new_id();
        let ts = now_ms();
        conn.execute(
            "INSERT INTO audit_logs (id, action, resource, details, ip_address, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, action.as_str(), resource, details, ip_address, ts],
        )?;
        Ok(AuditLogRow {
            id,
            action: action.as_str().to_string(),
            resource: resource.to_string(),
            details: details.to_string(),
            ip_address: ip_address.to_string(),
            created_at_ms: ts,
        })
    }

    pub fn list_audit_logs(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditLogRow>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, action, resource, details, ip_address, created_at_ms
             FROM audit_logs ORDER BY created_at_ms DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |r| {
                Ok(AuditLogRow {
                    id: r.get(0)?,
                    action: r.get(1)?,
                    resource: r.get(2)?,
                    details: r.get(3)?,
                    ip_address: r.get(4)?,
                    created_at_ms: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_audit_logs(&self) -> Result<i64, rusqlite::Error> {
        let conn = self.open()?;
        conn.query_row("SELECT COUNT(*) FROM audit_logs", [], |r| r.get(0))
    }

    /// 50 most recent unresolved anomalies projected for the 3D scatter plot:
    /// `(id, type, severity, created_at_ms)`.
    pub fn anomaly_scatter(
        &self,
        limit: usize,
    ) -> Result<Vec<(String, String, i64, i64)>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, anomaly_type, severity, created_at_ms
             FROM anomaly_logs WHERE resolved = 0 ORDER BY created_at_ms DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (DashboardSqlite, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DashboardSqlite::new(dir.path().join("test.sqlite")).expect("open store");
        (store, dir)
    }

    #[test]
    fn ingested_entry_ends_up_indexed() {
        let (store, _dir) = temp_store();
        let entry = store
            .insert_entry("Policies.pdf", "PDF", Some("body"), None, Some("admin"))
            .unwrap();
        assert_eq!(entry.status, "indexed");

        let fetched = store.get_entry(&entry.id).unwrap().unwrap();
        assert_eq!(fetched.status, "indexed");
        assert_eq!(fetched.entry_type, "PDF");
    }

    #[test]
    fn indexed_listing_skips_nothing_and_counts_match() {
        let (store, _dir) = temp_store();
        for i in 0..3 {
            store
                .insert_entry(&format!("doc-{}", i), "TXT", None, None, None)
                .unwrap();
        }
        assert_eq!(store.count_indexed_entries().unwrap(), 3);
        assert_eq!(store.list_indexed_entries(10).unwrap().len(), 3);
    }

    #[test]
    fn user_patch_with_only_status_keeps_role() {
        let (store, _dir) = temp_store();
        let user = store
            .upsert_user("analyst@quantumguard.com", "Security Analyst", "analyst", "active")
            .unwrap();

        let patched = store
            .update_user(&user.id, None, Some("suspended"))
            .unwrap()
            .unwrap();
        assert_eq!(patched.role, "analyst");
        assert_eq!(patched.status, "suspended");
    }

    #[test]
    fn updating_unknown_user_returns_none() {
        let (store, _dir) = temp_store();
        assert!(store.update_user("missing", Some("admin"), None).unwrap().is_none());
    }

    #[test]
    fn upsert_user_is_idempotent_by_email() {
        let (store, _dir) = temp_store();
        let a = store.upsert_user("admin@quantumguard.com", "Admin", "admin", "active").unwrap();
        let b = store.upsert_user("admin@quantumguard.com", "Other", "viewer", "active").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.role, "admin");
    }

    #[test]
    fn audit_pagination_is_newest_first_with_total() {
        let (store, _dir) = temp_store();
        for i in 0..3 {
            store
                .insert_audit(
                    AuditAction::EncryptData,
                    "DataPayload",
                    &format!("op {}", i),
                    "unknown",
                )
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let page = store.list_audit_logs(2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].details, "op 2");
        assert_eq!(page[1].details, "op 1");
        assert_eq!(store.count_audit_logs().unwrap(), 3);
    }

    #[test]
    fn encrypt_operation_count_excludes_decrypts() {
        let (store, _dir) = temp_store();
        store.insert_encryption_log("encrypt", "AHE-HEE", 100, 3, true).unwrap();
        store.insert_encryption_log("encrypt", "AHE-HEE", 200, 5, true).unwrap();
        store.insert_encryption_log("decrypt", "AHE-HEE", 100, 2, true).unwrap();
        assert_eq!(store.count_encrypt_operations().unwrap(), 2);
        assert_eq!(store.avg_encrypt_time_ms().unwrap(), Some(4.0));
    }

    #[test]
    fn avg_encrypt_time_is_none_on_empty_table() {
        let (store, _dir) = temp_store();
        assert_eq!(store.avg_encrypt_time_ms().unwrap(), None);
    }

    #[test]
    fn unresolved_group_by_counts_types() {
        let (store, _dir) = temp_store();
        store.insert_anomaly("critical", "a", "Auth Gateway", 9).unwrap();
        store.insert_anomaly("critical", "b", "Auth Service", 8).unwrap();
        store.insert_anomaly("info", "c", "System", 1).unwrap();
        let groups = store.unresolved_anomaly_counts_by_type().unwrap();
        assert_eq!(groups, vec![("critical".to_string(), 2), ("info".to_string(), 1)]);
    }

    #[test]
    fn anomalies_are_created_unresolved() {
        let (store, _dir) = temp_store();
        let row = store.insert_anomaly("warning", "slow sync", "Sync Service", 4).unwrap();
        assert!(!row.resolved);
        assert_eq!(store.count_unresolved_anomalies().unwrap(), 1);
    }
}
