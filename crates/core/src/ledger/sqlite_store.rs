//! SQLite-backed ledger implementation.
//!
//! Column order in `requests` is load-bearing: offsets 0..=7
//! (id, type, dataset_id, status, expiry_date, completion_date, owner,
//! force_delete) are part of the external contract and must not move.
//! New columns are appended after them.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::warn;

use super::store::{Ledger, LedgerError};
use super::types::{DeliveryType, FileEntry, QuotaConstants, Request, RequestStatus};

/// SQLite-backed request ledger.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

/// A request row as created by the intake process.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub dataset_id: String,
    pub delivery_type: DeliveryType,
    pub owner: String,
}

impl SqliteLedger {
    /// Open (or create) the ledger database at `path`.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS requests (
                id INTEGER PRIMARY KEY,
                type TEXT NOT NULL,
                dataset_id TEXT NOT NULL,
                status TEXT NOT NULL,
                expiry_date TEXT,
                completion_date TEXT,
                owner TEXT NOT NULL,
                force_delete INTEGER NOT NULL DEFAULT 0,
                failure_date TEXT,
                claimed_at TEXT,
                UNIQUE (dataset_id, type)
            );

            CREATE TABLE IF NOT EXISTS files (
                dataset_id TEXT NOT NULL,
                source TEXT NOT NULL,
                destination TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS historical_requests (
                id INTEGER,
                type TEXT NOT NULL,
                dataset_id TEXT NOT NULL,
                status TEXT NOT NULL,
                expiry_date TEXT,
                completion_date TEXT,
                owner TEXT NOT NULL,
                force_delete INTEGER NOT NULL DEFAULT 0,
                failure_date TEXT,
                claimed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS historical_files (
                dataset_id TEXT NOT NULL,
                source TEXT NOT NULL,
                destination TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS constants (
                web_project_size INTEGER NOT NULL,
                federated_project_size INTEGER NOT NULL,
                sftp_project_size INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status);
            CREATE INDEX IF NOT EXISTS idx_files_dataset ON files(dataset_id);
            "#,
        )
        .map_err(db_err)?;

        // Migration: claimed_at arrived after the fixed prefix.
        let _ = conn.execute("ALTER TABLE requests ADD COLUMN claimed_at TEXT", []);
        let _ = conn.execute("ALTER TABLE historical_requests ADD COLUMN claimed_at TEXT", []);

        Ok(())
    }

    /// Insert a request row in REQUESTED state. Intake/test tooling; the
    /// orchestrator never creates rows.
    pub fn insert_request(&self, request: &NewRequest) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO requests (type, dataset_id, status, owner) VALUES (?, ?, ?, ?)",
            params![
                request.delivery_type.as_str(),
                request.dataset_id,
                RequestStatus::Requested.as_str(),
                request.owner,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Insert a file row. Intake/test tooling.
    pub fn insert_file(&self, file: &FileEntry) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO files (dataset_id, source, destination) VALUES (?, ?, ?)",
            params![
                file.dataset_id,
                file.source_path.to_string_lossy(),
                file.relative_destination.to_string_lossy(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Replace the quota constants row.
    pub fn set_quota_constants(&self, constants: &QuotaConstants) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM constants", []).map_err(db_err)?;
        conn.execute(
            "INSERT INTO constants (web_project_size, federated_project_size, sftp_project_size) VALUES (?, ?, ?)",
            params![
                constants.web_project_bytes as i64,
                constants.federated_project_bytes as i64,
                constants.sftp_project_bytes as i64,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Set the operator force-delete flag. Test/operator tooling.
    pub fn set_force_delete(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE requests SET force_delete = 1 WHERE dataset_id = ? AND type = ?",
                params![dataset_id, delivery_type.as_str()],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(LedgerError::RequestNotFound {
                dataset_id: dataset_id.to_string(),
                delivery_type,
            });
        }
        Ok(())
    }

    fn row_to_request(row: &rusqlite::Row) -> rusqlite::Result<Request> {
        // Positional access per the external contract.
        let delivery_raw: String = row.get(1)?;
        let dataset_id: String = row.get(2)?;
        let status_raw: String = row.get(3)?;
        let expiry_date: Option<String> = row.get(4)?;
        let completion_date: Option<String> = row.get(5)?;
        let owner: String = row.get(6)?;
        let force_delete: i64 = row.get(7)?;
        let failure_date: Option<String> = row.get(8)?;
        let claimed_at: Option<String> = row.get(9)?;

        Ok(Request {
            dataset_id,
            delivery_type: delivery_raw
                .parse()
                .map_err(|e: String| bad_column(1, &e))?,
            owner,
            status: status_raw.parse().map_err(|e: String| bad_column(3, &e))?,
            failure_date: parse_timestamp(8, failure_date)?,
            completion_date: parse_timestamp(5, completion_date)?,
            expiry_date: parse_timestamp(4, expiry_date)?,
            force_delete: force_delete != 0,
            claimed_at: parse_timestamp(9, claimed_at)?,
        })
    }

    fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<FileEntry> {
        let dataset_id: String = row.get(0)?;
        let source: String = row.get(1)?;
        let destination: String = row.get(2)?;
        Ok(FileEntry {
            dataset_id,
            source_path: PathBuf::from(source),
            relative_destination: PathBuf::from(destination),
        })
    }

    fn select_requests(&self, where_clause: &str) -> Result<Vec<Request>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id, type, dataset_id, status, expiry_date, completion_date, owner, force_delete, failure_date, claimed_at \
             FROM requests {} ORDER BY id ASC",
            where_clause
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt.query_map([], Self::row_to_request).map_err(db_err)?;

        let mut requests = Vec::new();
        for row in rows {
            match row.map_err(db_err) {
                Ok(request) => requests.push(request),
                // An unreadable row (legacy encoding, mangled timestamp)
                // must not wedge every other request in the queue.
                Err(LedgerError::Corrupt(detail)) => {
                    warn!(%detail, "skipping unreadable request row");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(requests)
    }
}

fn db_err(e: rusqlite::Error) -> LedgerError {
    match e {
        // Parse failures from row_to_request land here; the row is bad,
        // not the store.
        rusqlite::Error::InvalidColumnType(index, detail, _) => {
            LedgerError::Corrupt(format!("column {}: {}", index, detail))
        }
        other => LedgerError::Unavailable(other.to_string()),
    }
}

fn bad_column(index: usize, detail: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(
        index,
        detail.to_string(),
        rusqlite::types::Type::Text,
    )
}

fn parse_timestamp(
    index: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| bad_column(index, &e.to_string())),
    }
}

impl Ledger for SqliteLedger {
    fn quota_constants(&self) -> Result<QuotaConstants, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT web_project_size, federated_project_size, sftp_project_size FROM constants",
            [],
            |row| {
                Ok(QuotaConstants {
                    web_project_bytes: row.get::<_, i64>(0)? as u64,
                    federated_project_bytes: row.get::<_, i64>(1)? as u64,
                    sftp_project_bytes: row.get::<_, i64>(2)? as u64,
                })
            },
        );

        match result {
            Ok(constants) => Ok(constants),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(QuotaConstants::default()),
            Err(e) => Err(db_err(e)),
        }
    }

    fn eligible_requests(&self) -> Result<Vec<Request>, LedgerError> {
        self.select_requests("WHERE status IN ('REQUESTED', 'PENDING', 'QUEUED')")
    }

    fn terminal_requests(&self) -> Result<Vec<Request>, LedgerError> {
        self.select_requests("WHERE status IN ('SUCCESS', 'FAILED')")
    }

    fn request(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<Option<Request>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id, type, dataset_id, status, expiry_date, completion_date, owner, force_delete, failure_date, claimed_at \
             FROM requests WHERE dataset_id = ? AND type = ?",
            params![dataset_id, delivery_type.as_str()],
            Self::row_to_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    fn claim(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<bool, LedgerError> {
        let conn = self.conn.lock().unwrap();
        // Conditional update at the storage layer; never read-then-write.
        let changed = conn
            .execute(
                "UPDATE requests SET status = 'PENDING', claimed_at = ? \
                 WHERE dataset_id = ? AND type = ? AND status = 'REQUESTED'",
                params![Utc::now().to_rfc3339(), dataset_id, delivery_type.as_str()],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    fn files(&self, dataset_id: &str) -> Result<Vec<FileEntry>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT dataset_id, source, destination FROM files WHERE dataset_id = ? ORDER BY rowid ASC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![dataset_id], Self::row_to_file)
            .map_err(db_err)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(db_err)?);
        }
        Ok(files)
    }

    fn mark_queued(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE requests SET status = 'QUEUED' WHERE dataset_id = ? AND type = ?",
                params![dataset_id, delivery_type.as_str()],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(LedgerError::RequestNotFound {
                dataset_id: dataset_id.to_string(),
                delivery_type,
            });
        }
        Ok(())
    }

    fn mark_failed(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
        failure_date: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE requests SET status = 'FAILED', failure_date = ? WHERE dataset_id = ? AND type = ?",
                params![failure_date.to_rfc3339(), dataset_id, delivery_type.as_str()],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(LedgerError::RequestNotFound {
                dataset_id: dataset_id.to_string(),
                delivery_type,
            });
        }
        Ok(())
    }

    fn mark_success(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
        completion_date: DateTime<Utc>,
        expiry_date: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE requests SET status = 'SUCCESS', completion_date = ?, expiry_date = ? \
                 WHERE dataset_id = ? AND type = ?",
                params![
                    completion_date.to_rfc3339(),
                    expiry_date.to_rfc3339(),
                    dataset_id,
                    delivery_type.as_str(),
                ],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(LedgerError::RequestNotFound {
                dataset_id: dataset_id.to_string(),
                delivery_type,
            });
        }
        Ok(())
    }

    fn archive_and_delete(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<(), LedgerError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        // File rows are shared across delivery types of the same dataset;
        // archive them only when no other live request still needs them.
        let other_live: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM requests WHERE dataset_id = ? AND type <> ?",
                params![dataset_id, delivery_type.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        if other_live == 0 {
            tx.execute(
                "INSERT INTO historical_files SELECT * FROM files WHERE dataset_id = ?",
                params![dataset_id],
            )
            .map_err(db_err)?;
            tx.execute("DELETE FROM files WHERE dataset_id = ?", params![dataset_id])
                .map_err(db_err)?;
        }

        let archived = tx
            .execute(
                "INSERT INTO historical_requests SELECT * FROM requests WHERE dataset_id = ? AND type = ?",
                params![dataset_id, delivery_type.as_str()],
            )
            .map_err(db_err)?;
        if archived == 0 {
            return Err(LedgerError::RequestNotFound {
                dataset_id: dataset_id.to_string(),
                delivery_type,
            });
        }
        tx.execute(
            "DELETE FROM requests WHERE dataset_id = ? AND type = ?",
            params![dataset_id, delivery_type.as_str()],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)
    }

    fn reclaim_stale_pending(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<usize, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE requests SET status = 'REQUESTED', claimed_at = NULL \
                 WHERE status = 'PENDING' AND (claimed_at IS NULL OR claimed_at < ?)",
                params![older_than.to_rfc3339()],
            )
            .map_err(db_err)?;
        Ok(changed)
    }

    fn count_by_status(&self, status: RequestStatus) -> Result<i64, LedgerError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE status = ?",
            params![status.as_str()],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    fn historical_request(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<Option<Request>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id, type, dataset_id, status, expiry_date, completion_date, owner, force_delete, failure_date, claimed_at \
             FROM historical_requests WHERE dataset_id = ? AND type = ?",
            params![dataset_id, delivery_type.as_str()],
            Self::row_to_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    fn historical_files(&self, dataset_id: &str) -> Result<Vec<FileEntry>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT dataset_id, source, destination FROM historical_files WHERE dataset_id = ? ORDER BY rowid ASC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![dataset_id], Self::row_to_file)
            .map_err(db_err)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(db_err)?);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_ledger() -> SqliteLedger {
        SqliteLedger::in_memory().unwrap()
    }

    fn seed_request(ledger: &SqliteLedger, dataset_id: &str, delivery_type: DeliveryType) {
        ledger
            .insert_request(&NewRequest {
                dataset_id: dataset_id.to_string(),
                delivery_type,
                owner: "proj-1".to_string(),
            })
            .unwrap();
    }

    fn seed_file(ledger: &SqliteLedger, dataset_id: &str, name: &str) {
        ledger
            .insert_file(&FileEntry {
                dataset_id: dataset_id.to_string(),
                source_path: PathBuf::from(format!("/archive/{}/{}", dataset_id, name)),
                relative_destination: PathBuf::from(name),
            })
            .unwrap();
    }

    #[test]
    fn test_eligible_requests_in_insertion_order() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-b", DeliveryType::Web);
        seed_request(&ledger, "ds-a", DeliveryType::Web);
        seed_request(&ledger, "ds-c", DeliveryType::Federated);

        let eligible = ledger.eligible_requests().unwrap();
        let ids: Vec<&str> = eligible.iter().map(|r| r.dataset_id.as_str()).collect();
        assert_eq!(ids, vec!["ds-b", "ds-a", "ds-c"]);
    }

    #[test]
    fn test_claim_is_compare_and_swap() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-1", DeliveryType::Web);

        assert!(ledger.claim("ds-1", DeliveryType::Web).unwrap());
        // Second claim must lose: the row is no longer REQUESTED.
        assert!(!ledger.claim("ds-1", DeliveryType::Web).unwrap());

        let request = ledger.request("ds-1", DeliveryType::Web).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.claimed_at.is_some());
    }

    #[test]
    fn test_claim_unknown_request_returns_false() {
        let ledger = create_test_ledger();
        assert!(!ledger.claim("ds-missing", DeliveryType::Web).unwrap());
    }

    #[test]
    fn test_same_dataset_two_delivery_types_independent() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-1", DeliveryType::Web);
        seed_request(&ledger, "ds-1", DeliveryType::Federated);

        assert!(ledger.claim("ds-1", DeliveryType::Web).unwrap());
        let web = ledger.request("ds-1", DeliveryType::Web).unwrap().unwrap();
        let fed = ledger
            .request("ds-1", DeliveryType::Federated)
            .unwrap()
            .unwrap();
        assert_eq!(web.status, RequestStatus::Pending);
        assert_eq!(fed.status, RequestStatus::Requested);
    }

    #[test]
    fn test_queued_stays_eligible() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-1", DeliveryType::Web);
        assert!(ledger.claim("ds-1", DeliveryType::Web).unwrap());
        ledger.mark_queued("ds-1", DeliveryType::Web).unwrap();

        let eligible = ledger.eligible_requests().unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].status, RequestStatus::Queued);
    }

    #[test]
    fn test_mark_failed_sets_failure_date() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-1", DeliveryType::Web);
        let failed_at = Utc::now();
        ledger
            .mark_failed("ds-1", DeliveryType::Web, failed_at)
            .unwrap();

        let request = ledger.request("ds-1", DeliveryType::Web).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Failed);
        assert_eq!(
            request.failure_date.unwrap().timestamp(),
            failed_at.timestamp()
        );
        assert!(ledger.eligible_requests().unwrap().is_empty());
    }

    #[test]
    fn test_mark_success_sets_completion_and_expiry() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-1", DeliveryType::Sftp);
        let completed = Utc::now();
        let expiry = completed + chrono::Duration::days(7);
        ledger
            .mark_success("ds-1", DeliveryType::Sftp, completed, expiry)
            .unwrap();

        let request = ledger.request("ds-1", DeliveryType::Sftp).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Success);
        assert_eq!(request.expiry_date.unwrap().timestamp(), expiry.timestamp());
        assert_eq!(
            request.completion_date.unwrap().timestamp(),
            completed.timestamp()
        );
    }

    #[test]
    fn test_mark_unknown_request_fails() {
        let ledger = create_test_ledger();
        let result = ledger.mark_queued("ds-missing", DeliveryType::Web);
        assert!(matches!(result, Err(LedgerError::RequestNotFound { .. })));
    }

    #[test]
    fn test_files_by_dataset() {
        let ledger = create_test_ledger();
        seed_file(&ledger, "ds-1", "a.bin");
        seed_file(&ledger, "ds-1", "sub/b.bin");
        seed_file(&ledger, "ds-2", "c.bin");

        let files = ledger.files("ds-1").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].relative_destination, PathBuf::from("a.bin"));
        assert_eq!(files[1].relative_destination, PathBuf::from("sub/b.bin"));
    }

    #[test]
    fn test_archive_round_trip_is_identical() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-1", DeliveryType::Web);
        seed_file(&ledger, "ds-1", "a.bin");
        seed_file(&ledger, "ds-1", "b.bin");

        let completed = Utc::now();
        ledger
            .mark_success(
                "ds-1",
                DeliveryType::Web,
                completed,
                completed + chrono::Duration::days(7),
            )
            .unwrap();

        let live = ledger.request("ds-1", DeliveryType::Web).unwrap().unwrap();
        let live_files = ledger.files("ds-1").unwrap();

        ledger.archive_and_delete("ds-1", DeliveryType::Web).unwrap();

        assert!(ledger.request("ds-1", DeliveryType::Web).unwrap().is_none());
        assert!(ledger.files("ds-1").unwrap().is_empty());

        let archived = ledger
            .historical_request("ds-1", DeliveryType::Web)
            .unwrap()
            .unwrap();
        assert_eq!(archived, live);
        assert_eq!(ledger.historical_files("ds-1").unwrap(), live_files);
    }

    #[test]
    fn test_archive_keeps_files_while_other_request_live() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-1", DeliveryType::Web);
        seed_request(&ledger, "ds-1", DeliveryType::Federated);
        seed_file(&ledger, "ds-1", "a.bin");

        let now = Utc::now();
        ledger
            .mark_success("ds-1", DeliveryType::Web, now, now)
            .unwrap();
        ledger.archive_and_delete("ds-1", DeliveryType::Web).unwrap();

        // The federated request still needs its file rows.
        assert_eq!(ledger.files("ds-1").unwrap().len(), 1);
        assert!(ledger.historical_files("ds-1").unwrap().is_empty());

        ledger
            .mark_success("ds-1", DeliveryType::Federated, now, now)
            .unwrap();
        ledger
            .archive_and_delete("ds-1", DeliveryType::Federated)
            .unwrap();
        assert!(ledger.files("ds-1").unwrap().is_empty());
        assert_eq!(ledger.historical_files("ds-1").unwrap().len(), 1);
    }

    #[test]
    fn test_archive_unknown_request_fails() {
        let ledger = create_test_ledger();
        let result = ledger.archive_and_delete("ds-missing", DeliveryType::Web);
        assert!(matches!(result, Err(LedgerError::RequestNotFound { .. })));
    }

    #[test]
    fn test_reclaim_stale_pending() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-old", DeliveryType::Web);
        seed_request(&ledger, "ds-new", DeliveryType::Web);
        assert!(ledger.claim("ds-old", DeliveryType::Web).unwrap());
        assert!(ledger.claim("ds-new", DeliveryType::Web).unwrap());

        // Only claims older than the cutoff are reclaimed.
        let cutoff = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(ledger.reclaim_stale_pending(cutoff).unwrap(), 0);

        let cutoff = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(ledger.reclaim_stale_pending(cutoff).unwrap(), 2);

        let request = ledger.request("ds-old", DeliveryType::Web).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Requested);
        assert!(request.claimed_at.is_none());
    }

    #[test]
    fn test_unreadable_row_skipped_in_scans() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-ok", DeliveryType::Web);
        // A legacy encoding this version no longer knows.
        ledger
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO requests (type, dataset_id, status, owner) \
                 VALUES ('HTTP', 'ds-legacy', 'REQUESTED', 'proj-1')",
                [],
            )
            .unwrap();

        let eligible = ledger.eligible_requests().unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].dataset_id, "ds-ok");
    }

    #[test]
    fn test_corrupt_row_is_not_reported_as_unavailable() {
        let ledger = create_test_ledger();
        ledger
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO requests (type, dataset_id, status, owner, expiry_date) \
                 VALUES ('WEB', 'ds-bad', 'SUCCESS', 'proj-1', 'not-a-date')",
                [],
            )
            .unwrap();

        let result = ledger.request("ds-bad", DeliveryType::Web);
        assert!(matches!(result, Err(LedgerError::Corrupt(_))));
    }

    #[test]
    fn test_count_by_status() {
        let ledger = create_test_ledger();
        seed_request(&ledger, "ds-1", DeliveryType::Web);
        seed_request(&ledger, "ds-2", DeliveryType::Web);
        assert!(ledger.claim("ds-1", DeliveryType::Web).unwrap());

        assert_eq!(ledger.count_by_status(RequestStatus::Requested).unwrap(), 1);
        assert_eq!(ledger.count_by_status(RequestStatus::Pending).unwrap(), 1);
        assert_eq!(ledger.count_by_status(RequestStatus::Failed).unwrap(), 0);
    }

    #[test]
    fn test_quota_constants_default_when_absent() {
        let ledger = create_test_ledger();
        let constants = ledger.quota_constants().unwrap();
        assert_eq!(constants, QuotaConstants::default());
    }

    #[test]
    fn test_quota_constants_from_row() {
        let ledger = create_test_ledger();
        let constants = QuotaConstants {
            web_project_bytes: 500,
            federated_project_bytes: 600,
            sftp_project_bytes: 700,
        };
        ledger.set_quota_constants(&constants).unwrap();
        assert_eq!(ledger.quota_constants().unwrap(), constants);
    }

    #[test]
    fn test_file_based_ledger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("portage.db");

        let ledger = SqliteLedger::new(&db_path).unwrap();
        seed_request(&ledger, "ds-1", DeliveryType::Web);
        assert!(db_path.exists());
        assert!(ledger.request("ds-1", DeliveryType::Web).unwrap().is_some());
    }
}
