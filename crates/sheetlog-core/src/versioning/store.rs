//! Record storage layer with snapshot reconstruction.
//!
//! Provides SQLite-backed persistence for the change log and import sessions.

use crate::error::{ErrorCode, SheetlogError, SheetlogResult};
use crate::versioning::{
    ChangeType, DatasetRecord, DatasetSummary, ImportSession, VersionCommit,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// Trait for change log storage operations
pub trait RecordStore: Send + Sync {
    /// Highest version of a dataset, 0 when it was never imported
    fn max_version(&self, dataset: &str) -> SheetlogResult<u32>;

    /// State of a dataset at a version: business key to canonical JSON
    fn load_snapshot(&self, dataset: &str, version_no: u32)
        -> SheetlogResult<BTreeMap<String, String>>;

    /// Write all records and the session of one import atomically
    ///
    /// Fails with `ConflictingVersion` when the dataset's highest version is
    /// no longer `commit.previous_version_no`.
    fn commit(&self, commit: &VersionCommit) -> SheetlogResult<ImportSession>;

    /// Sessions of a dataset, newest version first
    fn sessions(&self, dataset: &str) -> SheetlogResult<Vec<ImportSession>>;

    /// Records written for one version, ordered by business key
    fn changes(&self, dataset: &str, version_no: u32) -> SheetlogResult<Vec<DatasetRecord>>;

    /// Look up a session by id
    fn session(&self, id: Uuid) -> SheetlogResult<Option<ImportSession>>;

    /// Aggregate statistics for a dataset
    fn dataset_summary(&self, dataset: &str) -> SheetlogResult<Option<DatasetSummary>>;

    /// Names of all imported datasets, sorted
    fn datasets(&self) -> SheetlogResult<Vec<String>>;
}

/// SQLite-backed record store
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

const SESSION_COLUMNS: &str = "id, dataset_name, new_version_no, previous_version_no, \
     inserted_count, updated_count, deleted_count, summary_en, summary_mr, created_at";

impl SqliteRecordStore {
    /// Create a new store at the given path
    pub fn new(path: impl AsRef<Path>) -> SheetlogResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        tracing::debug!(path = %path.display(), "Opened record store");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> SheetlogResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> SheetlogResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SheetlogError::persistence("Record store connection lock poisoned"))
    }

    fn init_schema(&self) -> SheetlogResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS dataset_records (
                id TEXT PRIMARY KEY,
                dataset_name TEXT NOT NULL,
                business_key TEXT NOT NULL,
                version_no INTEGER NOT NULL,
                change_type TEXT NOT NULL,
                data_json TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(dataset_name, business_key, version_no)
            );

            -- Changes for one version
            CREATE INDEX IF NOT EXISTS idx_records_dataset_version
                ON dataset_records(dataset_name, version_no);

            CREATE TABLE IF NOT EXISTS import_sessions (
                id TEXT PRIMARY KEY,
                dataset_name TEXT NOT NULL,
                new_version_no INTEGER NOT NULL,
                previous_version_no INTEGER NOT NULL,
                inserted_count INTEGER NOT NULL,
                updated_count INTEGER NOT NULL,
                deleted_count INTEGER NOT NULL,
                summary_en TEXT,
                summary_mr TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(dataset_name, new_version_no)
            );
        "#,
        )?;
        Ok(())
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(value: &str) -> SheetlogResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| SheetlogError::Parse {
                message: format!("Invalid timestamp '{}': {}", value, e),
                code: ErrorCode::ParseInvalidTimestamp,
            })
    }

    fn parse_id(value: &str) -> SheetlogResult<Uuid> {
        Uuid::parse_str(value).map_err(|e| SheetlogError::parse(e.to_string()))
    }

    /// Highest version across sessions and records. Zero-change versions
    /// have a session but no records.
    fn max_version_in(conn: &Connection, dataset: &str) -> SheetlogResult<u32> {
        let max: Option<u32> = conn.query_row(
            r#"SELECT MAX(v) FROM (
                   SELECT MAX(new_version_no) AS v FROM import_sessions WHERE dataset_name = ?1
                   UNION ALL
                   SELECT MAX(version_no) AS v FROM dataset_records WHERE dataset_name = ?1
               )"#,
            params![dataset],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    fn row_to_session(row: &rusqlite::Row<'_>) -> SheetlogResult<ImportSession> {
        let id: String = row.get(0)?;
        let created_at: String = row.get(9)?;

        Ok(ImportSession {
            id: Self::parse_id(&id)?,
            dataset_name: row.get(1)?,
            new_version_no: row.get(2)?,
            previous_version_no: row.get(3)?,
            inserted_count: row.get(4)?,
            updated_count: row.get(5)?,
            deleted_count: row.get(6)?,
            summary_en: row.get(7)?,
            summary_mr: row.get(8)?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> SheetlogResult<DatasetRecord> {
        let id: String = row.get(0)?;
        let change_type: String = row.get(4)?;
        let created_at: String = row.get(6)?;

        Ok(DatasetRecord {
            id: Self::parse_id(&id)?,
            dataset_name: row.get(1)?,
            business_key: row.get(2)?,
            version_no: row.get(3)?,
            change_type: ChangeType::from_str(&change_type).ok_or_else(|| {
                SheetlogError::parse(format!("Unknown change type '{}'", change_type))
            })?,
            data_json: row.get(5)?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }
}

impl RecordStore for SqliteRecordStore {
    fn max_version(&self, dataset: &str) -> SheetlogResult<u32> {
        let conn = self.lock()?;
        Self::max_version_in(&conn, dataset)
    }

    fn load_snapshot(
        &self,
        dataset: &str,
        version_no: u32,
    ) -> SheetlogResult<BTreeMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"SELECT r.business_key, r.data_json
               FROM dataset_records r
               JOIN (
                   SELECT business_key, MAX(version_no) AS latest
                   FROM dataset_records
                   WHERE dataset_name = ?1 AND version_no <= ?2
                   GROUP BY business_key
               ) l ON r.business_key = l.business_key AND r.version_no = l.latest
               WHERE r.dataset_name = ?1 AND r.change_type != 'deleted'"#,
        )?;

        let rows = stmt.query_map(params![dataset, version_no], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, data_json) = row?;
            if let Some(data_json) = data_json {
                snapshot.insert(key, data_json);
            }
        }
        Ok(snapshot)
    }

    fn commit(&self, commit: &VersionCommit) -> SheetlogResult<ImportSession> {
        if commit.new_version_no != commit.previous_version_no + 1 {
            return Err(SheetlogError::Internal(format!(
                "Version {} does not follow {}",
                commit.new_version_no, commit.previous_version_no
            )));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = Self::max_version_in(&tx, &commit.dataset_name)?;
        if current != commit.previous_version_no {
            return Err(SheetlogError::conflicting_version(format!(
                "Dataset '{}' is at version {}, expected {}",
                commit.dataset_name, current, commit.previous_version_no
            )));
        }

        let stamp = Self::timestamp(Utc::now());
        let created_at = Self::parse_timestamp(&stamp)?;
        {
            let mut insert = tx.prepare(
                r#"INSERT INTO dataset_records
                   (id, dataset_name, business_key, version_no, change_type, data_json, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            )?;
            for change in &commit.changes {
                insert.execute(params![
                    Uuid::new_v4().to_string(),
                    commit.dataset_name,
                    change.business_key,
                    commit.new_version_no,
                    change.change_type.as_str(),
                    change.data_json,
                    stamp,
                ])?;
            }
        }

        let session = ImportSession {
            id: Uuid::new_v4(),
            dataset_name: commit.dataset_name.clone(),
            new_version_no: commit.new_version_no,
            previous_version_no: commit.previous_version_no,
            inserted_count: commit.counts.inserted,
            updated_count: commit.counts.updated,
            deleted_count: commit.counts.deleted,
            summary_en: commit.notes.en.clone(),
            summary_mr: commit.notes.mr.clone(),
            created_at,
        };

        tx.execute(
            &format!(
                "INSERT INTO import_sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                SESSION_COLUMNS
            ),
            params![
                session.id.to_string(),
                session.dataset_name,
                session.new_version_no,
                session.previous_version_no,
                session.inserted_count,
                session.updated_count,
                session.deleted_count,
                session.summary_en,
                session.summary_mr,
                stamp,
            ],
        )?;

        tx.commit()?;
        Ok(session)
    }

    fn sessions(&self, dataset: &str) -> SheetlogResult<Vec<ImportSession>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_sessions WHERE dataset_name = ?1 ORDER BY new_version_no DESC",
            SESSION_COLUMNS
        ))?;

        let results = stmt.query_map(params![dataset], |row| Ok(Self::row_to_session(row)))?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }

    fn changes(&self, dataset: &str, version_no: u32) -> SheetlogResult<Vec<DatasetRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, dataset_name, business_key, version_no, change_type, data_json, created_at
               FROM dataset_records
               WHERE dataset_name = ?1 AND version_no = ?2
               ORDER BY business_key ASC"#,
        )?;

        let results = stmt.query_map(params![dataset, version_no], |row| {
            Ok(Self::row_to_record(row))
        })?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }

    fn session(&self, id: Uuid) -> SheetlogResult<Option<ImportSession>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_sessions WHERE id = ?1",
            SESSION_COLUMNS
        ))?;

        stmt.query_row(params![id.to_string()], |row| Ok(Self::row_to_session(row)))
            .optional()?
            .transpose()
    }

    fn dataset_summary(&self, dataset: &str) -> SheetlogResult<Option<DatasetSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"SELECT
                COUNT(*) AS sessions,
                MAX(new_version_no) AS latest,
                COALESCE(SUM(inserted_count), 0),
                COALESCE(SUM(updated_count), 0),
                COALESCE(SUM(deleted_count), 0),
                MIN(created_at) AS first,
                MAX(created_at) AS last
               FROM import_sessions
               WHERE dataset_name = ?1"#,
        )?;

        let row = stmt.query_row(params![dataset], |row| {
            let sessions: i64 = row.get(0)?;
            if sessions == 0 {
                return Ok(None);
            }
            Ok(Some((
                sessions,
                row.get::<_, u32>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            )))
        })?;

        let Some((sessions, latest, inserted, updated, deleted, first, last)) = row else {
            return Ok(None);
        };

        Ok(Some(DatasetSummary {
            dataset_name: dataset.to_string(),
            latest_version: latest,
            session_count: sessions as usize,
            total_inserted: inserted as u64,
            total_updated: updated as u64,
            total_deleted: deleted as u64,
            first_import: Self::parse_timestamp(&first)?,
            last_import: Self::parse_timestamp(&last)?,
        }))
    }

    fn datasets(&self) -> SheetlogResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT dataset_name FROM import_sessions ORDER BY dataset_name ASC",
        )?;
        let names = stmt.query_map([], |row| row.get(0))?;
        names.map(|r| r.map_err(SheetlogError::from)).collect()
    }
}
