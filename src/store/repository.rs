use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior, params};

use super::schema::{DB_SCHEMA_VERSION, SCHEMA};
use crate::error::{StorageContext, StorageError};
use crate::model::{ExamRecord, SessionKind, StoredExam, SubjectKey, UpsertOutcome};
use crate::util::{condense_whitespace, now_utc_string};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "exam_id, subject, exam_date, session_kind, source_document";

/// Owns the SQLite connection holding every ingested exam.
pub struct ExamRepository {
    connection: Connection,
}

impl ExamRepository {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let connection = Connection::open(path)
            .storage_context(|| format!("failed to open {}", path.display()))?;
        Self::initialize(connection, true)
    }

    /// Opens an existing store without running DDL or writing metadata.
    /// Any write through this handle fails with `Unavailable`.
    pub fn open_read_only(path: &Path) -> Result<Self, StorageError> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .storage_context(|| format!("failed to open {} read-only", path.display()))?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .storage_context(|| "failed to set busy timeout".to_string())?;
        Ok(Self { connection })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let connection = Connection::open_in_memory()
            .storage_context(|| "failed to open in-memory database".to_string())?;
        Self::initialize(connection, false)
    }

    fn initialize(connection: Connection, file_backed: bool) -> Result<Self, StorageError> {
        if file_backed {
            connection
                .pragma_update(None, "journal_mode", "WAL")
                .storage_context(|| "failed to set journal_mode=WAL".to_string())?;
            connection
                .pragma_update(None, "synchronous", "NORMAL")
                .storage_context(|| "failed to set synchronous=NORMAL".to_string())?;
        }
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .storage_context(|| "failed to set busy timeout".to_string())?;
        connection
            .execute_batch(SCHEMA)
            .storage_context(|| "failed to initialize exam schema".to_string())?;

        let repository = Self { connection };
        repository.set_metadata("db_schema_version", DB_SCHEMA_VERSION)?;
        Ok(repository)
    }

    /// Inserts the record or refreshes the row sharing its uniqueness key.
    ///
    /// The lookup and the write share one IMMEDIATE transaction, so the
    /// reported outcome matches what was committed.
    pub fn upsert(&mut self, record: &ExamRecord) -> Result<UpsertOutcome, StorageError> {
        let (subject_key, exam_date, session_kind) = record.key();
        let session_kind = session_kind.as_str();

        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .storage_context(|| "failed to begin upsert transaction".to_string())?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT exam_id FROM exams
                 WHERE subject_key = ?1 AND exam_date = ?2 AND session_kind = ?3",
                params![subject_key.as_str(), exam_date, session_kind],
                |row| row.get(0),
            )
            .optional()
            .storage_context(|| format!("failed to look up exam {}", record.subject()))?;

        let now = now_utc_string();
        tx.execute(
            "INSERT INTO exams(
               subject, subject_key, exam_date, session_kind, source_document, created_at, updated_at
             )
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(subject_key, exam_date, session_kind) DO UPDATE SET
               subject=excluded.subject,
               source_document=excluded.source_document,
               updated_at=excluded.updated_at",
            params![
                record.subject(),
                subject_key.as_str(),
                exam_date,
                session_kind,
                record.source_document(),
                now
            ],
        )
        .storage_context(|| format!("failed to write exam {}", record.subject()))?;

        tx.commit()
            .storage_context(|| "failed to commit upsert transaction".to_string())?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// Subject substring search, ordered by date then subject.
    pub fn search(
        &self,
        needle: &str,
        case_insensitive: bool,
    ) -> Result<Vec<StoredExam>, StorageError> {
        let (column, pattern) = if case_insensitive {
            ("subject_key", SubjectKey::new(needle).as_str().to_string())
        } else {
            ("subject", condense_whitespace(needle))
        };

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM exams
             WHERE instr({column}, ?1) > 0
             ORDER BY exam_date, subject, session_kind"
        );
        self.query_exams(&sql, params![pattern])
    }

    pub fn list_all(&self) -> Result<Vec<StoredExam>, StorageError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM exams ORDER BY exam_date, subject, session_kind"
        );
        self.query_exams(&sql, params![])
    }

    pub fn count(&self) -> Result<i64, StorageError> {
        self.connection
            .query_row("SELECT COUNT(*) FROM exams", [], |row| row.get(0))
            .storage_context(|| "failed to count exams".to_string())
    }

    pub fn count_by_session(&self) -> Result<Vec<(SessionKind, i64)>, StorageError> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT session_kind, COUNT(*) FROM exams GROUP BY session_kind ORDER BY session_kind",
            )
            .storage_context(|| "failed to prepare session count query".to_string())?;

        let rows = statement
            .query_map([], |row| {
                let kind = decode_session_kind(row, 0)?;
                let count: i64 = row.get(1)?;
                Ok((kind, count))
            })
            .storage_context(|| "failed to count exams by session".to_string())?;

        rows.collect::<Result<Vec<_>, _>>()
            .storage_context(|| "failed to decode session counts".to_string())
    }

    /// Maintenance reset: removes every stored exam.
    pub fn clear(&mut self) -> Result<usize, StorageError> {
        let tx = self
            .connection
            .transaction()
            .storage_context(|| "failed to begin reset transaction".to_string())?;
        let removed = tx
            .execute("DELETE FROM exams", [])
            .storage_context(|| "failed to delete exams".to_string())?;
        tx.commit()
            .storage_context(|| "failed to commit reset transaction".to_string())?;
        Ok(removed)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.connection
            .execute(
                "INSERT INTO metadata(key, value) VALUES(?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value=excluded.value",
                params![key, value],
            )
            .storage_context(|| format!("failed to write metadata {key}"))?;
        Ok(())
    }

    pub fn metadata(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.connection
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .storage_context(|| format!("failed to read metadata {key}"))
    }

    #[cfg(test)]
    pub(crate) fn connection_for_tests(&self) -> &Connection {
        &self.connection
    }

    fn query_exams(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<StoredExam>, StorageError> {
        let mut statement = self
            .connection
            .prepare(sql)
            .storage_context(|| "failed to prepare exam query".to_string())?;

        let rows = statement
            .query_map(params, decode_exam)
            .storage_context(|| "failed to query exams".to_string())?;

        rows.collect::<Result<Vec<StoredExam>, _>>()
            .storage_context(|| "failed to decode stored exam".to_string())
    }
}

fn decode_session_kind(row: &Row<'_>, index: usize) -> rusqlite::Result<SessionKind> {
    let raw: String = row.get(index)?;
    raw.parse::<SessionKind>()
        .map_err(|message| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into()))
}

fn decode_exam(row: &Row<'_>) -> rusqlite::Result<StoredExam> {
    let exam_id: i64 = row.get(0)?;
    let subject: String = row.get(1)?;
    let exam_date: NaiveDate = row.get(2)?;
    let session_kind = decode_session_kind(row, 3)?;
    let source_document: String = row.get(4)?;

    let record = ExamRecord::new(&subject, exam_date, session_kind, &source_document)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(error)))?;

    Ok(StoredExam { exam_id, record })
}
