use super::{CounterStore, StoreError};
use crate::core::model::Verdict;
use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS counters (
        kind  TEXT PRIMARY KEY,
        count INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS sequences (
        dna    TEXT PRIMARY KEY,
        mutant INTEGER NOT NULL
    );
";

const INCREMENT: &str = "
    INSERT INTO counters (kind, count) VALUES (?1, 1)
    ON CONFLICT(kind) DO UPDATE SET count = count + 1
    RETURNING count
";

/// SQLite-backed store. Each handle owns one connection; handles in other
/// threads or processes may open the same file concurrently.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| {
            StoreError::unavailable(format!("failed to open {}: {}", path.display(), e))
        })?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Like [`SqliteStore::open`], but a missing file is an error instead of
    /// a fresh empty store.
    pub fn open_existing(path: &Path) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            StoreError::unavailable(format!("failed to open {}: {}", path.display(), e))
        })?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        apply_pragmas(&conn)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = ?path, "counter store ready");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::unavailable("sqlite connection lock poisoned"))
    }
}

/// WAL so readers never block the writer; busy_timeout so concurrent
/// writers from other processes wait instead of failing immediately.
fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;
    Ok(())
}

fn to_count(kind: Verdict, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::unavailable(format!("corrupt {} counter: {}", kind, value)))
}

impl CounterStore for SqliteStore {
    fn increment(&self, kind: Verdict) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(INCREMENT, params![kind.as_str()], |row| row.get(0))?;
        to_count(kind, count)
    }

    fn read(&self, kind: Verdict) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: Option<i64> = conn
            .query_row(
                "SELECT count FROM counters WHERE kind = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        to_count(kind, count.unwrap_or(0))
    }

    fn insert_sequence(&self, dna: &str, kind: Verdict) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO sequences (dna, mutant) VALUES (?1, ?2)",
            params![dna, kind.is_mutant()],
        )?;
        if inserted == 0 {
            return Ok(false);
        }
        let _count: i64 = tx.query_row(INCREMENT, params![kind.as_str()], |row| row.get(0))?;
        tx.commit()?;
        Ok(true)
    }
}
