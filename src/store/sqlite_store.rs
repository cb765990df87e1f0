//! Embedded SQLite ledger.
use std::{collections::HashSet, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tokio::task;

use crate::{
    error::{Result, SyncError},
    record::{parse_amount, TransferRecord},
    store::LedgerStore,
};

/// Hashes per `IN (...)` lookup; well under SQLite's bound-parameter limit.
const LOOKUP_CHUNK: usize = 500;

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;

    CREATE TABLE IF NOT EXISTS transactions (
        hash          TEXT PRIMARY KEY,
        block_number  INTEGER NOT NULL,
        block_hash    TEXT NOT NULL,
        timestamp     INTEGER NOT NULL,
        from_address  TEXT NOT NULL,
        to_address    TEXT NOT NULL,
        value         TEXT NOT NULL,
        function_name TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS transactions_block_number   ON transactions(block_number);
    CREATE INDEX IF NOT EXISTS transactions_function_name  ON transactions(function_name);
"#;

/// Table:
///   transactions(hash TEXT PRIMARY KEY, block_number, block_hash, timestamp,
///                from_address, to_address, value, function_name)
///
/// `timestamp` is epoch seconds; `value` is the raw amount as a decimal string
/// (uint256 does not fit SQLite's 64-bit integers).
///
/// Every operation opens its own connection on a blocking thread and drops it
/// before returning, so no connection outlives a call.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    path: PathBuf,
}

impl SqliteLedger {
    /// Creates/initializes the SQLite file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open(&path)
            .with_context(|| format!("open sqlite at {}", path.display()))
            .map_err(SyncError::persistence)?;
        conn.execute_batch(SCHEMA)
            .context("create ledger schema")
            .map_err(SyncError::persistence)?;
        Ok(Self { path })
    }

    /// Number of stored transfers.
    pub async fn transaction_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))?;
            Ok(u64::try_from(n)?)
        })
        .await
    }

    /// Look up one transfer by hash.
    pub async fn get(&self, hash: &str) -> Result<Option<TransferRecord>> {
        let hash = hash.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT hash, block_number, block_hash, timestamp, from_address, to_address,
                        value, function_name
                 FROM transactions WHERE hash = ?1",
                params![hash],
                RawRow::read,
            )
            .optional()?
            .map(RawRow::into_record)
            .transpose()
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)
                .with_context(|| format!("open sqlite at {}", path.display()))?;
            conn.busy_timeout(Duration::from_secs(5))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| SyncError::Persistence(format!("blocking task: {e}")))?
        .map_err(SyncError::persistence)
    }
}

/// Row as stored, before conversion back into typed fields.
struct RawRow {
    hash: String,
    block_number: i64,
    block_hash: String,
    timestamp: i64,
    from: String,
    to: String,
    value: String,
    function_name: String,
}

impl RawRow {
    fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            hash: r.get(0)?,
            block_number: r.get(1)?,
            block_hash: r.get(2)?,
            timestamp: r.get(3)?,
            from: r.get(4)?,
            to: r.get(5)?,
            value: r.get(6)?,
            function_name: r.get(7)?,
        })
    }

    fn into_record(self) -> anyhow::Result<TransferRecord> {
        let timestamp = Utc
            .timestamp_opt(self.timestamp, 0)
            .single()
            .ok_or_else(|| anyhow!("stored timestamp {} out of range", self.timestamp))?;
        Ok(TransferRecord {
            block_number: u64::try_from(self.block_number).context("stored block_number")?,
            value: parse_amount(&self.value).map_err(|e| anyhow!("stored value: {e}"))?,
            hash: self.hash,
            block_hash: self.block_hash,
            timestamp,
            from: self.from,
            to: self.to,
            function_name: self.function_name,
        })
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn latest_block(&self) -> Result<Option<u64>> {
        self.with_conn(|conn| {
            let max: Option<i64> =
                conn.query_row("SELECT MAX(block_number) FROM transactions", [], |r| r.get(0))?;
            max.map(|b| u64::try_from(b).context("stored block_number"))
                .transpose()
        })
        .await
    }

    async fn find_existing(&self, hashes: &HashSet<String>) -> Result<HashSet<String>> {
        if hashes.is_empty() {
            return Ok(HashSet::new());
        }
        let hashes: Vec<String> = hashes.iter().cloned().collect();
        self.with_conn(move |conn| {
            let mut found = HashSet::new();
            for chunk in hashes.chunks(LOOKUP_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(",");
                let sql = format!("SELECT hash FROM transactions WHERE hash IN ({placeholders})");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |r| r.get::<_, String>(0))?;
                for hash in rows {
                    found.insert(hash?);
                }
            }
            Ok(found)
        })
        .await
    }

    async fn bulk_insert(&self, records: &[TransferRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let records = records.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO transactions
                        (hash, block_number, block_hash, timestamp, from_address, to_address,
                         value, function_name)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for rec in &records {
                    let block_number = i64::try_from(rec.block_number)
                        .with_context(|| format!("block_number of {}", rec.hash))?;
                    stmt.execute(params![
                        rec.hash,
                        block_number,
                        rec.block_hash,
                        rec.timestamp.timestamp(),
                        rec.from,
                        rec.to,
                        rec.value.to_string(),
                        rec.function_name,
                    ])
                    .with_context(|| format!("insert transfer {}", rec.hash))?;
                }
            }
            tx.commit()?;
            Ok(records.len())
        })
        .await
    }
}
