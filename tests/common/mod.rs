#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use transfer_ledger::explorer::{PageQuery, TransferPage};
use transfer_ledger::prelude::*;
use transfer_ledger::{RetryPolicy, SyncError, TransferRecord};

/// ------- In-memory ledger; clones share the same rows -------
#[derive(Clone, Default)]
pub struct MemLedger {
    pub rows: Arc<Mutex<BTreeMap<String, TransferRecord>>>,
    /// Hashes handed to each `bulk_insert` call, in order.
    pub insert_calls: Arc<Mutex<Vec<Vec<String>>>>,
    /// Number of upcoming `bulk_insert` calls that fail.
    pub failing_inserts: Arc<AtomicU32>,
    /// Number of upcoming `latest_block` calls that fail.
    pub failing_cursor_reads: Arc<AtomicU32>,
    /// Number of upcoming `find_existing` calls that fail.
    pub failing_lookups: Arc<AtomicU32>,
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl MemLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn hashes(&self) -> Vec<String> {
        self.rows.lock().unwrap().keys().cloned().collect()
    }

    pub fn inserted_hashes(&self) -> Vec<String> {
        self.insert_calls
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn fail_next_inserts(&self, n: u32) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_cursor_reads(&self, n: u32) {
        self.failing_cursor_reads.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_lookups(&self, n: u32) {
        self.failing_lookups.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for MemLedger {
    async fn latest_block(&self) -> transfer_ledger::Result<Option<u64>> {
        if take_failure(&self.failing_cursor_reads) {
            return Err(SyncError::Persistence("database is locked".into()));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .map(|r| r.block_number)
            .max())
    }

    async fn find_existing(
        &self,
        hashes: &HashSet<String>,
    ) -> transfer_ledger::Result<HashSet<String>> {
        if take_failure(&self.failing_lookups) {
            return Err(SyncError::Persistence("disk I/O error".into()));
        }
        let rows = self.rows.lock().unwrap();
        Ok(hashes
            .iter()
            .filter(|h| rows.contains_key(*h))
            .cloned()
            .collect())
    }

    async fn bulk_insert(&self, records: &[TransferRecord]) -> transfer_ledger::Result<usize> {
        self.insert_calls
            .lock()
            .unwrap()
            .push(records.iter().map(|r| r.hash.clone()).collect());

        if take_failure(&self.failing_inserts) {
            return Err(SyncError::Persistence("disk I/O error".into()));
        }

        let mut rows = self.rows.lock().unwrap();
        if let Some(dup) = records.iter().find(|r| rows.contains_key(&r.hash)) {
            return Err(SyncError::Persistence(format!(
                "UNIQUE constraint failed: transactions.hash ({})",
                dup.hash
            )));
        }
        for r in records {
            rows.insert(r.hash.clone(), r.clone());
        }
        Ok(records.len())
    }
}

/// ------- Scripted explorer: fixed height, queued page answers -------
pub struct MockExplorer {
    pub height: u64,
    pub pages: Mutex<VecDeque<transfer_ledger::Result<TransferPage>>>,
    pub queries: Mutex<Vec<PageQuery>>,
    pub height_calls: AtomicU32,
    /// Number of upcoming height calls that fail.
    pub failing_height_calls: AtomicU32,
}

impl MockExplorer {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            pages: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
            height_calls: AtomicU32::new(0),
            failing_height_calls: AtomicU32::new(0),
        }
    }

    pub fn with_page(self, page: TransferPage) -> Self {
        self.pages.lock().unwrap().push_back(Ok(page));
        self
    }

    pub fn with_failure(self, err: SyncError) -> Self {
        self.pages.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExplorerSource for MockExplorer {
    async fn fetch_transfer_page(
        &self,
        query: &PageQuery,
    ) -> transfer_ledger::Result<TransferPage> {
        self.queries.lock().unwrap().push(query.clone());
        // Once the script runs out, the range is exhausted.
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(no_transactions()))
    }

    async fn fetch_current_block_height(&self, _chain_id: u64) -> transfer_ledger::Result<u64> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_height_calls) {
            return Err(SyncError::Upstream {
                status: Some(502),
                message: "HTTP 502: Bad Gateway".into(),
            });
        }
        Ok(self.height)
    }
}

/// ------- Fixtures -------
pub fn transfer(hash: &str, block: u64, function: &str, is_error: &str) -> Value {
    json!({
        "blockNumber": block.to_string(),
        "timeStamp": (1_700_000_000 + block).to_string(),
        "hash": hash,
        "blockHash": format!("0xblock{block}"),
        "from": "0xfrom",
        "to": "0xto",
        "value": "10000000000",
        "functionName": function,
        "isError": is_error,
        "tokenDecimal": "10"
    })
}

pub fn ok_transfer(hash: &str, block: u64) -> Value {
    transfer(hash, block, "batchAll(bytes[])", "0")
}

pub fn page(entries: Vec<Value>) -> TransferPage {
    TransferPage {
        status: "1".into(),
        message: Some("OK".into()),
        result: Value::Array(entries),
    }
}

pub fn no_transactions() -> TransferPage {
    TransferPage {
        status: "0".into(),
        message: Some("No transactions found".into()),
        result: json!([]),
    }
}

pub fn config(page_size: u32) -> SyncConfig {
    SyncConfig::new(1284, "0xtoken", "0xholder")
        .with_page_size(page_size)
        .with_retry(RetryPolicy::no_delay(3))
}
