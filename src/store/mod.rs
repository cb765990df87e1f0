//! Persistence interface used by the engine, and its SQLite implementation.
use std::collections::HashSet;

use async_trait::async_trait;

use crate::{error::Result, record::TransferRecord};

/// The three ledger operations the engine needs. Any store that can answer
/// them is substitutable. No cross-writer locking is implied.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Highest stored block number, `None` for an empty ledger.
    async fn latest_block(&self) -> Result<Option<u64>>;

    /// Subset of `hashes` already present.
    async fn find_existing(&self, hashes: &HashSet<String>) -> Result<HashSet<String>>;

    /// Insert every record, or none of them. Returns the number inserted.
    async fn bulk_insert(&self, records: &[TransferRecord]) -> Result<usize>;
}

#[cfg(feature = "store-sqlite")]
pub mod sqlite_store;
#[cfg(feature = "store-sqlite")]
pub use sqlite_store::SqliteLedger;
