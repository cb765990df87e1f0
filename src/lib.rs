#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! transfer-ledger: incremental, idempotent ingestion of explorer token
//! transfers into a local ledger.
//!
//! ## What you provide
//! - [`ExplorerSource`]: paginated transfer history + current chain height
//!   ([`EtherscanClient`] speaks the Etherscan v2 API).
//! - [`LedgerStore`]: latest block, existing-hash lookup and bulk insert
//!   ([`SqliteLedger`] keeps them in one SQLite table).
//! - [`SyncConfig`]: the chain + contract + address triple and paging/retry knobs.
//!
//! ## What the engine does
//! - Resumes from `1 + max(block_number)` in the ledger (0 when empty).
//! - Pages through the explorer up to the chain height fixed at run start.
//! - Drops failed and already-stored transfers, bulk-inserts the rest.
//! - Retries every upstream call with exponential backoff and jitter.
//! - Never returns an error: a run ends `Done` or `Aborted`, with totals.
//!
//! ## Minimal usage
//! ```rust,ignore
//! use transfer_ledger::prelude::*;
//!
//! async fn run() -> transfer_ledger::Result<()> {
//!     let store = SqliteLedger::new("ledger.db")?;
//!     let explorer = EtherscanClient::new(&ExplorerConfig::new("API_KEY"))?;
//!     let config = SyncConfig::new(1284, "0xToken", "0xHolder");
//!     config.validate()?;
//!
//!     let summary = TransferSync::new(store, explorer, config).run().await;
//!     println!("fetched {} inserted {}", summary.total_fetched, summary.total_inserted);
//!     Ok(())
//! }
//! ```

/// Configuration for the synced triple and the explorer endpoint.
pub mod config;

/// Sync orchestrator: cursor, pagination, filtering, insertion.
pub mod engine;

/// Error taxonomy.
pub mod error;

/// Explorer abstraction and the Etherscan HTTP client.
pub mod explorer;

/// Raw explorer entries and parsed ledger records.
pub mod record;

/// Bounded retry with backoff.
pub mod retry;

/// Persistence layer (trait and SQLite implementation).
pub mod store;

// Public re-exports
pub use config::{ExplorerConfig, SyncConfig};
pub use engine::{SyncOutcome, SyncSummary, TransferSync};
pub use error::{Result, SyncError};
pub use explorer::{EtherscanClient, ExplorerSource};
pub use record::{RawTransfer, TransferRecord, U256};
pub use retry::{with_retry, RetryPolicy};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteLedger;
pub use store::LedgerStore;

/// Convenience prelude for end users.
pub mod prelude {
    pub use crate::{
        EtherscanClient, ExplorerConfig, ExplorerSource, LedgerStore, RetryPolicy, SyncConfig,
        SyncOutcome, SyncSummary, TransferSync,
    };
    #[cfg(feature = "store-sqlite")]
    pub use crate::SqliteLedger;
}
