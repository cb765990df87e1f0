//! Orchestrator for one transfer-sync run:
//! 1) derive the cursor from the ledger and fix the target height,
//! 2) page through the explorer from the cursor, dropping failed and known transfers,
//! 3) bulk-insert what is new and advance the cursor past each full page.
use std::collections::HashSet;

use tracing::{error, info, warn};

use crate::{
    config::SyncConfig,
    error::{Result, SyncError},
    explorer::ExplorerSource,
    record::{RawTransfer, TransferRecord},
    retry::with_retry,
    store::LedgerStore,
};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncOutcome {
    /// Reached the end of available data (or had nothing to do).
    #[default]
    Done,
    /// Stopped early; the next run resumes from the ledger's cursor.
    Aborted {
        /// Why the run stopped.
        reason: String,
    },
}

/// Totals for one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncSummary {
    /// Cursor the run started from.
    pub start_block: u64,
    /// Chain height the run synced towards, once known.
    pub end_block: Option<u64>,
    /// Pages requested from the explorer.
    pub pages: u32,
    /// Raw entries received, failed transfers included.
    pub total_fetched: usize,
    /// Rows written to the ledger.
    pub total_inserted: usize,
    /// Terminal state.
    pub outcome: SyncOutcome,
}

impl SyncSummary {
    /// Whether the run ended in `Done`.
    pub fn is_done(&self) -> bool {
        self.outcome == SyncOutcome::Done
    }
}

/// Sync engine. `S` = ledger store, `E` = explorer source.
pub struct TransferSync<S, E> {
    store: S,
    explorer: E,
    config: SyncConfig,
}

impl<S, E> TransferSync<S, E>
where
    S: LedgerStore + 'static,
    E: ExplorerSource + 'static,
{
    /// Create an engine over a ledger, an explorer and the triple to sync.
    pub fn new(store: S, explorer: E, config: SyncConfig) -> Self {
        Self {
            store,
            explorer,
            config,
        }
    }

    /// The ledger this engine writes to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The explorer this engine reads from.
    pub fn explorer(&self) -> &E {
        &self.explorer
    }

    /// Run one sync to the current chain height.
    ///
    /// An invalid [`SyncConfig`] aborts the run before the ledger or the
    /// explorer is touched.
    ///
    /// Never fails: aborts are logged and reported in the returned summary.
    /// Pages are processed strictly one after another; at most one run per
    /// ledger should be active at a time.
    #[tracing::instrument(
        name = "transfer_sync",
        skip(self),
        fields(chain_id = self.config.chain_id, contract = %self.config.contract_address)
    )]
    pub async fn run(&self) -> SyncSummary {
        let mut summary = SyncSummary::default();

        match self.sync(&mut summary).await {
            Ok(()) => {
                info!(
                    total_fetched = summary.total_fetched,
                    total_inserted = summary.total_inserted,
                    pages = summary.pages,
                    "synchronization completed"
                );
            }
            Err(err) => {
                error!(
                    error = %err,
                    total_fetched = summary.total_fetched,
                    total_inserted = summary.total_inserted,
                    pages = summary.pages,
                    "synchronization aborted"
                );
                summary.outcome = SyncOutcome::Aborted {
                    reason: err.to_string(),
                };
            }
        }

        summary
    }

    async fn sync(&self, summary: &mut SyncSummary) -> Result<()> {
        let cfg = &self.config;
        cfg.validate()?;

        let mut start = self.store.latest_block().await?.map_or(0, |b| b + 1);
        summary.start_block = start;
        info!(start_block = start, "starting synchronization");

        let end = with_retry(&cfg.retry, "fetch current block height", || {
            self.explorer.fetch_current_block_height(cfg.chain_id)
        })
        .await?;
        summary.end_block = Some(end);
        info!(start_block = start, end_block = end, "synchronization range determined");

        if start >= end {
            info!("ledger is already at chain height");
            return Ok(());
        }

        while start < end {
            let query = cfg.page_query(start, end);
            let page = with_retry(&cfg.retry, "fetch transfer page", || {
                self.explorer.fetch_transfer_page(&query)
            })
            .await?;
            summary.pages += 1;

            if page.is_exhausted() {
                info!(start_block = start, end_block = end, "no transactions found for the range");
                break;
            }

            let transfers = page.transfers()?;
            if transfers.is_empty() {
                warn!(start_block = start, end_block = end, "empty page received for the range");
                break;
            }

            let fetched = transfers.len();
            summary.total_fetched += fetched;
            info!(count = fetched, "transactions fetched");

            // Cursor is taken from the raw page, failed transfers included.
            let mut last_block = 0;
            for tx in &transfers {
                last_block = last_block.max(tx.block_number()?);
            }

            let full = fetched >= cfg.page_size as usize;
            if full && last_block < start {
                return Err(SyncError::MalformedResponse(format!(
                    "full page ended at block {last_block}, below requested start {start}"
                )));
            }

            let fresh = self.select_new(transfers).await?;
            let inserted = self.persist(&fresh).await?;
            summary.total_inserted += inserted;
            info!(fetched, inserted, "page processed");

            if !full {
                info!("short page, range fully synchronized");
                break;
            }
            start = last_block + 1;
            info!(start_block = start, "page limit reached, advancing cursor");
        }

        Ok(())
    }

    /// Drop failed transfers, hashes already in the ledger and repeats within
    /// the page; parse what is left.
    async fn select_new(&self, transfers: Vec<RawTransfer>) -> Result<Vec<TransferRecord>> {
        let candidates: Vec<RawTransfer> = transfers
            .into_iter()
            .filter(|tx| {
                if tx.is_failed() {
                    warn!(hash = %tx.hash, "excluding failed transaction");
                    false
                } else {
                    true
                }
            })
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let hashes: HashSet<String> = candidates.iter().map(|tx| tx.hash.clone()).collect();
        let existing = self.store.find_existing(&hashes).await?;

        let mut seen = HashSet::with_capacity(candidates.len());
        let mut fresh = Vec::with_capacity(candidates.len());
        for tx in candidates {
            if existing.contains(&tx.hash) || !seen.insert(tx.hash.clone()) {
                continue;
            }
            fresh.push(tx.into_record()?);
        }
        Ok(fresh)
    }

    /// Insert one page. The insert is all-or-nothing and retried; if it keeps
    /// failing the error ends the run before the cursor moves past this page.
    async fn persist(&self, records: &[TransferRecord]) -> Result<usize> {
        if records.is_empty() {
            info!("no new transactions to insert");
            return Ok(0);
        }
        let inserted = with_retry(&self.config.retry, "bulk insert", || {
            self.store.bulk_insert(records)
        })
        .await?;
        info!(count = inserted, "transactions inserted into ledger");
        Ok(inserted)
    }
}
