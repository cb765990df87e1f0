//! Abstractions over the block-explorer API: paginated transfer history and
//! current chain height.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{Result, SyncError},
    record::RawTransfer,
};

/// Message the explorer pairs with status `"0"` once a range has no transfers.
pub const NO_TRANSACTIONS_FOUND: &str = "No transactions found";

/// Ordering of a transfer-history page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Asc,
    /// Newest first.
    Desc,
}

impl SortOrder {
    /// Query-string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One transfer-history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// Chain identifier.
    pub chain_id: u64,
    /// Token contract.
    pub contract_address: String,
    /// Holder / participant address.
    pub address: String,
    /// First block, inclusive.
    pub start_block: u64,
    /// Last block, inclusive.
    pub end_block: u64,
    /// 1-based page index.
    pub page: u32,
    /// Entries per page.
    pub page_size: u32,
    /// Result ordering.
    pub sort: SortOrder,
}

/// The `{status, message?, result}` envelope, as returned.
///
/// `result` is kept untyped: on errors the explorer puts a string there
/// instead of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPage {
    /// `"1"` on success, `"0"` otherwise.
    pub status: String,
    /// Optional explanation.
    #[serde(default)]
    pub message: Option<String>,
    /// Transfer list, or an error string.
    #[serde(default)]
    pub result: Value,
}

impl TransferPage {
    /// Explicit "nothing in this range" answer.
    pub fn is_exhausted(&self) -> bool {
        self.status == "0" && self.message.as_deref() == Some(NO_TRANSACTIONS_FOUND)
    }

    /// Decode the result list. Anything but a list of transfer objects is malformed.
    pub fn transfers(&self) -> Result<Vec<RawTransfer>> {
        let Value::Array(entries) = &self.result else {
            return Err(SyncError::MalformedResponse(format!(
                "status={} message={:?} result={}",
                self.status, self.message, self.result
            )));
        };
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                RawTransfer::deserialize(entry).map_err(|e| {
                    SyncError::MalformedResponse(format!("transfer entry #{i}: {e}"))
                })
            })
            .collect()
    }
}

/// Upstream provider of transfer history.
#[async_trait]
pub trait ExplorerSource: Send + Sync {
    /// Fetch one page of token transfers. "No results" is returned as an
    /// envelope, not as an error; callers inspect [`TransferPage::is_exhausted`].
    async fn fetch_transfer_page(&self, query: &PageQuery) -> Result<TransferPage>;

    /// Current chain height.
    async fn fetch_current_block_height(&self, chain_id: u64) -> Result<u64>;
}

/// Parse a `0x`-prefixed hexadecimal block number.
pub fn parse_hex_height(raw: &str) -> Result<u64> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| SyncError::MalformedResponse(format!("block number {raw:?} is not hex")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| SyncError::MalformedResponse(format!("block number {raw:?}: {e}")))
}

pub mod etherscan;
pub use etherscan::EtherscanClient;
