//! Transfer entries as the explorer reports them, and as the ledger stores them.
//!
//! Every numeric field arrives from the explorer as a string. They are parsed
//! here, once, at the ingestion boundary:
//!   blockNumber : decimal `u64`
//!   timeStamp   : decimal epoch seconds -> `DateTime<Utc>`
//!   value       : decimal raw token amount -> `U256` (no scaling)
//!
//! A field that does not parse is an error, never a zero.
pub use alloy_primitives::U256;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// One entry of a `tokentx` result list, untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransfer {
    /// Transaction hash.
    pub hash: String,
    /// Block height, decimal string.
    pub block_number: String,
    /// Containing block hash.
    pub block_hash: String,
    /// Block time, decimal epoch seconds.
    pub time_stamp: String,
    /// Sender.
    pub from: String,
    /// Recipient.
    pub to: String,
    /// Raw token amount, decimal string.
    pub value: String,
    /// Contract method, possibly with its parameter signature.
    #[serde(default)]
    pub function_name: String,
    /// `"1"` when the transaction failed.
    #[serde(default)]
    pub is_error: Option<String>,
}

/// A parsed transfer, ready for the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Transaction hash; the ledger's natural key.
    pub hash: String,
    /// Block height.
    pub block_number: u64,
    /// Containing block hash.
    pub block_hash: String,
    /// Block time.
    pub timestamp: DateTime<Utc>,
    /// Sender.
    pub from: String,
    /// Recipient.
    pub to: String,
    /// Raw token amount in the token's smallest unit (full uint256 range).
    pub value: U256,
    /// Contract method name without its parameter signature.
    pub function_name: String,
}

impl RawTransfer {
    /// Whether the explorer flagged this transaction as failed.
    pub fn is_failed(&self) -> bool {
        self.is_error.as_deref() == Some("1")
    }

    /// Parsed block height.
    pub fn block_number(&self) -> Result<u64> {
        self.block_number
            .trim()
            .parse::<u64>()
            .map_err(|e| self.invalid("blockNumber", e))
    }

    /// Parse every field into a [`TransferRecord`].
    pub fn into_record(self) -> Result<TransferRecord> {
        let block_number = self.block_number()?;

        let secs = self
            .time_stamp
            .trim()
            .parse::<i64>()
            .map_err(|e| self.invalid("timeStamp", e))?;
        let timestamp = Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| self.invalid("timeStamp", "out of range"))?;

        let value = parse_amount(self.value.trim()).map_err(|e| self.invalid("value", e))?;

        let function_name = normalize_function_name(&self.function_name).to_string();

        Ok(TransferRecord {
            hash: self.hash,
            block_number,
            block_hash: self.block_hash,
            timestamp,
            from: self.from,
            to: self.to,
            value,
            function_name,
        })
    }

    fn invalid(&self, field: &'static str, reason: impl ToString) -> SyncError {
        SyncError::InvalidField {
            hash: self.hash.clone(),
            field,
            reason: reason.to_string(),
        }
    }
}

/// Parse a plain decimal uint256 amount. Signs, separators, prefixes and the
/// empty string are rejected.
pub fn parse_amount(raw: &str) -> std::result::Result<U256, String> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("{raw:?} is not a decimal integer"));
    }
    U256::from_str_radix(raw, 10).map_err(|e| e.to_string())
}

/// Strip a parameter signature: `"batchAll(bytes[])"` -> `"batchAll"`.
pub fn normalize_function_name(name: &str) -> &str {
    match name.find('(') {
        Some(idx) => &name[..idx],
        None => name,
    }
}
