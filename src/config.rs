//! Configuration for one chain + contract + address triple.
use std::{fmt, time::Duration};

use serde::Deserialize;

use crate::{
    error::{Result, SyncError},
    explorer::{PageQuery, SortOrder},
    retry::RetryPolicy,
};

/// Largest window the explorer serves in one call.
pub const DEFAULT_PAGE_SIZE: u32 = 10_000;

/// Etherscan v2 multichain endpoint.
pub const DEFAULT_EXPLORER_URL: &str = "https://api.etherscan.io/v2/api";

/// What to sync, and how to page through it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Chain identifier (e.g. 1284 for Moonbeam).
    pub chain_id: u64,
    /// Token contract whose transfers are ingested.
    pub contract_address: String,
    /// Tracked holder / participant address.
    pub address: String,
    /// Entries requested per page; a full page means more data remains.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Page ordering. Cursor advancement assumes ascending.
    #[serde(default)]
    pub sort: SortOrder,
    /// Retry policy for explorer calls and bulk inserts.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl SyncConfig {
    /// Config with default paging and retry.
    pub fn new(chain_id: u64, contract_address: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            chain_id,
            contract_address: contract_address.into(),
            address: address.into(),
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortOrder::Asc,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reject settings the engine cannot make progress with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(SyncError::Config("page_size must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::Config("retry.max_attempts must be positive".into()));
        }
        if self.contract_address.trim().is_empty() {
            return Err(SyncError::Config("contract_address is empty".into()));
        }
        if self.address.trim().is_empty() {
            return Err(SyncError::Config("address is empty".into()));
        }
        if self.sort != SortOrder::Asc {
            return Err(SyncError::Config(
                "only ascending sort keeps the block cursor monotone".into(),
            ));
        }
        Ok(())
    }

    /// First-page query over `[start_block, end_block]`.
    pub fn page_query(&self, start_block: u64, end_block: u64) -> PageQuery {
        PageQuery {
            chain_id: self.chain_id,
            contract_address: self.contract_address.clone(),
            address: self.address.clone(),
            start_block,
            end_block,
            page: 1,
            page_size: self.page_size,
            sort: self.sort,
        }
    }
}

/// Where the explorer lives and how to authenticate.
#[derive(Clone, Deserialize)]
pub struct ExplorerConfig {
    /// API endpoint.
    #[serde(default = "default_explorer_url")]
    pub base_url: String,
    /// Access credential.
    pub api_key: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_explorer_url() -> String {
    DEFAULT_EXPLORER_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl ExplorerConfig {
    /// Config for the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: default_explorer_url(),
            api_key: api_key.into(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ExplorerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplorerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let cfg: SyncConfig = serde_json::from_value(serde_json::json!({
            "chain_id": 1284,
            "contract_address": "0xcontract",
            "address": "0xholder",
            "retry": { "max_attempts": 5 }
        }))
        .unwrap();
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.sort, SortOrder::Asc);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.initial_delay_ms, RetryPolicy::default().initial_delay_ms);
        cfg.validate().unwrap();
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        let base = SyncConfig::new(1, "0xc", "0xa");
        assert!(base.clone().with_page_size(0).validate().is_err());
        assert!(base.clone().with_retry(RetryPolicy::no_delay(0)).validate().is_err());
        assert!(SyncConfig::new(1, " ", "0xa").validate().is_err());

        let mut desc = base.clone();
        desc.sort = SortOrder::Desc;
        assert!(desc.validate().is_err());
    }

    #[test]
    fn page_query_always_asks_for_first_page() {
        let q = SyncConfig::new(1284, "0xc", "0xa")
            .with_page_size(50)
            .page_query(10, 99);
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, 50);
        assert_eq!((q.start_block, q.end_block), (10, 99));
    }

    #[test]
    fn debug_hides_api_key() {
        let cfg = ExplorerConfig::new("SECRETKEY");
        assert!(!format!("{cfg:?}").contains("SECRETKEY"));
    }
}
