//! Etherscan-style HTTP explorer client (`module=account&action=tokentx` and
//! `module=proxy&action=eth_blockNumber`).
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{
    config::ExplorerConfig,
    error::{Result, SyncError},
    explorer::{parse_hex_height, ExplorerSource, PageQuery, TransferPage},
};

/// Stateless explorer client; one outbound request per call.
#[derive(Clone)]
pub struct EtherscanClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    result: Value,
}

impl EtherscanClient {
    /// Build a client from its config.
    pub fn new(config: &ExplorerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| SyncError::Config(format!("explorer url {:?}: {e}", config.base_url)))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, params: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("apikey", &self.api_key);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!(url = %redact(&url), "explorer request");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Upstream {
                status: Some(status.as_u16()),
                message: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown status")
                ),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SyncError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ExplorerSource for EtherscanClient {
    #[tracing::instrument(level = "debug", skip(self), fields(start = query.start_block, end = query.end_block))]
    async fn fetch_transfer_page(&self, query: &PageQuery) -> Result<TransferPage> {
        let url = self.url(&[
            ("chainid", query.chain_id.to_string()),
            ("module", "account".into()),
            ("action", "tokentx".into()),
            ("contractaddress", query.contract_address.clone()),
            ("address", query.address.clone()),
            ("page", query.page.to_string()),
            ("offset", query.page_size.to_string()),
            ("startblock", query.start_block.to_string()),
            ("endblock", query.end_block.to_string()),
            ("sort", query.sort.as_str().into()),
        ]);
        self.get_json(url).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch_current_block_height(&self, chain_id: u64) -> Result<u64> {
        let url = self.url(&[
            ("chainid", chain_id.to_string()),
            ("module", "proxy".into()),
            ("action", "eth_blockNumber".into()),
        ]);
        let response: ProxyResponse = self.get_json(url).await?;
        match response.result {
            Value::String(hex) => parse_hex_height(&hex),
            other => Err(SyncError::MalformedResponse(format!(
                "eth_blockNumber result: {other}"
            ))),
        }
    }
}

/// URL for logs, with the credential blanked out.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "apikey" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}
