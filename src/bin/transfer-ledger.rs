//! One sync invocation. Scheduling is left to cron / systemd timers.
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use transfer_ledger::{
    config::{DEFAULT_EXPLORER_URL, DEFAULT_PAGE_SIZE},
    prelude::*,
    SyncOutcome,
};

#[derive(Parser, Debug)]
#[command(version, about = "Sync explorer token transfers into a local SQLite ledger")]
struct Args {
    /// SQLite ledger file.
    #[arg(long, env = "LEDGER_DB_PATH", default_value = "ledger.db")]
    db_path: PathBuf,

    /// Chain identifier (Moonbeam by default).
    #[arg(long, env = "CHAIN_ID", default_value_t = 1284)]
    chain_id: u64,

    /// Token contract whose transfers are ingested.
    #[arg(long, env = "TOKEN_CONTRACT")]
    contract: String,

    /// Tracked holder / participant address.
    #[arg(long, env = "TRACKED_ADDRESS")]
    address: String,

    /// Explorer API key.
    #[arg(long, env = "EXPLORER_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Explorer endpoint.
    #[arg(long, env = "EXPLORER_URL", default_value = DEFAULT_EXPLORER_URL)]
    explorer_url: String,

    /// Entries per explorer page.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Attempts per explorer call / bulk insert.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let retry = RetryPolicy {
        max_attempts: args.max_attempts,
        ..RetryPolicy::default()
    };
    let config = SyncConfig::new(args.chain_id, args.contract, args.address)
        .with_page_size(args.page_size)
        .with_retry(retry);
    config.validate()?;

    let explorer = EtherscanClient::new(&ExplorerConfig {
        base_url: args.explorer_url,
        api_key: args.api_key,
        timeout_secs: args.timeout_secs,
    })?;
    let store = SqliteLedger::new(&args.db_path)
        .with_context(|| format!("open ledger {}", args.db_path.display()))?;

    let summary = TransferSync::new(store, explorer, config).run().await;

    let outcome = match &summary.outcome {
        SyncOutcome::Done => "done".to_string(),
        SyncOutcome::Aborted { reason } => format!("aborted: {reason}"),
    };
    info!(
        start_block = summary.start_block,
        end_block = ?summary.end_block,
        total_fetched = summary.total_fetched,
        total_inserted = summary.total_inserted,
        %outcome,
        "run finished"
    );

    Ok(())
}
