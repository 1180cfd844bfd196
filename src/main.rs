// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use relational_custody::config::Config;
use relational_custody::evm::{EvmClient, EvmReader};
use relational_custody::ledger::{JsonRpcClient, LedgerRpc};
use relational_custody::logging::init_logging;
use relational_custody::reconciler::Reconciler;
use relational_custody::relay::{RelayAccount, RelayConfig, RelayService};
use relational_custody::storage::{FileStorage, StoragePaths, TransactionRepository, TxCache};

const HISTORY_CACHE_CAPACITY: usize = 1_024;
const HISTORY_CACHE_TTL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(config.log_format) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "reconciler failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = FileStorage::new(StoragePaths::new(&config.data_dir));
    storage.initialize()?;
    let storage = Arc::new(storage);

    let primary: Arc<dyn LedgerRpc> =
        Arc::new(JsonRpcClient::new(&config.primary_rpc_url, config.rpc_timeout)?);

    let relay_account = RelayAccount::load_or_bootstrap(
        &storage,
        config.relay_secret_key.as_ref().map(|s| s.as_str()),
    )?;
    let relay = RelayService::new(Arc::new(relay_account), primary.clone(), RelayConfig::default());
    match relay.ensure_funded().await {
        Ok(balance) => info!(relay = %relay.address(), balance, "relay account funded"),
        Err(e) => warn!(relay = %relay.address(), error = %e, "relay account needs attention"),
    }

    let transactions = Arc::new(TransactionRepository::open(
        &storage.paths().transactions_db(),
        TxCache::new(HISTORY_CACHE_CAPACITY, HISTORY_CACHE_TTL),
    )?);

    let mut reconciler = Reconciler::new(
        storage.clone(),
        transactions,
        primary,
        config.reconcile_interval,
    );
    if let Some(evm) = &config.evm {
        let client = EvmClient::new(evm.network.clone(), evm.rpc_url.as_deref())?;
        info!(chain_id = client.chain_id(), network = client.network().name, "secondary chain enabled");
        reconciler = reconciler.with_secondary(Arc::new(client));
    }

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(reconciler.run(shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    shutdown.cancel();
    task.await?;
    Ok(())
}
