// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Reconciler
//!
//! Background task that settles pending `UniversalTransaction`s.
//!
//! ## Strategy
//!
//! Every `interval` (default 30 s) the reconciler:
//! 1. Lists the next `batch_size` pending transactions. A cursor carries
//!    over between sweeps and wraps at the end, so records that never settle
//!    cannot starve newer ones.
//! 2. Looks up each one on its chain: signature status on the primary chain,
//!    receipt on the secondary chain.
//! 3. Marks it `confirmed` or `failed` once the chain has a definitive answer.
//!
//! A primary transaction still unseen after `stale_after` can no longer land
//! (its blockhash has expired) and is failed. Secondary transactions stay
//! pending until a receipt appears. Lookup errors leave the record untouched
//! for the next sweep.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::evm::EvmReader;
use crate::ledger::{LedgerRpc, SignatureStatus};
use crate::routing::Chain;
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, FileStorage, PendingCursor,
    TransactionRepository, UniversalTransaction,
};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(600);

/// What the chain says about one pending transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Confirmed,
    Failed(String),
    Pending,
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub confirmed: usize,
    pub failed: usize,
    pub pending: usize,
}

pub struct Reconciler {
    storage: Arc<FileStorage>,
    transactions: Arc<TransactionRepository>,
    primary: Arc<dyn LedgerRpc>,
    secondary: Option<Arc<dyn EvmReader>>,
    interval: Duration,
    batch_size: usize,
    stale_after: Duration,
    cursor: Option<PendingCursor>,
}

impl Reconciler {
    pub fn new(
        storage: Arc<FileStorage>,
        transactions: Arc<TransactionRepository>,
        primary: Arc<dyn LedgerRpc>,
        interval: Duration,
    ) -> Self {
        Self {
            storage,
            transactions,
            primary,
            secondary: None,
            interval,
            batch_size: DEFAULT_BATCH_SIZE,
            stale_after: DEFAULT_STALE_AFTER,
            cursor: None,
        }
    }

    pub fn with_secondary(mut self, reader: Arc<dyn EvmReader>) -> Self {
        self.secondary = Some(reader);
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run until the token is cancelled.
    ///
    /// ```rust,ignore
    /// tokio::spawn(reconciler.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            secondary = self.secondary.is_some(),
            "transaction reconciler starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("transaction reconciler shutting down");
                return;
            }

            let summary = self.sweep().await;
            if summary != SweepSummary::default() {
                info!(
                    confirmed = summary.confirmed,
                    failed = summary.failed,
                    pending = summary.pending,
                    "reconciler sweep finished"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("transaction reconciler shutting down");
                    return;
                }
            }
        }
    }

    /// One batch of pending transactions, continuing where the last sweep
    /// stopped.
    pub async fn sweep(&mut self) -> SweepSummary {
        let pending = match self
            .transactions
            .list_pending_after(self.cursor.as_ref(), self.batch_size)
        {
            Ok((pending, next)) => {
                self.cursor = next;
                pending
            }
            Err(e) => {
                warn!(error = %e, "failed to list pending transactions");
                return SweepSummary::default();
            }
        };

        let mut summary = SweepSummary::default();
        for tx in &pending {
            let settlement = self.check(tx).await;
            match self.apply(tx, &settlement) {
                Ok(()) => match settlement {
                    Settlement::Confirmed => summary.confirmed += 1,
                    Settlement::Failed(_) => summary.failed += 1,
                    Settlement::Pending => summary.pending += 1,
                },
                Err(e) => warn!(tx_id = %tx.id, error = %e, "failed to record settlement"),
            }
        }
        summary
    }

    async fn check(&self, tx: &UniversalTransaction) -> Settlement {
        match tx.chain {
            Chain::Solana => self.check_primary(tx).await,
            Chain::Avalanche => self.check_secondary(tx).await,
        }
    }

    async fn check_primary(&self, tx: &UniversalTransaction) -> Settlement {
        let Some(signature) = tx.primary_signature else {
            return self.settle_if_stale(tx, "never broadcast");
        };

        match self.primary.signature_status(&signature).await {
            Ok(Some(status)) if status.is_settled() => Settlement::Confirmed,
            Ok(Some(SignatureStatus::Failed(reason))) => Settlement::Failed(reason),
            Ok(Some(_)) => Settlement::Pending,
            Ok(None) => self.settle_if_stale(tx, "expired without landing"),
            Err(e) => {
                warn!(tx_id = %tx.id, %signature, error = %e, "signature status lookup failed");
                Settlement::Pending
            }
        }
    }

    async fn check_secondary(&self, tx: &UniversalTransaction) -> Settlement {
        let Some(reader) = &self.secondary else {
            debug!(tx_id = %tx.id, "secondary chain not configured; skipping");
            return Settlement::Pending;
        };
        let Some(tx_hash) = tx.secondary_tx_hash.as_deref() else {
            return Settlement::Pending;
        };

        match reader.receipt(tx_hash).await {
            Ok(Some(receipt)) if receipt.success => Settlement::Confirmed,
            Ok(Some(receipt)) => {
                Settlement::Failed(format!("reverted in block {}", receipt.block_number))
            }
            Ok(None) => Settlement::Pending,
            Err(e) => {
                warn!(tx_id = %tx.id, tx_hash, error = %e, "receipt lookup failed");
                Settlement::Pending
            }
        }
    }

    fn settle_if_stale(&self, tx: &UniversalTransaction, reason: &str) -> Settlement {
        let age = Utc::now().signed_duration_since(tx.created_at);
        if age.to_std().is_ok_and(|age| age >= self.stale_after) {
            Settlement::Failed(reason.to_string())
        } else {
            Settlement::Pending
        }
    }

    fn apply(&self, tx: &UniversalTransaction, settlement: &Settlement) -> Result<(), String> {
        let (event_type, updated) = match settlement {
            Settlement::Pending => return Ok(()),
            Settlement::Confirmed => (
                AuditEventType::TransactionSettled,
                self.transactions.mark_confirmed(&tx.id),
            ),
            Settlement::Failed(reason) => (
                AuditEventType::TransactionFailed,
                self.transactions.mark_failed(&tx.id, reason),
            ),
        };
        let updated = updated.map_err(|e| e.to_string())?;

        info!(tx_id = %tx.id, chain = %tx.chain, status = %updated.status, "transaction settled");
        let mut event = AuditEvent::new(event_type)
            .with_user(&tx.sender_user_id)
            .with_resource("transaction", tx.id.to_string())
            .with_details(serde_json::json!({
                "chain": tx.chain,
                "reference": tx.chain_reference(),
            }));
        if let Settlement::Failed(reason) = settlement {
            event = event.failed(reason.as_str());
        }
        AuditRepository::new(&self.storage).record(event);
        Ok(())
    }
}
