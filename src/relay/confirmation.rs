// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded confirmation polling.
//!
//! Polls a fixed number of times at a fixed interval. Running out of
//! attempts is not an error: the transaction was accepted and may still
//! land, so the caller gets [`Confirmation::Unconfirmed`].

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{WalletError, WalletResult};
use crate::ledger::{LedgerRpc, Signature, SignatureStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_attempts: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed,
    /// Accepted but not seen as confirmed within the polling budget.
    Unconfirmed { attempts: u32 },
}

/// Poll until the signature settles, fails, or the budget runs out.
///
/// An on-chain failure is `SubmissionFailure`. Transport errors while
/// polling only cost an attempt.
pub async fn await_confirmation(
    rpc: &dyn LedgerRpc,
    signature: &Signature,
    policy: &ConfirmationPolicy,
) -> WalletResult<Confirmation> {
    for attempt in 1..=policy.max_attempts {
        match rpc.signature_status(signature).await {
            Ok(Some(status)) if status.is_settled() => {
                debug!(%signature, attempt, "transaction confirmed");
                return Ok(Confirmation::Confirmed);
            }
            Ok(Some(SignatureStatus::Failed(reason))) => {
                warn!(%signature, %reason, "transaction failed on chain");
                return Err(WalletError::SubmissionFailure(format!(
                    "transaction {signature} failed: {reason}"
                )));
            }
            Ok(_) => {}
            Err(e) => warn!(%signature, attempt, error = %e, "status poll failed"),
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    warn!(
        %signature,
        attempts = policy.max_attempts,
        "confirmation budget exhausted; reporting likely success"
    );
    Ok(Confirmation::Unconfirmed {
        attempts: policy.max_attempts,
    })
}
