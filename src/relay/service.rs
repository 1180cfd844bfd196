// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fee-sponsoring relay for the primary chain.
//!
//! Every transaction is paid for by the relay account: users never need
//! native currency for fees. The relay fetches a fresh blockhash, signs as
//! fee payer next to whoever authorized the transfer, broadcasts once, then
//! polls for confirmation within a bounded budget. Retrying is left to the
//! caller.
//!
//! Signing and broadcasting are separate steps ([`RelayService::prepare`],
//! [`RelayService::broadcast`]) so a caller can record the signature before
//! anything reaches the network. A broadcast whose response is lost is
//! reported as `SubmissionUnknown`, never as a rejection.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::account::RelayAccount;
use super::confirmation::{await_confirmation, Confirmation, ConfirmationPolicy};
use crate::error::{WalletError, WalletResult};
use crate::ledger::programs::{
    associated_token_address, create_associated_token_account_idempotent, set_compute_unit_limit,
    set_compute_unit_price, system_transfer, token_transfer, token_transfer_checked,
};
use crate::ledger::{Instruction, LedgerError, LedgerRpc, Message, Pubkey, Signature, Signer, Transaction};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub compute_unit_limit: u32,
    /// Priority fee in micro-lamports per compute unit.
    pub compute_unit_price: u64,
    pub confirmation: ConfirmationPolicy,
    /// Below this native balance the relay refuses new work.
    pub min_relay_balance: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            compute_unit_limit: 200_000,
            compute_unit_price: 50_000,
            confirmation: ConfirmationPolicy::default(),
            min_relay_balance: 5_000_000,
        }
    }
}

/// Who vouches for the instructions besides the relay.
pub enum Authorization<'a> {
    /// The user's transiently reconstructed key co-signs.
    Signed(&'a dyn Signer),
    /// The relay acts under a standing on-chain delegation; it is the only signer.
    Delegated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelaySubmission {
    pub signature: Signature,
    pub confirmation: Confirmation,
}

impl RelaySubmission {
    pub fn is_confirmed(&self) -> bool {
        self.confirmation == Confirmation::Confirmed
    }
}

/// A fully signed transaction that has not been broadcast yet.
#[derive(Debug)]
pub struct PreparedTransaction {
    transaction: Transaction,
    relay_balance: u64,
}

impl PreparedTransaction {
    /// The id the chain will know the transaction by.
    pub fn signature(&self) -> Signature {
        self.transaction.signature()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }
}

pub struct RelayService {
    account: Arc<RelayAccount>,
    rpc: Arc<dyn LedgerRpc>,
    config: RelayConfig,
}

impl RelayService {
    pub fn new(account: Arc<RelayAccount>, rpc: Arc<dyn LedgerRpc>, config: RelayConfig) -> Self {
        Self {
            account,
            rpc,
            config,
        }
    }

    /// Address that pays fees and receives token delegations.
    pub fn address(&self) -> Pubkey {
        self.account.address()
    }

    pub fn rpc(&self) -> &dyn LedgerRpc {
        self.rpc.as_ref()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Current relay balance, failing when below the configured floor.
    pub async fn ensure_funded(&self) -> WalletResult<u64> {
        let relay = self.address();
        let balance = self
            .rpc
            .native_balance(&relay)
            .await
            .map_err(|e| relay_unavailable("balance check", e))?;

        if balance < self.config.min_relay_balance {
            error!(
                alert = true,
                %relay,
                balance,
                required = self.config.min_relay_balance,
                "relay account underfunded"
            );
            return Err(WalletError::RelayUnderfunded {
                balance,
                required: self.config.min_relay_balance,
            });
        }
        Ok(balance)
    }

    /// Pay for, co-sign and broadcast already-authorized instructions.
    pub async fn submit(
        &self,
        instructions: &[Instruction],
        authorization: Authorization<'_>,
    ) -> WalletResult<RelaySubmission> {
        let prepared = self.prepare(instructions, authorization).await?;
        self.broadcast(&prepared).await
    }

    /// Check funding, fetch a fresh blockhash and sign as fee payer.
    pub async fn prepare(
        &self,
        instructions: &[Instruction],
        authorization: Authorization<'_>,
    ) -> WalletResult<PreparedTransaction> {
        let relay_balance = self.ensure_funded().await?;

        let blockhash = self
            .rpc
            .latest_blockhash()
            .await
            .map_err(|e| relay_unavailable("blockhash fetch", e))?;

        let payer = self.address();
        let message = Message::compile(instructions, &payer, blockhash)
            .map_err(|e| WalletError::InvalidInput(format!("cannot build transaction: {e}")))?;
        let mut transaction = Transaction::new_unsigned(message);

        let relay: &dyn Signer = self.account.as_ref();
        let signers: Vec<&dyn Signer> = match authorization {
            Authorization::Signed(user) => vec![relay, user],
            Authorization::Delegated => vec![relay],
        };
        transaction
            .partial_sign(&signers)
            .map_err(|e| WalletError::InvalidInput(e.to_string()))?;
        if !transaction.is_fully_signed() {
            return Err(WalletError::InvalidInput(
                "transaction requires a signature that was not provided".into(),
            ));
        }

        Ok(PreparedTransaction {
            transaction,
            relay_balance,
        })
    }

    /// Send once and wait for confirmation within the polling budget.
    pub async fn broadcast(&self, prepared: &PreparedTransaction) -> WalletResult<RelaySubmission> {
        let signature = self
            .rpc
            .send_transaction(&prepared.transaction)
            .await
            .map_err(|e| self.broadcast_error(e, prepared))?;
        info!(%signature, fee_payer = %self.address(), "transaction broadcast");

        let confirmation =
            await_confirmation(self.rpc.as_ref(), &signature, &self.config.confirmation).await?;
        Ok(RelaySubmission {
            signature,
            confirmation,
        })
    }

    /// Native transfer with a compute budget for predictable landing.
    pub async fn send_native(
        &self,
        from: &dyn Signer,
        to: &Pubkey,
        lamports: u64,
    ) -> WalletResult<RelaySubmission> {
        let prepared = self.prepare_native(from, to, lamports).await?;
        self.broadcast(&prepared).await
    }

    /// Balance-checked, signed native transfer ready for [`Self::broadcast`].
    pub async fn prepare_native(
        &self,
        from: &dyn Signer,
        to: &Pubkey,
        lamports: u64,
    ) -> WalletResult<PreparedTransaction> {
        let sender = from.pubkey();
        let available = self
            .rpc
            .native_balance(&sender)
            .await
            .map_err(|e| relay_unavailable("sender balance check", e))?;
        if available < lamports {
            return Err(WalletError::InsufficientBalance {
                required: lamports.into(),
                available: available.into(),
            });
        }

        let instructions = [
            set_compute_unit_limit(self.config.compute_unit_limit),
            set_compute_unit_price(self.config.compute_unit_price),
            system_transfer(&sender, to, lamports),
        ];
        self.prepare(&instructions, Authorization::Signed(from)).await
    }

    /// Token transfer between owners' associated token accounts.
    ///
    /// A missing recipient account is created by the relay in the same
    /// transaction. With `decimals` the transfer is checked against the mint.
    pub async fn send_token(
        &self,
        from: &dyn Signer,
        mint: &Pubkey,
        recipient_owner: &Pubkey,
        amount: u64,
        decimals: Option<u8>,
    ) -> WalletResult<RelaySubmission> {
        let prepared = self
            .prepare_token(from, mint, recipient_owner, amount, decimals)
            .await?;
        self.broadcast(&prepared).await
    }

    /// Balance-checked, signed token transfer ready for [`Self::broadcast`].
    pub async fn prepare_token(
        &self,
        from: &dyn Signer,
        mint: &Pubkey,
        recipient_owner: &Pubkey,
        amount: u64,
        decimals: Option<u8>,
    ) -> WalletResult<PreparedTransaction> {
        let sender = from.pubkey();
        let source = associated_token_address(&sender, mint)
            .map_err(|e| WalletError::InvalidInput(e.to_string()))?;
        let available = self
            .rpc
            .token_balance(&source)
            .await
            .map_err(|e| relay_unavailable("sender balance check", e))?;
        if available < amount {
            return Err(WalletError::InsufficientBalance {
                required: amount.into(),
                available: available.into(),
            });
        }

        let (destination, mut instructions) =
            self.recipient_token_account(recipient_owner, mint).await?;
        instructions.push(match decimals {
            Some(decimals) => {
                token_transfer_checked(&source, mint, &destination, &sender, amount, decimals)
            }
            None => token_transfer(&source, &destination, &sender, amount),
        });
        self.prepare(&instructions, Authorization::Signed(from)).await
    }

    /// The owner's token account, plus a relay-paid creation instruction
    /// when it does not exist yet.
    pub async fn recipient_token_account(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> WalletResult<(Pubkey, Vec<Instruction>)> {
        let address = associated_token_address(owner, mint)
            .map_err(|e| WalletError::InvalidInput(e.to_string()))?;
        let exists = self
            .rpc
            .account_exists(&address)
            .await
            .map_err(|e| relay_unavailable("recipient account lookup", e))?;

        if exists {
            return Ok((address, Vec::new()));
        }
        info!(%owner, %mint, account = %address, "creating recipient token account");
        let create = create_associated_token_account_idempotent(&self.address(), owner, mint)
            .map_err(|e| WalletError::InvalidInput(e.to_string()))?;
        Ok((address, vec![create]))
    }

    fn broadcast_error(&self, err: LedgerError, prepared: &PreparedTransaction) -> WalletError {
        let message = err.to_string();
        let signature = prepared.signature();
        if err.is_transport() {
            error!(alert = true, %signature, error = %message, "broadcast outcome unknown");
            return WalletError::SubmissionUnknown {
                signature: Some(signature),
                reason: message,
            };
        }
        if message.contains("insufficient funds for fee") {
            error!(alert = true, relay = %self.address(), error = %message, "relay could not pay fee");
            return WalletError::RelayUnderfunded {
                balance: prepared.relay_balance,
                required: self.config.min_relay_balance,
            };
        }
        warn!(%signature, error = %message, "transaction rejected");
        WalletError::SubmissionFailure(message)
    }
}

pub(crate) fn relay_unavailable(stage: &str, err: LedgerError) -> WalletError {
    error!(alert = true, stage, error = %err, "relay RPC unavailable");
    WalletError::RelayUnavailable(format!("{stage}: {err}"))
}
