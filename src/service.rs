// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Custody Service
//!
//! The entry point collaborators call. It ties custody, relay, delegation,
//! routing and the secondary chain together:
//!
//! | Operation | Result |
//! |-----------|--------|
//! | [`CustodyService::create_wallet`] | public address plus backup and recovery shares |
//! | [`CustodyService::transfer`] | a `UniversalTransaction` on the routed chain |
//! | [`CustodyService::create_link`] | approval signature and one-time code |
//! | [`CustodyService::claim_link`] | claim signature and transaction record |
//! | [`CustodyService::route_check`] | `{chain, possible, reason}` |
//!
//! Signing keys are reconstructed per call and dropped before the call
//! returns. Every reconstruction attempt is audited.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::custody::shares::encode_share;
use crate::custody::{
    provision_wallet, rotate_passcode, Credentials, Passcode, ProvisionedWallet, ReconstructedKey,
    Reconstructor,
};
use crate::delegation::{ApprovedLink, ClaimedLink, LinkRequest, OtpHasher, PaymentLinks};
use crate::error::{WalletError, WalletResult};
use crate::evm::{parse_address, transfer_call, EvmAsset, EvmError, EvmReader, SponsoredRelay};
use crate::ledger::{Pubkey, Signature};
use crate::relay::{RelayService, RelaySubmission};
use crate::routing::{determine_route, require_route, token_route, Chain, RouteDecision, WalletCapability};
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, FileStorage, LinkRepository, PaymentLink,
    StorageError, TransactionRepository, TxDbError, UniversalTransaction, WalletRecord,
    WalletRepository,
};
use crate::units::{format_units, parse_positive_u64, parse_units};

/// Lamports per SOL, as decimals.
pub const NATIVE_DECIMALS: u8 = 9;
pub const USDC_DECIMALS: u8 = 6;

/// What a primary-chain transfer moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAsset {
    Native,
    Token { mint: Pubkey, decimals: u8 },
}

impl PrimaryAsset {
    pub fn decimals(&self) -> u8 {
        match self {
            Self::Native => NATIVE_DECIMALS,
            Self::Token { decimals, .. } => *decimals,
        }
    }
}

/// Where a transfer goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Another user; their wallet on the routed chain receives.
    User(String),
    /// An external primary-chain owner address.
    PrimaryAddress(Pubkey),
    /// An external secondary-chain address.
    SecondaryAddress(Address),
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender_user_id: String,
    pub wallet_id: String,
    pub recipient: Recipient,
    pub token_symbol: String,
    /// Decimal amount as entered, e.g. `"12.5"`.
    pub amount: String,
}

/// A freshly created or rotated wallet.
///
/// The record keeps the backup share sealed, so the passcode alone signs.
/// The backup and recovery shares are shown to the user once; together
/// they rebuild the key without the passcode.
pub struct IssuedWallet {
    pub record: WalletRecord,
    pub backup_share: Zeroizing<String>,
    pub recovery_share: Zeroizing<String>,
}

impl std::fmt::Debug for IssuedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedWallet")
            .field("wallet_id", &self.record.wallet_id)
            .field("public_address", &self.record.public_address)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub transaction: UniversalTransaction,
    /// Set for primary-chain transfers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<RelaySubmission>,
}

/// The sponsored secondary chain, when configured.
#[derive(Clone)]
pub struct SecondaryChain {
    pub sponsor: Arc<dyn SponsoredRelay>,
    pub reader: Arc<dyn EvmReader>,
}

pub struct CustodyService {
    storage: FileStorage,
    relay: RelayService,
    otp: OtpHasher,
    transactions: Arc<TransactionRepository>,
    usdc_mint: Pubkey,
    secondary: Option<SecondaryChain>,
}

impl CustodyService {
    pub fn new(
        storage: FileStorage,
        relay: RelayService,
        otp: OtpHasher,
        transactions: Arc<TransactionRepository>,
        usdc_mint: Pubkey,
    ) -> Self {
        Self {
            storage,
            relay,
            otp,
            transactions,
            usdc_mint,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: SecondaryChain) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    pub fn relay(&self) -> &RelayService {
        &self.relay
    }

    pub fn transactions(&self) -> &TransactionRepository {
        &self.transactions
    }

    // =========================================================================
    // Wallets
    // =========================================================================

    /// Split a new key around `passcode` and persist the sealed server share.
    pub fn create_wallet(&self, owner_user_id: &str, passcode: &Passcode) -> WalletResult<IssuedWallet> {
        let provisioned = provision_wallet(passcode)?;
        let wallet_id = Uuid::new_v4().to_string();
        let record = WalletRecord::from_provisioned(&wallet_id, owner_user_id, &provisioned);
        WalletRepository::new(&self.storage).create(&record)?;

        info!(wallet_id = %wallet_id, user_id = owner_user_id, address = %record.public_address, "wallet created");
        self.audit().record(
            AuditEvent::new(AuditEventType::WalletCreated)
                .with_user(owner_user_id)
                .with_resource("wallet", &wallet_id)
                .with_details(serde_json::json!({ "address": record.public_address.to_string() })),
        );
        Ok(issued(record, &provisioned))
    }

    /// Re-split the wallet's key under `new_passcode`.
    ///
    /// Old passcode, backup and recovery shares stop working; the caller
    /// must hand the returned shares to the user.
    pub fn rotate_passcode(
        &self,
        user_id: &str,
        wallet_id: &str,
        current: &Credentials,
        new_passcode: &Passcode,
    ) -> WalletResult<IssuedWallet> {
        let record = self.active_wallet(user_id, wallet_id)?;
        let rotated = match rotate_passcode(&record.secrets(), current, new_passcode) {
            Ok(rotated) => rotated,
            Err(err) => {
                self.audit_reconstruction_failure(&record, &err.to_string());
                return Err(err.into());
            }
        };
        let record = WalletRepository::new(&self.storage).apply_rotation(wallet_id, &rotated)?;

        info!(wallet_id, user_id, "passcode rotated");
        self.audit().record(
            AuditEvent::new(AuditEventType::PasscodeRotated)
                .with_user(user_id)
                .with_resource("wallet", wallet_id),
        );
        Ok(issued(record, &rotated))
    }

    /// Ask the sponsor for the user's secondary-chain wallet and record it.
    pub async fn provision_secondary_wallet(
        &self,
        user_id: &str,
        wallet_id: &str,
    ) -> WalletResult<WalletRecord> {
        let secondary = self.secondary()?;
        let record = self.active_wallet(user_id, wallet_id)?;
        if record.evm_address.is_some() {
            return Ok(record);
        }

        let address = secondary.sponsor.provision_wallet(user_id).await?;
        let record = WalletRepository::new(&self.storage)
            .set_evm_address(wallet_id, &address.to_checksum(None))?;

        self.audit().record(
            AuditEvent::new(AuditEventType::SecondaryWalletProvisioned)
                .with_user(user_id)
                .with_resource("wallet", wallet_id)
                .with_details(serde_json::json!({ "address": address.to_checksum(None) })),
        );
        Ok(record)
    }

    // =========================================================================
    // Routing and transfers
    // =========================================================================

    /// Routing decision between two users, from their current wallets.
    pub fn route_check(
        &self,
        token_symbol: &str,
        sender_user_id: &str,
        recipient_user_id: &str,
    ) -> WalletResult<RouteDecision> {
        let wallets = WalletRepository::new(&self.storage);
        let sender = wallets.capability_for_user(sender_user_id)?;
        let recipient = wallets.capability_for_user(recipient_user_id)?;
        Ok(determine_route(token_symbol, &sender, &recipient))
    }

    /// Route, authorize and execute a transfer, recording it as a
    /// `UniversalTransaction`.
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        credentials: &Credentials,
    ) -> WalletResult<TransferOutcome> {
        let sender = self.active_wallet(&request.sender_user_id, &request.wallet_id)?;
        let recipient_capability = self.recipient_capability(&request.recipient)?;
        let chain = require_route(&request.token_symbol, &sender.capability(), &recipient_capability)?;
        let symbol = token_route(&request.token_symbol)
            .map(|route| route.symbol)
            .ok_or_else(|| WalletError::InvalidInput(format!("unsupported token {}", request.token_symbol)))?;

        match chain {
            Chain::Solana => self.transfer_primary(request, &sender, symbol, credentials).await,
            Chain::Avalanche => self.transfer_secondary(request, &sender, symbol, credentials).await,
        }
    }

    async fn transfer_primary(
        &self,
        request: &TransferRequest,
        sender: &WalletRecord,
        symbol: &'static str,
        credentials: &Credentials,
    ) -> WalletResult<TransferOutcome> {
        let asset = self.primary_asset(symbol)?;
        let amount = parse_positive_u64(&request.amount, asset.decimals())?;
        let (recipient_user_id, recipient) = match &request.recipient {
            Recipient::User(user_id) => {
                let wallet = self.recipient_wallet(user_id, Chain::Solana)?;
                (Some(user_id.as_str()), wallet.public_address)
            }
            Recipient::PrimaryAddress(address) => (None, *address),
            Recipient::SecondaryAddress(_) => {
                return Err(WalletError::InvalidInput(
                    "secondary-chain address on a primary-chain route".into(),
                ))
            }
        };

        let secrets = sender.secrets();
        let mut reconstructor = Reconstructor::new(&secrets);
        let key = self.reconstruct(&mut reconstructor, sender, credentials)?;

        let tx = UniversalTransaction::new_pending(
            &request.sender_user_id,
            recipient_user_id,
            sender.public_address.to_string(),
            recipient.to_string(),
            format_units(amount.into(), asset.decimals()),
            symbol,
            Chain::Solana,
        );
        self.transactions.create(&tx)?;

        let prepared = match asset {
            PrimaryAsset::Native => self.relay.prepare_native(&key, &recipient, amount).await,
            PrimaryAsset::Token { mint, decimals } => {
                self.relay
                    .prepare_token(&key, &mint, &recipient, amount, Some(decimals))
                    .await
            }
        };
        drop(key);
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.record_failure(&tx, &err);
                return Err(err);
            }
        };

        // Recorded before broadcast so a lost response still leaves a
        // signature for the reconciler to look up.
        self.transactions.attach_signature(&tx.id, prepared.signature())?;

        let submission = match self.relay.broadcast(&prepared).await {
            Ok(submission) => submission,
            Err(err) => {
                self.record_submission_error(&tx, &err);
                return Err(err);
            }
        };
        let transaction = self.record_primary_submission(&tx, &submission)?;
        Ok(TransferOutcome {
            transaction,
            submission: Some(submission),
        })
    }

    async fn transfer_secondary(
        &self,
        request: &TransferRequest,
        sender: &WalletRecord,
        symbol: &'static str,
        credentials: &Credentials,
    ) -> WalletResult<TransferOutcome> {
        let secondary = self.secondary()?;
        let asset = EvmAsset::from_symbol(symbol)
            .ok_or_else(|| WalletError::InvalidInput(format!("{symbol} is not a secondary-chain token")))?;
        let amount = parse_units(&request.amount, asset.decimals())?;
        if amount == 0 {
            return Err(WalletError::InvalidInput("amount must be greater than zero".into()));
        }

        let from = sender
            .evm_address
            .as_deref()
            .ok_or_else(|| WalletError::RouteUnavailable {
                reason: "Sender has no Avalanche wallet".into(),
            })
            .and_then(|raw| parse_address(raw).map_err(WalletError::from))?;
        let (recipient_user_id, recipient) = match &request.recipient {
            Recipient::User(user_id) => {
                let wallet = self.recipient_wallet(user_id, Chain::Avalanche)?;
                let raw = wallet.evm_address.as_deref().unwrap_or_default();
                (Some(user_id.as_str()), parse_address(raw)?)
            }
            Recipient::SecondaryAddress(address) => (None, *address),
            Recipient::PrimaryAddress(_) => {
                return Err(WalletError::InvalidInput(
                    "primary-chain address on a secondary-chain route".into(),
                ))
            }
        };

        // The sponsor holds the EVM key; the passcode still authorizes the send.
        {
            let secrets = sender.secrets();
            let mut reconstructor = Reconstructor::new(&secrets);
            self.reconstruct(&mut reconstructor, sender, credentials)?;
        }

        let required = U256::from(amount);
        let available = secondary.reader.balance(&from, asset).await?;
        if available < required {
            return Err(WalletError::InsufficientBalance {
                required: amount,
                available: u128::try_from(available).unwrap_or(u128::MAX),
            });
        }

        let chain_id = secondary.reader.chain_id();
        let call = transfer_call(asset, chain_id, &recipient, required)?;
        let tx = UniversalTransaction::new_pending(
            &request.sender_user_id,
            recipient_user_id,
            from.to_checksum(None),
            recipient.to_checksum(None),
            format_units(amount, asset.decimals()),
            symbol,
            Chain::Avalanche,
        );
        self.transactions.create(&tx)?;

        let tx_hash = match secondary
            .sponsor
            .execute(chain_id, &from, &call, &tx.id.to_string())
            .await
        {
            Ok(hash) => hash,
            Err(EvmError::Rejected(reason)) => {
                let err = WalletError::SubmissionFailure(reason);
                self.record_failure(&tx, &err);
                return Err(err);
            }
            Err(other) => {
                // The sponsor may have executed the call; the record stays
                // pending under its idempotency key.
                let err = WalletError::SubmissionUnknown {
                    signature: None,
                    reason: other.to_string(),
                };
                self.record_submission_error(&tx, &err);
                return Err(err);
            }
        };
        let transaction = self.transactions.attach_tx_hash(&tx.id, &tx_hash)?;

        info!(tx_id = %tx.id, %tx_hash, chain_id, "sponsored transfer submitted");
        self.audit().record(
            AuditEvent::new(AuditEventType::TransactionRelayed)
                .with_user(&request.sender_user_id)
                .with_resource("transaction", tx.id.to_string())
                .with_details(serde_json::json!({ "chain": Chain::Avalanche, "tx_hash": tx_hash })),
        );
        Ok(TransferOutcome {
            transaction,
            submission: None,
        })
    }

    // =========================================================================
    // Payment links
    // =========================================================================

    /// Approve a delegation to the relay and issue the link's one-time code.
    pub async fn create_link(
        &self,
        user_id: &str,
        wallet_id: &str,
        credentials: &Credentials,
        token_symbol: &str,
        amount: &str,
        expires_at: DateTime<Utc>,
    ) -> WalletResult<ApprovedLink> {
        let record = self.active_wallet(user_id, wallet_id)?;
        let symbol = token_route(token_symbol)
            .map(|route| route.symbol)
            .ok_or_else(|| WalletError::InvalidInput(format!("unsupported token {token_symbol}")))?;
        let PrimaryAsset::Token { mint, decimals } = self.primary_asset(symbol)? else {
            return Err(WalletError::InvalidInput(
                "payment links carry tokens, not native currency".into(),
            ));
        };
        let amount = parse_positive_u64(amount, decimals)?;

        let secrets = record.secrets();
        let mut reconstructor = Reconstructor::new(&secrets);
        let key = self.reconstruct(&mut reconstructor, &record, credentials)?;

        let request = LinkRequest {
            creator_user_id: user_id.to_string(),
            creator_wallet_id: wallet_id.to_string(),
            mint,
            token_symbol: symbol.to_string(),
            amount,
            decimals: Some(decimals),
            expires_at,
        };
        self.links().approve_link(&key, request).await
    }

    /// Claim a link for `recipient_owner` and record the transfer.
    pub async fn claim_link(
        &self,
        link_id: &str,
        one_time_code: &str,
        recipient_owner: &Pubkey,
        recipient_user_id: Option<&str>,
    ) -> WalletResult<ClaimedLink> {
        let mut claimed = match self
            .links()
            .claim_link(link_id, one_time_code, recipient_owner)
            .await
        {
            Ok(claimed) => claimed,
            Err(WalletError::SubmissionUnknown {
                signature: Some(signature),
                reason,
            }) => {
                self.record_unknown_claim(link_id, recipient_owner, recipient_user_id, signature);
                return Err(WalletError::SubmissionUnknown {
                    signature: Some(signature),
                    reason,
                });
            }
            Err(err) => return Err(err),
        };

        let link = &claimed.link;
        let decimals = link.decimals.unwrap_or(USDC_DECIMALS);
        let tx = UniversalTransaction::new_pending(
            &link.creator_user_id,
            recipient_user_id,
            link.owner.to_string(),
            recipient_owner.to_string(),
            format_units(link.amount.into(), decimals),
            &link.token_symbol,
            Chain::Solana,
        )
        .with_payment_link(&link.link_id);
        self.transactions.create(&tx)?;
        self.record_primary_submission(&tx, &claimed.submission)?;

        claimed.link.transaction_id = Some(tx.id);
        LinkRepository::new(&self.storage).update(&claimed.link)?;
        Ok(claimed)
    }

    /// Revoke an active link's delegation. The creator re-authorizes.
    pub async fn cancel_link(
        &self,
        user_id: &str,
        wallet_id: &str,
        credentials: &Credentials,
        link_id: &str,
    ) -> WalletResult<PaymentLink> {
        let record = self.active_wallet(user_id, wallet_id)?;
        let secrets = record.secrets();
        let mut reconstructor = Reconstructor::new(&secrets);
        let key = self.reconstruct(&mut reconstructor, &record, credentials)?;
        self.links().cancel_link(&key, user_id, link_id).await
    }

    pub fn list_links(&self, user_id: &str) -> WalletResult<Vec<PaymentLink>> {
        Ok(LinkRepository::new(&self.storage).list_by_creator(user_id)?)
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Newest-first history page and the cursor for the next one.
    pub fn transaction_history(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> WalletResult<(Vec<UniversalTransaction>, Option<String>)> {
        Ok(self.transactions.list_for_user(user_id, cursor, limit)?)
    }

    /// A transaction the user sent or received.
    pub fn transaction(&self, user_id: &str, id: &Uuid) -> WalletResult<UniversalTransaction> {
        let tx = self.transactions.get(id).map_err(|err| match err {
            TxDbError::NotFound(what) => WalletError::NotFound(what),
            other => other.into(),
        })?;
        if tx.sender_user_id != user_id && tx.recipient_user_id.as_deref() != Some(user_id) {
            return Err(WalletError::NotFound(format!("Transaction {id}")));
        }
        Ok(tx)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn reconstruct<'r>(
        &self,
        reconstructor: &'r mut Reconstructor<'_>,
        record: &WalletRecord,
        credentials: &Credentials,
    ) -> WalletResult<ReconstructedKey<'r>> {
        match reconstructor.reconstruct(credentials) {
            Ok(key) => {
                self.audit().record(
                    AuditEvent::new(AuditEventType::KeyReconstructed)
                        .with_user(&record.owner_user_id)
                        .with_resource("wallet", &record.wallet_id),
                );
                Ok(key)
            }
            Err(err) => {
                self.audit_reconstruction_failure(record, &err.to_string());
                Err(err.into())
            }
        }
    }

    fn audit_reconstruction_failure(&self, record: &WalletRecord, reason: &str) {
        warn!(wallet_id = %record.wallet_id, reason, "key reconstruction refused");
        self.audit().record(
            AuditEvent::new(AuditEventType::KeyReconstructionFailed)
                .with_user(&record.owner_user_id)
                .with_resource("wallet", &record.wallet_id)
                .failed(reason),
        );
    }

    fn record_primary_submission(
        &self,
        tx: &UniversalTransaction,
        submission: &RelaySubmission,
    ) -> WalletResult<UniversalTransaction> {
        let mut updated = self.transactions.attach_signature(&tx.id, submission.signature)?;
        if submission.is_confirmed() {
            updated = self.transactions.mark_confirmed(&tx.id)?;
        }

        self.audit().record(
            AuditEvent::new(AuditEventType::TransactionRelayed)
                .with_user(&tx.sender_user_id)
                .with_resource("transaction", tx.id.to_string())
                .with_details(serde_json::json!({
                    "chain": Chain::Solana,
                    "signature": submission.signature.to_string(),
                    "confirmation": submission.confirmation,
                })),
        );
        Ok(updated)
    }

    /// A claim broadcast whose outcome is unknown still gets a pending
    /// record so the reconciler can settle it.
    fn record_unknown_claim(
        &self,
        link_id: &str,
        recipient_owner: &Pubkey,
        recipient_user_id: Option<&str>,
        signature: Signature,
    ) {
        let result = LinkRepository::new(&self.storage)
            .get(link_id)
            .map_err(WalletError::from)
            .and_then(|mut link| {
                let tx = UniversalTransaction::new_pending(
                    &link.creator_user_id,
                    recipient_user_id,
                    link.owner.to_string(),
                    recipient_owner.to_string(),
                    format_units(link.amount.into(), link.decimals.unwrap_or(USDC_DECIMALS)),
                    &link.token_symbol,
                    Chain::Solana,
                )
                .with_payment_link(link_id);
                self.transactions.create(&tx)?;
                self.transactions.attach_signature(&tx.id, signature)?;
                link.transaction_id = Some(tx.id);
                LinkRepository::new(&self.storage).update(&link)?;
                Ok(tx)
            });
        match result {
            Ok(tx) => warn!(link_id, tx_id = %tx.id, %signature, "link claim outcome unknown; left pending"),
            Err(e) => warn!(link_id, %signature, error = %e, "failed to record link claim"),
        }
    }

    /// Definitive failures end the record; an unknown outcome leaves it
    /// pending for the reconciler.
    fn record_submission_error(&self, tx: &UniversalTransaction, err: &WalletError) {
        if !matches!(err, WalletError::SubmissionUnknown { .. }) {
            self.record_failure(tx, err);
            return;
        }
        warn!(tx_id = %tx.id, error = %err, "submission outcome unknown; left pending");
        self.audit().record(
            AuditEvent::new(AuditEventType::TransactionRelayed)
                .with_user(&tx.sender_user_id)
                .with_resource("transaction", tx.id.to_string())
                .with_details(serde_json::json!({
                    "chain": tx.chain,
                    "confirmation": "unknown",
                }))
                .failed(err.to_string()),
        );
    }

    fn record_failure(&self, tx: &UniversalTransaction, err: &WalletError) {
        if let Err(e) = self.transactions.mark_failed(&tx.id, &err.to_string()) {
            warn!(tx_id = %tx.id, error = %e, "failed to mark transaction failed");
        }
        self.audit().record(
            AuditEvent::new(AuditEventType::TransactionFailed)
                .with_user(&tx.sender_user_id)
                .with_resource("transaction", tx.id.to_string())
                .failed(err.to_string()),
        );
    }

    fn active_wallet(&self, user_id: &str, wallet_id: &str) -> WalletResult<WalletRecord> {
        let record = WalletRepository::new(&self.storage)
            .verify_ownership(wallet_id, user_id)
            .map_err(|err| match err {
                StorageError::NotFound(what) => WalletError::NotFound(what),
                other => other.into(),
            })?;
        if !record.is_active() {
            return Err(WalletError::InvalidInput(format!("wallet {wallet_id} is suspended")));
        }
        Ok(record)
    }

    /// The recipient user's oldest active wallet usable on `chain`.
    fn recipient_wallet(&self, user_id: &str, chain: Chain) -> WalletResult<WalletRecord> {
        WalletRepository::new(&self.storage)
            .list_by_owner(user_id)?
            .into_iter()
            .find(|record| record.capability().supports(chain))
            .ok_or_else(|| WalletError::RouteUnavailable {
                reason: format!("Recipient has no {chain} wallet"),
            })
    }

    fn recipient_capability(&self, recipient: &Recipient) -> WalletResult<WalletCapability> {
        Ok(match recipient {
            Recipient::User(user_id) => {
                WalletRepository::new(&self.storage).capability_for_user(user_id)?
            }
            Recipient::PrimaryAddress(_) => WalletCapability {
                solana: true,
                avalanche: false,
            },
            Recipient::SecondaryAddress(_) => WalletCapability {
                solana: false,
                avalanche: true,
            },
        })
    }

    fn primary_asset(&self, symbol: &str) -> WalletResult<PrimaryAsset> {
        match symbol {
            "SOL" => Ok(PrimaryAsset::Native),
            "USDC" => Ok(PrimaryAsset::Token {
                mint: self.usdc_mint,
                decimals: USDC_DECIMALS,
            }),
            other => Err(WalletError::InvalidInput(format!(
                "{other} is not a primary-chain token"
            ))),
        }
    }

    fn secondary(&self) -> WalletResult<&SecondaryChain> {
        self.secondary
            .as_ref()
            .ok_or_else(|| WalletError::Secondary("secondary chain is not configured".into()))
    }

    fn links(&self) -> PaymentLinks<'_> {
        PaymentLinks::new(&self.storage, &self.relay, &self.otp)
    }

    fn audit(&self) -> AuditRepository<'_> {
        AuditRepository::new(&self.storage)
    }
}

fn issued(record: WalletRecord, wallet: &ProvisionedWallet) -> IssuedWallet {
    IssuedWallet {
        record,
        backup_share: encode_share(&wallet.backup_share),
        recovery_share: encode_share(&wallet.recovery_share),
    }
}
