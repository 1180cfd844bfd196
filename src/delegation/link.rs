// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment link lifecycle: approve, claim, cancel.
//!
//! A link is a bounded token delegation from the creator's account to the
//! relay, plus a one-time code. Claiming needs only the code; the creator
//! signs nothing at claim time.
//!
//! The token program keeps one delegate allowance per account, so approving
//! a new link replaces the allowance of any older active link on the same
//! account. Those links are marked `superseded`.
//!
//! After [`MAX_CLAIM_ATTEMPTS`] wrong codes a link is `locked`: it can no
//! longer be claimed, but the creator can still cancel it to revoke the
//! delegation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::otp::{OneTimeCode, OtpHasher};
use super::strategies::{execute_delegated_transfer, DelegatedTransfer};
use crate::error::{WalletError, WalletResult};
use crate::ledger::programs::{associated_token_address, token_approve, token_revoke};
use crate::ledger::{Pubkey, Signer};
use crate::relay::service::relay_unavailable;
use crate::relay::{Authorization, RelayService, RelaySubmission};
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, FileStorage, LinkRepository, LinkStatus,
    PaymentLink, StorageError,
};

/// Wrong one-time codes a link tolerates before it locks.
pub const MAX_CLAIM_ATTEMPTS: u32 = 5;

/// What the creator asks for.
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub creator_user_id: String,
    pub creator_wallet_id: String,
    pub mint: Pubkey,
    pub token_symbol: String,
    /// Base units.
    pub amount: u64,
    pub decimals: Option<u8>,
    pub expires_at: DateTime<Utc>,
}

/// A newly approved link. The code is not recoverable later.
#[derive(Debug)]
pub struct ApprovedLink {
    pub link: PaymentLink,
    pub one_time_code: OneTimeCode,
    pub submission: RelaySubmission,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimedLink {
    pub link: PaymentLink,
    pub recipient_account: Pubkey,
    pub submission: RelaySubmission,
}

pub struct PaymentLinks<'a> {
    storage: &'a FileStorage,
    relay: &'a RelayService,
    otp: &'a OtpHasher,
}

impl<'a> PaymentLinks<'a> {
    pub fn new(storage: &'a FileStorage, relay: &'a RelayService, otp: &'a OtpHasher) -> Self {
        Self {
            storage,
            relay,
            otp,
        }
    }

    /// Grant the relay a delegation of `request.amount` and persist the link.
    pub async fn approve_link(
        &self,
        creator: &dyn Signer,
        request: LinkRequest,
    ) -> WalletResult<ApprovedLink> {
        if request.amount == 0 {
            return Err(WalletError::InvalidInput("link amount must be positive".into()));
        }
        let now = Utc::now();
        if request.expires_at <= now {
            return Err(WalletError::InvalidInput("link expiry must be in the future".into()));
        }

        let owner = creator.pubkey();
        let source = associated_token_address(&owner, &request.mint)
            .map_err(|e| WalletError::InvalidInput(e.to_string()))?;
        let available = self
            .relay
            .rpc()
            .token_balance(&source)
            .await
            .map_err(|e| relay_unavailable("creator balance check", e))?;
        if available < request.amount {
            return Err(WalletError::InsufficientBalance {
                required: request.amount.into(),
                available: available.into(),
            });
        }

        let approve = token_approve(&source, &self.relay.address(), &owner, request.amount);
        let submission = self
            .relay
            .submit(&[approve], Authorization::Signed(creator))
            .await?;

        let repo = LinkRepository::new(self.storage);
        self.supersede_active(&repo, &source)?;

        let one_time_code = self.otp.generate();
        let link = PaymentLink {
            link_id: uuid::Uuid::new_v4().to_string(),
            creator_user_id: request.creator_user_id,
            creator_wallet_id: request.creator_wallet_id,
            owner,
            source_account: source,
            mint: request.mint,
            token_symbol: request.token_symbol,
            amount: request.amount,
            decimals: request.decimals,
            otp_hash: self.otp.hash(one_time_code.as_str()),
            failed_attempts: 0,
            expires_at: request.expires_at,
            status: LinkStatus::Active,
            approval_signature: submission.signature,
            claim_signature: None,
            claimed_by: None,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        };
        repo.create(&link)?;

        info!(link_id = %link.link_id, amount = link.amount, "payment link approved");
        self.audit().record(
            AuditEvent::new(AuditEventType::LinkApproved)
                .with_user(&link.creator_user_id)
                .with_resource("link", &link.link_id)
                .with_details(serde_json::json!({
                    "amount": link.amount,
                    "token": link.token_symbol,
                    "signature": link.approval_signature.to_string(),
                })),
        );

        Ok(ApprovedLink {
            link,
            one_time_code,
            submission,
        })
    }

    /// Move the link amount to `recipient_owner` under the delegation.
    pub async fn claim_link(
        &self,
        link_id: &str,
        one_time_code: &str,
        recipient_owner: &Pubkey,
    ) -> WalletResult<ClaimedLink> {
        let repo = LinkRepository::new(self.storage);
        let mut link = repo.get(link_id).map_err(link_lookup_error)?;

        if link.status != LinkStatus::Active {
            return Err(WalletError::LinkUnavailable(link.status.as_str().to_string()));
        }
        if link.is_expired_at(Utc::now()) {
            repo.set_status(link_id, LinkStatus::Expired)?;
            info!(link_id, "payment link expired");
            return Err(WalletError::LinkExpired);
        }
        if !self.otp.verify(one_time_code, &link.otp_hash) {
            let link = repo.record_failed_attempt(link_id, MAX_CLAIM_ATTEMPTS)?;
            warn!(link_id, attempts = link.failed_attempts, "payment link claim with wrong code");
            self.audit().record(
                AuditEvent::new(AuditEventType::LinkClaimFailed)
                    .with_resource("link", link_id)
                    .with_details(serde_json::json!({ "attempts": link.failed_attempts }))
                    .failed("invalid one-time code"),
            );
            if link.status == LinkStatus::Locked {
                warn!(link_id, "payment link locked after repeated wrong codes");
                self.audit().record(
                    AuditEvent::new(AuditEventType::LinkLocked)
                        .with_user(&link.creator_user_id)
                        .with_resource("link", link_id),
                );
            }
            return Err(WalletError::InvalidOneTimeCode);
        }

        let (destination, setup) = self
            .relay
            .recipient_token_account(recipient_owner, &link.mint)
            .await?;
        let transfer = DelegatedTransfer {
            source: link.source_account,
            mint: link.mint,
            destination,
            amount: link.amount,
            decimals: link.decimals,
        };

        let submission = match execute_delegated_transfer(self.relay, &transfer, &setup).await {
            Ok(submission) => submission,
            Err(err) => {
                self.audit().record(
                    AuditEvent::new(AuditEventType::LinkClaimFailed)
                        .with_resource("link", link_id)
                        .failed(err.to_string()),
                );
                return Err(err);
            }
        };

        link.status = LinkStatus::Claimed;
        link.claim_signature = Some(submission.signature);
        link.claimed_by = Some(*recipient_owner);
        repo.update(&link)?;

        info!(link_id, signature = %submission.signature, "payment link claimed");
        self.audit().record(
            AuditEvent::new(AuditEventType::LinkClaimed)
                .with_user(&link.creator_user_id)
                .with_resource("link", link_id)
                .with_details(serde_json::json!({
                    "recipient": recipient_owner.to_string(),
                    "signature": submission.signature.to_string(),
                })),
        );

        Ok(ClaimedLink {
            link,
            recipient_account: destination,
            submission,
        })
    }

    /// Revoke the delegation behind an active or locked link.
    pub async fn cancel_link(
        &self,
        creator: &dyn Signer,
        creator_user_id: &str,
        link_id: &str,
    ) -> WalletResult<PaymentLink> {
        let repo = LinkRepository::new(self.storage);
        let link = repo.get(link_id).map_err(link_lookup_error)?;
        if link.creator_user_id != creator_user_id {
            return Err(WalletError::NotFound(format!("Payment link {link_id}")));
        }
        if !matches!(link.status, LinkStatus::Active | LinkStatus::Locked) {
            return Err(WalletError::LinkUnavailable(link.status.as_str().to_string()));
        }
        if creator.pubkey() != link.owner {
            return Err(WalletError::InvalidInput(
                "signing key does not own the link's token account".into(),
            ));
        }

        let revoke = token_revoke(&link.source_account, &link.owner);
        let submission = self
            .relay
            .submit(&[revoke], Authorization::Signed(creator))
            .await?;
        let link = repo.set_status(link_id, LinkStatus::Cancelled)?;

        info!(link_id, signature = %submission.signature, "payment link cancelled");
        self.audit().record(
            AuditEvent::new(AuditEventType::LinkCancelled)
                .with_user(creator_user_id)
                .with_resource("link", link_id),
        );
        Ok(link)
    }

    fn supersede_active(&self, repo: &LinkRepository<'_>, source: &Pubkey) -> WalletResult<()> {
        for old in repo.list_active_for_source(source)? {
            repo.set_status(&old.link_id, LinkStatus::Superseded)?;
            info!(link_id = %old.link_id, "payment link superseded by a newer approval");
            self.audit().record(
                AuditEvent::new(AuditEventType::LinkSuperseded)
                    .with_user(&old.creator_user_id)
                    .with_resource("link", &old.link_id),
            );
        }
        Ok(())
    }

    fn audit(&self) -> AuditRepository<'a> {
        AuditRepository::new(self.storage)
    }
}

fn link_lookup_error(err: StorageError) -> WalletError {
    match err {
        StorageError::NotFound(what) => WalletError::NotFound(what),
        other => other.into(),
    }
}
