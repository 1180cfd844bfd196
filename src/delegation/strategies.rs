// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ordered claim strategies for delegated transfers.
//!
//! The relay moves tokens out of the creator's account under the standing
//! delegation. Strategies are tried in order: `Unsupported` moves on to the
//! next one, `Submitted` and `Failed` stop. The on-chain allowance is the
//! only amount ceiling.

use tracing::{debug, info, warn};

use crate::error::{WalletError, WalletResult};
use crate::ledger::programs::{token_transfer, token_transfer_checked};
use crate::ledger::{Instruction, Pubkey};
use crate::relay::{Authorization, RelayService, RelaySubmission};

/// A transfer the relay performs as delegate of `source`.
#[derive(Debug, Clone)]
pub struct DelegatedTransfer {
    pub source: Pubkey,
    pub mint: Pubkey,
    pub destination: Pubkey,
    pub amount: u64,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStrategy {
    /// `TransferChecked` with the relay as delegate; needs the mint decimals.
    DelegatedTransferChecked,
    /// Plain `Transfer` with the relay as delegate.
    DelegatedTransfer,
}

pub const CLAIM_STRATEGIES: [ClaimStrategy; 2] = [
    ClaimStrategy::DelegatedTransferChecked,
    ClaimStrategy::DelegatedTransfer,
];

#[derive(Debug)]
pub enum StrategyOutcome {
    Submitted(RelaySubmission),
    Unsupported(&'static str),
    Failed(WalletError),
}

impl ClaimStrategy {
    fn instruction(&self, transfer: &DelegatedTransfer, delegate: &Pubkey) -> Option<Instruction> {
        match self {
            Self::DelegatedTransferChecked => transfer.decimals.map(|decimals| {
                token_transfer_checked(
                    &transfer.source,
                    &transfer.mint,
                    &transfer.destination,
                    delegate,
                    transfer.amount,
                    decimals,
                )
            }),
            Self::DelegatedTransfer => Some(token_transfer(
                &transfer.source,
                &transfer.destination,
                delegate,
                transfer.amount,
            )),
        }
    }

    pub async fn attempt(
        &self,
        relay: &RelayService,
        transfer: &DelegatedTransfer,
        setup: &[Instruction],
    ) -> StrategyOutcome {
        let Some(transfer_ix) = self.instruction(transfer, &relay.address()) else {
            return StrategyOutcome::Unsupported("mint decimals unknown");
        };

        let mut instructions = setup.to_vec();
        instructions.push(transfer_ix);
        match relay.submit(&instructions, Authorization::Delegated).await {
            Ok(submission) => StrategyOutcome::Submitted(submission),
            Err(err) => StrategyOutcome::Failed(err),
        }
    }
}

/// Run [`CLAIM_STRATEGIES`] until one submits or fails.
///
/// `setup` instructions (recipient account creation) are prepended to
/// whichever strategy runs.
pub async fn execute_delegated_transfer(
    relay: &RelayService,
    transfer: &DelegatedTransfer,
    setup: &[Instruction],
) -> WalletResult<RelaySubmission> {
    for strategy in CLAIM_STRATEGIES {
        match strategy.attempt(relay, transfer, setup).await {
            StrategyOutcome::Submitted(submission) => {
                info!(?strategy, signature = %submission.signature, "delegated transfer submitted");
                return Ok(submission);
            }
            StrategyOutcome::Unsupported(reason) => {
                debug!(?strategy, reason, "claim strategy unsupported, trying next");
            }
            StrategyOutcome::Failed(err) => {
                warn!(?strategy, error = %err, "delegated transfer failed");
                return Err(err);
            }
        }
    }
    Err(WalletError::Internal(
        "no claim strategy applies to this transfer".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::SigningKey;
    use crate::ledger::fake::FakeLedger;
    use crate::ledger::programs::{associated_token_address, token_approve, TokenInstruction};
    use crate::ledger::Signer;
    use crate::relay::{ConfirmationPolicy, RelayAccount, RelayConfig};
    use std::sync::Arc;
    use std::time::Duration;

    const MINT: Pubkey = Pubkey::new([30u8; 32]);

    struct Fixture {
        ledger: Arc<FakeLedger>,
        relay: RelayService,
        source: Pubkey,
        destination: Pubkey,
    }

    async fn delegated(allowance: u64) -> Fixture {
        let ledger = Arc::new(FakeLedger::new());
        let account = Arc::new(RelayAccount::new(SigningKey::generate()));
        ledger.fund_native(&account.address(), 1_000_000_000);
        let relay = RelayService::new(
            account,
            ledger.clone(),
            RelayConfig {
                confirmation: ConfirmationPolicy {
                    poll_interval: Duration::from_millis(1),
                    max_attempts: 2,
                },
                ..RelayConfig::default()
            },
        );

        let owner = SigningKey::generate();
        ledger.create_mint(&MINT, 6);
        let source = ledger.mint_to(&owner.pubkey(), &MINT, 10_000_000);
        let destination = ledger.mint_to(&Pubkey::new([31u8; 32]), &MINT, 0);

        relay
            .submit(
                &[token_approve(&source, &relay.address(), &owner.pubkey(), allowance)],
                Authorization::Signed(&owner),
            )
            .await
            .unwrap();

        Fixture {
            ledger,
            relay,
            source,
            destination,
        }
    }

    fn transfer(f: &Fixture, amount: u64, decimals: Option<u8>) -> DelegatedTransfer {
        DelegatedTransfer {
            source: f.source,
            mint: MINT,
            destination: f.destination,
            amount,
            decimals,
        }
    }

    fn last_token_instruction(f: &Fixture) -> TokenInstruction {
        let sent = f.ledger.sent();
        let instructions = sent.last().unwrap().message.decompile().unwrap();
        TokenInstruction::decode(&instructions.last().unwrap().data).unwrap()
    }

    #[tokio::test]
    async fn checked_strategy_is_preferred_when_decimals_known() {
        let f = delegated(5_000_000).await;
        execute_delegated_transfer(&f.relay, &transfer(&f, 5_000_000, Some(6)), &[])
            .await
            .unwrap();

        assert!(matches!(
            last_token_instruction(&f),
            TokenInstruction::TransferChecked { amount: 5_000_000, decimals: 6 }
        ));
        assert_eq!(f.ledger.token_amount(&f.destination), Some(5_000_000));
        assert_eq!(f.ledger.delegation(&f.source), None);
        // Only the relay signed the claim.
        assert_eq!(f.ledger.sent().last().unwrap().signatures.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_plain_transfer_without_decimals() {
        let f = delegated(5_000_000).await;
        execute_delegated_transfer(&f.relay, &transfer(&f, 2_000_000, None), &[])
            .await
            .unwrap();

        assert!(matches!(
            last_token_instruction(&f),
            TokenInstruction::Transfer { amount: 2_000_000 }
        ));
        assert_eq!(
            f.ledger.delegation(&f.source),
            Some((f.relay.address(), 3_000_000))
        );
    }

    #[tokio::test]
    async fn amount_above_allowance_is_rejected_on_chain() {
        let f = delegated(5_000_000).await;
        let err = execute_delegated_transfer(&f.relay, &transfer(&f, 5_000_001, Some(6)), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::SubmissionFailure(ref msg) if msg.contains("insufficient funds")));
        assert_eq!(f.ledger.token_amount(&f.destination), Some(0));
        assert_eq!(f.ledger.token_amount(&f.source), Some(10_000_000));
        // A failed strategy does not fall through to the next one.
        assert_eq!(f.ledger.sent().len(), 1);
    }

    #[tokio::test]
    async fn setup_instructions_run_first() {
        let f = delegated(1_000).await;
        let recipient = Pubkey::new([32u8; 32]);
        let (destination, setup) = f
            .relay
            .recipient_token_account(&recipient, &MINT)
            .await
            .unwrap();
        assert_eq!(setup.len(), 1);
        assert_eq!(destination, associated_token_address(&recipient, &MINT).unwrap());

        let mut t = transfer(&f, 1_000, Some(6));
        t.destination = destination;
        execute_delegated_transfer(&f.relay, &t, &setup).await.unwrap();
        assert_eq!(f.ledger.token_amount(&destination), Some(1_000));
    }
}
