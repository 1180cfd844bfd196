// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory primary ledger for tests.
//!
//! Verifies every signature, charges the fee payer, and applies system,
//! token and associated-token-account instructions atomically against a
//! copy of the state. Token authority checks follow the token program:
//! the owner may move any amount up to the balance, a delegate only up to
//! its remaining allowance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::programs::{
    associated_token_address, decode_system_transfer, is_create_idempotent, TokenInstruction,
    ASSOCIATED_TOKEN_PROGRAM_ID, COMPUTE_BUDGET_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use super::{Hash, Instruction, LedgerError, LedgerRpc, Pubkey, Signature, SignatureStatus, Transaction};

pub const FEE_PER_SIGNATURE: u64 = 5_000;
pub const TOKEN_ACCOUNT_RENT: u64 = 2_039_280;

const SIMULATION_FAILED: i64 = -32002;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmMode {
    /// Accepted transactions are immediately reported as confirmed.
    Immediate,
    /// Accepted transactions never show up in status queries.
    Never,
}

#[derive(Debug, Clone)]
struct TokenAccount {
    mint: Pubkey,
    owner: Pubkey,
    amount: u64,
    delegate: Option<Pubkey>,
    delegated_amount: u64,
}

#[derive(Debug, Clone, Default)]
struct State {
    lamports: HashMap<Pubkey, u64>,
    mints: HashMap<Pubkey, u8>,
    token_accounts: HashMap<Pubkey, TokenAccount>,
}

pub struct FakeLedger {
    state: Mutex<State>,
    statuses: Mutex<HashMap<Signature, SignatureStatus>>,
    sent: Mutex<Vec<Transaction>>,
    confirm: Mutex<ConfirmMode>,
    unreachable: AtomicBool,
    lose_send_responses: AtomicBool,
    blockhash: Hash,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            statuses: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            confirm: Mutex::new(ConfirmMode::Immediate),
            unreachable: AtomicBool::new(false),
            lose_send_responses: AtomicBool::new(false),
            blockhash: Hash::new([42u8; 32]),
        }
    }

    pub fn fund_native(&self, address: &Pubkey, lamports: u64) {
        let mut state = self.state.lock().unwrap();
        *state.lamports.entry(*address).or_default() += lamports;
    }

    pub fn native(&self, address: &Pubkey) -> u64 {
        self.state
            .lock()
            .unwrap()
            .lamports
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    pub fn create_mint(&self, mint: &Pubkey, decimals: u8) {
        self.state.lock().unwrap().mints.insert(*mint, decimals);
    }

    /// Create (or top up) `owner`'s associated token account.
    pub fn mint_to(&self, owner: &Pubkey, mint: &Pubkey, amount: u64) -> Pubkey {
        let address = associated_token_address(owner, mint).unwrap();
        let mut state = self.state.lock().unwrap();
        state
            .token_accounts
            .entry(address)
            .or_insert_with(|| TokenAccount {
                mint: *mint,
                owner: *owner,
                amount: 0,
                delegate: None,
                delegated_amount: 0,
            })
            .amount += amount;
        address
    }

    pub fn token_amount(&self, account: &Pubkey) -> Option<u64> {
        self.state
            .lock()
            .unwrap()
            .token_accounts
            .get(account)
            .map(|a| a.amount)
    }

    pub fn delegation(&self, account: &Pubkey) -> Option<(Pubkey, u64)> {
        let state = self.state.lock().unwrap();
        let account = state.token_accounts.get(account)?;
        account.delegate.map(|d| (d, account.delegated_amount))
    }

    /// Overwrite the delegate allowance on a token account, as an approval
    /// made elsewhere would.
    pub fn set_delegation(&self, account: &Pubkey, delegate: &Pubkey, amount: u64) {
        let mut state = self.state.lock().unwrap();
        let account = state.token_accounts.get_mut(account).unwrap();
        account.delegate = Some(*delegate);
        account.delegated_amount = amount;
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_confirm_mode(&self, mode: ConfirmMode) {
        *self.confirm.lock().unwrap() = mode;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Apply sent transactions but answer with a transport error.
    pub fn set_lose_send_responses(&self, lose: bool) {
        self.lose_send_responses.store(lose, Ordering::SeqCst);
    }

    pub fn mark_status(&self, signature: &Signature, status: SignatureStatus) {
        self.statuses.lock().unwrap().insert(*signature, status);
    }

    fn check_reachable(&self) -> Result<(), LedgerError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(LedgerError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn execute(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        if transaction.message.recent_blockhash != self.blockhash {
            return Err(rejected("Blockhash not found"));
        }
        transaction.verify().map_err(|_| LedgerError::Rpc {
            code: -32003,
            message: "Transaction signature verification failure".into(),
        })?;

        let instructions = transaction.message.decompile()?;
        let payer = *transaction
            .message
            .fee_payer()
            .ok_or_else(|| rejected("missing fee payer"))?;
        let fee = FEE_PER_SIGNATURE * transaction.signatures.len() as u64;

        let mut state = self.state.lock().unwrap();
        let mut next = state.clone();

        debit(&mut next, &payer, fee)
            .map_err(|_| rejected("Attempt to debit an account but found insufficient funds for fee"))?;

        for (index, instruction) in instructions.iter().enumerate() {
            apply(&mut next, instruction).map_err(|reason| {
                rejected(&format!("Error processing Instruction {index}: {reason}"))
            })?;
        }

        *state = next;
        Ok(())
    }
}

fn rejected(reason: &str) -> LedgerError {
    LedgerError::Rpc {
        code: SIMULATION_FAILED,
        message: format!("Transaction simulation failed: {reason}"),
    }
}

fn debit(state: &mut State, address: &Pubkey, lamports: u64) -> Result<(), String> {
    let balance = state.lamports.entry(*address).or_default();
    *balance = balance
        .checked_sub(lamports)
        .ok_or_else(|| "insufficient lamports".to_string())?;
    Ok(())
}

fn apply(state: &mut State, instruction: &Instruction) -> Result<(), String> {
    let account = |i: usize| {
        instruction
            .accounts
            .get(i)
            .copied()
            .ok_or_else(|| "not enough account keys".to_string())
    };

    match instruction.program_id {
        id if id == COMPUTE_BUDGET_PROGRAM_ID => Ok(()),
        id if id == SYSTEM_PROGRAM_ID => {
            let lamports = decode_system_transfer(&instruction.data)
                .ok_or_else(|| "invalid instruction data".to_string())?;
            let (from, to) = (account(0)?, account(1)?);
            if !from.is_signer {
                return Err("missing required signature".into());
            }
            debit(state, &from.pubkey, lamports)?;
            *state.lamports.entry(to.pubkey).or_default() += lamports;
            Ok(())
        }
        id if id == ASSOCIATED_TOKEN_PROGRAM_ID => {
            if !is_create_idempotent(instruction) {
                return Err("invalid instruction data".into());
            }
            let (payer, address, owner, mint) = (account(0)?, account(1)?, account(2)?, account(3)?);
            let expected = associated_token_address(&owner.pubkey, &mint.pubkey)
                .map_err(|e| e.to_string())?;
            if expected != address.pubkey {
                return Err("provided seeds do not result in a valid address".into());
            }
            if !state.mints.contains_key(&mint.pubkey) {
                return Err("invalid mint".into());
            }
            if state.token_accounts.contains_key(&address.pubkey) {
                return Ok(());
            }
            debit(state, &payer.pubkey, TOKEN_ACCOUNT_RENT)?;
            state.token_accounts.insert(
                address.pubkey,
                TokenAccount {
                    mint: mint.pubkey,
                    owner: owner.pubkey,
                    amount: 0,
                    delegate: None,
                    delegated_amount: 0,
                },
            );
            Ok(())
        }
        id if id == TOKEN_PROGRAM_ID => apply_token(state, instruction),
        other => Err(format!("unknown program {other}")),
    }
}

fn apply_token(state: &mut State, instruction: &Instruction) -> Result<(), String> {
    let decoded = TokenInstruction::decode(&instruction.data)
        .ok_or_else(|| "invalid instruction data".to_string())?;
    let key = |i: usize| {
        instruction
            .accounts
            .get(i)
            .copied()
            .ok_or_else(|| "not enough account keys".to_string())
    };

    match decoded {
        TokenInstruction::Transfer { amount } => {
            token_move(state, key(0)?.pubkey, key(1)?.pubkey, key(2)?, amount, None)
        }
        TokenInstruction::TransferChecked { amount, decimals } => {
            let mint = key(1)?.pubkey;
            match state.mints.get(&mint) {
                Some(d) if *d == decimals => {}
                _ => return Err("mint decimals mismatch".into()),
            }
            token_move(state, key(0)?.pubkey, key(2)?.pubkey, key(3)?, amount, Some(mint))
        }
        TokenInstruction::Approve { amount } => {
            let (source, delegate, owner) = (key(0)?, key(1)?, key(2)?);
            let account = state
                .token_accounts
                .get_mut(&source.pubkey)
                .ok_or_else(|| "invalid account data".to_string())?;
            if !owner.is_signer || owner.pubkey != account.owner {
                return Err("owner does not match".into());
            }
            account.delegate = Some(delegate.pubkey);
            account.delegated_amount = amount;
            Ok(())
        }
        TokenInstruction::Revoke => {
            let (source, owner) = (key(0)?, key(1)?);
            let account = state
                .token_accounts
                .get_mut(&source.pubkey)
                .ok_or_else(|| "invalid account data".to_string())?;
            if !owner.is_signer || owner.pubkey != account.owner {
                return Err("owner does not match".into());
            }
            account.delegate = None;
            account.delegated_amount = 0;
            Ok(())
        }
    }
}

fn token_move(
    state: &mut State,
    source: Pubkey,
    destination: Pubkey,
    authority: super::AccountMeta,
    amount: u64,
    mint: Option<Pubkey>,
) -> Result<(), String> {
    if !authority.is_signer {
        return Err("missing required signature".into());
    }

    let dest_mint = state
        .token_accounts
        .get(&destination)
        .map(|a| a.mint)
        .ok_or_else(|| "invalid account data".to_string())?;

    let from = state
        .token_accounts
        .get_mut(&source)
        .ok_or_else(|| "invalid account data".to_string())?;
    if from.mint != dest_mint || mint.is_some_and(|m| m != from.mint) {
        return Err("account not associated with this mint".into());
    }
    if from.amount < amount {
        return Err("insufficient funds".into());
    }

    if authority.pubkey == from.owner {
        // owner transfer
    } else if from.delegate == Some(authority.pubkey) {
        if from.delegated_amount < amount {
            return Err("insufficient funds".into());
        }
        from.delegated_amount -= amount;
        if from.delegated_amount == 0 {
            from.delegate = None;
        }
    } else {
        return Err("owner does not match".into());
    }

    from.amount -= amount;
    if let Some(to) = state.token_accounts.get_mut(&destination) {
        to.amount += amount;
    }
    Ok(())
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.check_reachable()?;
        Ok(self.blockhash)
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, LedgerError> {
        self.check_reachable()?;
        let state = self.state.lock().unwrap();
        Ok(state.token_accounts.contains_key(address)
            || state.lamports.get(address).is_some_and(|l| *l > 0))
    }

    async fn native_balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        self.check_reachable()?;
        Ok(self.native(address))
    }

    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64, LedgerError> {
        self.check_reachable()?;
        Ok(self.token_amount(token_account).unwrap_or(0))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        self.check_reachable()?;
        self.execute(transaction)?;

        let signature = transaction.signature();
        self.sent.lock().unwrap().push(transaction.clone());
        if *self.confirm.lock().unwrap() == ConfirmMode::Immediate {
            self.mark_status(&signature, SignatureStatus::Confirmed);
        }
        if self.lose_send_responses.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("operation timed out".into()));
        }
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        self.check_reachable()?;
        Ok(self.statuses.lock().unwrap().get(signature).cloned())
    }
}
