// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Built-in program ids and instruction encoders.
//!
//! Only the handful of instructions the relay needs are covered: native
//! transfers, compute budget hints, token transfers and delegation, and
//! idempotent associated token account creation.

use super::{AccountMeta, Instruction, LedgerError, Pubkey};

/// `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0u8; 32]);

/// `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133, 237,
    95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// `ComputeBudget111111111111111111111111111111`
pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey = Pubkey::new([
    3, 6, 70, 111, 229, 33, 23, 50, 255, 236, 173, 186, 114, 195, 155, 231, 188, 140, 229, 187,
    197, 247, 18, 107, 44, 67, 155, 58, 64, 0, 0, 0,
]);

const SYSTEM_TRANSFER: u32 = 2;
const COMPUTE_UNIT_LIMIT: u8 = 2;
const COMPUTE_UNIT_PRICE: u8 = 3;
const TOKEN_TRANSFER: u8 = 3;
const TOKEN_APPROVE: u8 = 4;
const TOKEN_REVOKE: u8 = 5;
const TOKEN_TRANSFER_CHECKED: u8 = 12;
const ATA_CREATE_IDEMPOTENT: u8 = 1;

/// Native lamport transfer.
pub fn system_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = SYSTEM_TRANSFER.to_le_bytes().to_vec();
    data.extend_from_slice(&lamports.to_le_bytes());

    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![
            AccountMeta::writable(*from, true),
            AccountMeta::writable(*to, false),
        ],
        data,
    )
}

pub fn set_compute_unit_limit(units: u32) -> Instruction {
    let mut data = vec![COMPUTE_UNIT_LIMIT];
    data.extend_from_slice(&units.to_le_bytes());
    Instruction::new(COMPUTE_BUDGET_PROGRAM_ID, Vec::new(), data)
}

/// Priority fee in micro-lamports per compute unit.
pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut data = vec![COMPUTE_UNIT_PRICE];
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction::new(COMPUTE_BUDGET_PROGRAM_ID, Vec::new(), data)
}

/// Token transfer signed by the owner or a delegate of `source`.
pub fn token_transfer(
    source: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Instruction {
    let mut data = vec![TOKEN_TRANSFER];
    data.extend_from_slice(&amount.to_le_bytes());

    Instruction::new(
        TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::writable(*source, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*authority, true),
        ],
        data,
    )
}

/// Token transfer that also asserts the mint and its decimals.
pub fn token_transfer_checked(
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = vec![TOKEN_TRANSFER_CHECKED];
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);

    Instruction::new(
        TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::writable(*source, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*authority, true),
        ],
        data,
    )
}

/// Grant `delegate` the right to move up to `amount` out of `source`.
///
/// A token account holds at most one delegate; approving again replaces the
/// previous delegate and allowance.
pub fn token_approve(source: &Pubkey, delegate: &Pubkey, owner: &Pubkey, amount: u64) -> Instruction {
    let mut data = vec![TOKEN_APPROVE];
    data.extend_from_slice(&amount.to_le_bytes());

    Instruction::new(
        TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::writable(*source, false),
            AccountMeta::readonly(*delegate, false),
            AccountMeta::readonly(*owner, true),
        ],
        data,
    )
}

pub fn token_revoke(source: &Pubkey, owner: &Pubkey) -> Instruction {
    Instruction::new(
        TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::writable(*source, false),
            AccountMeta::readonly(*owner, true),
        ],
        vec![TOKEN_REVOKE],
    )
}

/// Derive the associated token account of `owner` for `mint`.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, LedgerError> {
    Pubkey::find_program_address(
        &[owner.as_bytes(), TOKEN_PROGRAM_ID.as_bytes(), mint.as_bytes()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _)| address)
    .ok_or_else(|| LedgerError::InvalidAddress(format!("no token account for {owner}")))
}

/// Create `owner`'s associated token account, succeeding if it already exists.
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, LedgerError> {
    let account = associated_token_address(owner, mint)?;

    Ok(Instruction::new(
        ASSOCIATED_TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(account, false),
            AccountMeta::readonly(*owner, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::readonly(TOKEN_PROGRAM_ID, false),
        ],
        vec![ATA_CREATE_IDEMPOTENT],
    ))
}

/// A decoded token program instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenInstruction {
    Transfer { amount: u64 },
    Approve { amount: u64 },
    Revoke,
    TransferChecked { amount: u64, decimals: u8 },
}

impl TokenInstruction {
    pub fn decode(data: &[u8]) -> Option<Self> {
        let (&tag, rest) = data.split_first()?;
        match tag {
            TOKEN_TRANSFER => Some(Self::Transfer {
                amount: read_u64(rest)?,
            }),
            TOKEN_APPROVE => Some(Self::Approve {
                amount: read_u64(rest)?,
            }),
            TOKEN_REVOKE if rest.is_empty() => Some(Self::Revoke),
            TOKEN_TRANSFER_CHECKED if rest.len() == 9 => Some(Self::TransferChecked {
                amount: read_u64(&rest[..8])?,
                decimals: rest[8],
            }),
            _ => None,
        }
    }
}

/// Decode a system transfer's lamport amount.
pub fn decode_system_transfer(data: &[u8]) -> Option<u64> {
    if data.len() != 12 || data[..4] != SYSTEM_TRANSFER.to_le_bytes() {
        return None;
    }
    read_u64(&data[4..])
}

/// Whether `instruction` is an idempotent token account creation.
pub fn is_create_idempotent(instruction: &Instruction) -> bool {
    instruction.program_id == ASSOCIATED_TOKEN_PROGRAM_ID
        && instruction.data == [ATA_CREATE_IDEMPOTENT]
}

fn read_u64(bytes: &[u8]) -> Option<u64> {
    bytes.try_into().ok().map(u64::from_le_bytes)
}
