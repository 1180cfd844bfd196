// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Legacy message compilation and transaction wire format.
//!
//! Wire layout:
//! - transaction: `shortvec(signatures) || message`
//! - message: `header(3) || shortvec(keys) || blockhash(32) || shortvec(instructions)`
//! - instruction: `program_index(1) || shortvec(account_indices) || shortvec(data)`
//!
//! Account keys are ordered fee payer first, then signer-writable,
//! signer-readonly, writable and readonly, each group in first-use order.

use base64ct::{Base64, Encoding};
use ed25519_dalek::Verifier;

use super::{AccountMeta, Hash, Instruction, LedgerError, Pubkey, Signature};

const MAX_ACCOUNT_KEYS: usize = 256;

/// Anything that can produce ed25519 signatures for one account.
pub trait Signer: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    fn sign_message(&self, message: &[u8]) -> Signature;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// A compiled legacy message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions with `payer` as the fee payer.
    pub fn compile(
        instructions: &[Instruction],
        payer: &Pubkey,
        recent_blockhash: Hash,
    ) -> Result<Self, LedgerError> {
        let mut metas: Vec<AccountMeta> = vec![AccountMeta::writable(*payer, true)];
        let mut merge = |meta: AccountMeta| {
            if let Some(existing) = metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            } else {
                metas.push(meta);
            }
        };

        for instruction in instructions {
            for meta in &instruction.accounts {
                merge(*meta);
            }
            merge(AccountMeta::readonly(instruction.program_id, false));
        }

        let (payer_meta, rest) = metas.split_at(1);
        let group = |signer: bool, writable: bool| {
            rest.iter()
                .filter(move |m| m.is_signer == signer && m.is_writable == writable)
                .copied()
        };
        let ordered: Vec<AccountMeta> = payer_meta
            .iter()
            .copied()
            .chain(group(true, true))
            .chain(group(true, false))
            .chain(group(false, true))
            .chain(group(false, false))
            .collect();

        if ordered.len() > MAX_ACCOUNT_KEYS {
            return Err(LedgerError::InvalidTransaction(format!(
                "too many accounts: {}",
                ordered.len()
            )));
        }

        let count = |f: fn(&AccountMeta) -> bool| ordered.iter().filter(|m| f(m)).count() as u8;
        let header = MessageHeader {
            num_required_signatures: count(|m| m.is_signer),
            num_readonly_signed_accounts: count(|m| m.is_signer && !m.is_writable),
            num_readonly_unsigned_accounts: count(|m| !m.is_signer && !m.is_writable),
        };

        let account_keys: Vec<Pubkey> = ordered.iter().map(|m| m.pubkey).collect();
        let index_of = |key: &Pubkey| -> Result<u8, LedgerError> {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or_else(|| LedgerError::InvalidTransaction(format!("unknown account {key}")))
        };

        let compiled = instructions
            .iter()
            .map(|instruction| {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&instruction.program_id)?,
                    accounts: instruction
                        .accounts
                        .iter()
                        .map(|meta| index_of(&meta.pubkey))
                        .collect::<Result<_, _>>()?,
                    data: instruction.data.clone(),
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    /// Keys whose signatures the transaction must carry, in signature order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        let required = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..required]
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let signed = usize::from(self.header.num_required_signatures);
        let total = self.account_keys.len();
        if index < signed {
            index < signed - usize::from(self.header.num_readonly_signed_accounts)
        } else {
            index < total - usize::from(self.header.num_readonly_unsigned_accounts)
        }
    }

    /// Expand compiled instructions back into account metas.
    pub fn decompile(&self) -> Result<Vec<Instruction>, LedgerError> {
        let key = |index: u8| {
            self.account_keys
                .get(usize::from(index))
                .copied()
                .ok_or_else(|| LedgerError::InvalidTransaction(format!("bad account index {index}")))
        };

        self.instructions
            .iter()
            .map(|compiled| {
                let accounts = compiled
                    .accounts
                    .iter()
                    .map(|&index| {
                        Ok(AccountMeta {
                            pubkey: key(index)?,
                            is_signer: self.is_signer(usize::from(index)),
                            is_writable: self.is_writable(usize::from(index)),
                        })
                    })
                    .collect::<Result<Vec<_>, LedgerError>>()?;
                Ok(Instruction::new(
                    key(compiled.program_id_index)?,
                    accounts,
                    compiled.data.clone(),
                ))
            })
            .collect()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![
            self.header.num_required_signatures,
            self.header.num_readonly_signed_accounts,
            self.header.num_readonly_unsigned_accounts,
        ];

        write_shortvec_len(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());

        write_shortvec_len(&mut out, self.instructions.len());
        for instruction in &self.instructions {
            out.push(instruction.program_id_index);
            write_shortvec_len(&mut out, instruction.accounts.len());
            out.extend_from_slice(&instruction.accounts);
            write_shortvec_len(&mut out, instruction.data.len());
            out.extend_from_slice(&instruction.data);
        }

        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, LedgerError> {
        let mut reader = Reader::new(bytes);
        let message = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(message)
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, LedgerError> {
        let header = MessageHeader {
            num_required_signatures: reader.byte()?,
            num_readonly_signed_accounts: reader.byte()?,
            num_readonly_unsigned_accounts: reader.byte()?,
        };

        let key_count = reader.shortvec_len()?;
        let account_keys = (0..key_count)
            .map(|_| reader.array::<32>().map(Pubkey::new))
            .collect::<Result<Vec<_>, _>>()?;
        let recent_blockhash = Hash::new(reader.array::<32>()?);

        let instruction_count = reader.shortvec_len()?;
        let instructions = (0..instruction_count)
            .map(|_| {
                let program_id_index = reader.byte()?;
                let account_count = reader.shortvec_len()?;
                let accounts = reader.bytes(account_count)?.to_vec();
                let data_len = reader.shortvec_len()?;
                let data = reader.bytes(data_len)?.to_vec();
                Ok(CompiledInstruction {
                    program_id_index,
                    accounts,
                    data,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        if usize::from(header.num_required_signatures) > account_keys.len() {
            return Err(LedgerError::InvalidTransaction(
                "header requires more signers than accounts".into(),
            ));
        }

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }
}

/// A message plus one signature slot per required signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    pub fn new_unsigned(message: Message) -> Self {
        let slots = usize::from(message.header.num_required_signatures);
        Self {
            signatures: vec![Signature::default(); slots],
            message,
        }
    }

    /// Fill the signature slots belonging to `signers`.
    ///
    /// Fails if a signer is not a required signer of the message.
    pub fn partial_sign(&mut self, signers: &[&dyn Signer]) -> Result<(), LedgerError> {
        let bytes = self.message.serialize();
        for signer in signers {
            let pubkey = signer.pubkey();
            let slot = self
                .message
                .signer_keys()
                .iter()
                .position(|key| *key == pubkey)
                .ok_or_else(|| {
                    LedgerError::InvalidTransaction(format!("{pubkey} is not a required signer"))
                })?;
            self.signatures[slot] = signer.sign_message(&bytes);
        }
        Ok(())
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(|sig| *sig != Signature::default())
    }

    /// Check every signature against its signer key.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let signers = self.message.signer_keys();
        if signers.len() != self.signatures.len() {
            return Err(LedgerError::InvalidTransaction(
                "signature count does not match header".into(),
            ));
        }

        let bytes = self.message.serialize();
        for (key, signature) in signers.iter().zip(&self.signatures) {
            let verifying = ed25519_dalek::VerifyingKey::from_bytes(key.as_bytes())
                .map_err(|_| LedgerError::InvalidTransaction(format!("{key} cannot sign")))?;
            verifying
                .verify(&bytes, &ed25519_dalek::Signature::from_bytes(signature.as_bytes()))
                .map_err(|_| {
                    LedgerError::InvalidTransaction(format!("signature verification failed for {key}"))
                })?;
        }
        Ok(())
    }

    /// The transaction id: the fee payer's signature.
    pub fn signature(&self) -> Signature {
        self.signatures.first().copied().unwrap_or_default()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_shortvec_len(&mut out, self.signatures.len());
        for signature in &self.signatures {
            out.extend_from_slice(signature.as_bytes());
        }
        out.extend_from_slice(&self.message.serialize());
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, LedgerError> {
        let mut reader = Reader::new(bytes);
        let count = reader.shortvec_len()?;
        let signatures = (0..count)
            .map(|_| reader.array::<64>().map(Signature::new))
            .collect::<Result<Vec<_>, _>>()?;
        let message = Message::read(&mut reader)?;
        reader.finish()?;
        Ok(Self {
            signatures,
            message,
        })
    }

    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.serialize())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, LedgerError> {
        let bytes = Base64::decode_vec(encoded)
            .map_err(|_| LedgerError::InvalidTransaction("invalid base64".into()))?;
        Self::deserialize(&bytes)
    }
}

/// Compact-u16 length prefix: 7 bits per byte, high bit continues.
fn write_shortvec_len(out: &mut Vec<u8>, mut len: usize) {
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], LedgerError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| LedgerError::InvalidTransaction("unexpected end of data".into()))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, LedgerError> {
        Ok(self.bytes(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], LedgerError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn shortvec_len(&mut self) -> Result<usize, LedgerError> {
        let mut len = 0usize;
        for shift in [0u32, 7, 14] {
            let byte = self.byte()?;
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(len);
            }
        }
        Err(LedgerError::InvalidTransaction("shortvec length overflow".into()))
    }

    fn finish(&self) -> Result<(), LedgerError> {
        if self.offset == self.bytes.len() {
            Ok(())
        } else {
            Err(LedgerError::InvalidTransaction("trailing bytes".into()))
        }
    }
}
