// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 interface and call encoding.

use std::str::FromStr;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use super::types::EvmAsset;
use super::EvmError;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

pub fn parse_address(raw: &str) -> Result<Address, EvmError> {
    Address::from_str(raw.trim()).map_err(|e| EvmError::InvalidAddress(format!("{raw}: {e}")))
}

/// `transfer(to, amount)` calldata.
pub fn transfer_calldata(to: &Address, amount: U256) -> Bytes {
    IERC20::transferCall { to: *to, amount }.abi_encode().into()
}

/// A call the sponsor executes from the user's wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmCall {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Build the call moving `amount` base units of `asset` to `recipient`.
pub fn transfer_call(
    asset: EvmAsset,
    chain_id: u64,
    recipient: &Address,
    amount: U256,
) -> Result<EvmCall, EvmError> {
    match asset {
        EvmAsset::Native => Ok(EvmCall {
            to: *recipient,
            value: amount,
            data: Bytes::new(),
        }),
        EvmAsset::Token(token) => {
            let contract = token.address_on(chain_id).ok_or_else(|| {
                EvmError::UnsupportedToken(format!("{} on chain {chain_id}", token.symbol))
            })?;
            Ok(EvmCall {
                to: parse_address(contract)?,
                value: U256::ZERO,
                data: transfer_calldata(recipient, amount),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm::types::{AVAX_FUJI, REUR_TOKEN, USDC_TOKEN};

    const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn transfer_calldata_layout() {
        let data = transfer_calldata(&parse_address(RECIPIENT).unwrap(), U256::from(1_500_000u64));
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(data[35], 0xaa);
        assert_eq!(U256::from_be_slice(&data[36..]), U256::from(1_500_000u64));
    }

    #[test]
    fn token_transfer_targets_contract() {
        let recipient = parse_address(RECIPIENT).unwrap();
        let call = transfer_call(
            EvmAsset::Token(&USDC_TOKEN),
            AVAX_FUJI.chain_id,
            &recipient,
            U256::from(1u64),
        )
        .unwrap();
        assert_eq!(call.to, parse_address(USDC_TOKEN.fuji_address.unwrap()).unwrap());
        assert_eq!(call.value, U256::ZERO);

        let native = transfer_call(EvmAsset::Native, AVAX_FUJI.chain_id, &recipient, U256::from(7u64))
            .unwrap();
        assert_eq!(native.to, recipient);
        assert_eq!(native.value, U256::from(7u64));
        assert!(native.data.is_empty());
    }

    #[test]
    fn undeployed_token_is_rejected() {
        let err = transfer_call(
            EvmAsset::Token(&REUR_TOKEN),
            43114,
            &parse_address(RECIPIENT).unwrap(),
            U256::from(1u64),
        )
        .unwrap_err();
        assert!(matches!(err, EvmError::UnsupportedToken(_)));
        assert!(matches!(parse_address("0xnothex"), Err(EvmError::InvalidAddress(_))));
    }
}
