// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secondary chain networks and tokens.

use serde::Serialize;

/// EVM network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    pub chain_id: u64,
    /// Default RPC endpoint URL
    pub rpc_url: &'static str,
    pub explorer_url: &'static str,
}

/// Avalanche C-Chain Mainnet configuration.
pub const AVAX_MAINNET: NetworkConfig = NetworkConfig {
    name: "Avalanche C-Chain",
    chain_id: 43114,
    rpc_url: "https://api.avax.network/ext/bc/C/rpc",
    explorer_url: "https://snowtrace.io",
};

/// Avalanche Fuji Testnet configuration.
pub const AVAX_FUJI: NetworkConfig = NetworkConfig {
    name: "Avalanche Fuji Testnet",
    chain_id: 43113,
    rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
    explorer_url: "https://testnet.snowtrace.io",
};

pub fn network_for_chain_id(chain_id: u64) -> Option<&'static NetworkConfig> {
    [&AVAX_MAINNET, &AVAX_FUJI]
        .into_iter()
        .find(|network| network.chain_id == chain_id)
}

/// Native currency decimals.
pub const NATIVE_DECIMALS: u8 = 18;
pub const NATIVE_SYMBOL: &str = "AVAX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20Token {
    pub symbol: &'static str,
    pub name: &'static str,
    pub decimals: u8,
    pub mainnet_address: Option<&'static str>,
    pub fuji_address: Option<&'static str>,
}

impl Erc20Token {
    /// Contract address on `chain_id`, if deployed there.
    pub fn address_on(&self, chain_id: u64) -> Option<&'static str> {
        match chain_id {
            id if id == AVAX_MAINNET.chain_id => self.mainnet_address,
            id if id == AVAX_FUJI.chain_id => self.fuji_address,
            _ => None,
        }
    }
}

pub const USDC_TOKEN: Erc20Token = Erc20Token {
    symbol: "USDC",
    name: "USD Coin",
    decimals: 6,
    mainnet_address: Some("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
    fuji_address: Some("0x5425890298aed601595a70AB815c96711a31Bc65"),
};

/// Relational Euro, deployed on Fuji only.
pub const REUR_TOKEN: Erc20Token = Erc20Token {
    symbol: "rEUR",
    name: "Relational Euro",
    decimals: 6,
    mainnet_address: None,
    fuji_address: Some("0x76568BEd5Acf1A5Cd888773C8cAe9ea2a9131A63"),
};

pub const ERC20_TOKENS: &[Erc20Token] = &[USDC_TOKEN, REUR_TOKEN];

/// What a secondary-chain transfer moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmAsset {
    Native,
    Token(&'static Erc20Token),
}

impl EvmAsset {
    /// Case-insensitive lookup by symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        if symbol.eq_ignore_ascii_case(NATIVE_SYMBOL) {
            return Some(Self::Native);
        }
        ERC20_TOKENS
            .iter()
            .find(|token| token.symbol.eq_ignore_ascii_case(symbol))
            .map(Self::Token)
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Self::Native => NATIVE_DECIMALS,
            Self::Token(token) => token.decimals,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Native => NATIVE_SYMBOL,
            Self::Token(token) => token.symbol,
        }
    }
}

/// Transaction receipt after inclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub success: bool,
}
