// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only secondary chain access: balances and receipts.

use alloy::{
    network::Ethereum,
    primitives::{Address, B256, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};
use async_trait::async_trait;

use super::erc20::{parse_address, IERC20};
use super::types::{EvmAsset, NetworkConfig, TxReceipt};
use super::EvmError;

type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Chain reads the transfer path and the reconciler depend on.
#[async_trait]
pub trait EvmReader: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Balance of `owner` in base units of `asset`.
    async fn balance(&self, owner: &Address, asset: EvmAsset) -> Result<U256, EvmError>;

    /// `None` while the transaction is not yet included.
    async fn receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, EvmError>;
}

pub struct EvmClient {
    network: NetworkConfig,
    chain_id: u64,
    provider: HttpProvider,
}

impl EvmClient {
    /// Connect to `rpc_url`, falling back to the network's default endpoint.
    pub fn new(network: NetworkConfig, rpc_url: Option<&str>) -> Result<Self, EvmError> {
        let raw = rpc_url.unwrap_or(network.rpc_url);
        let url: url::Url = raw
            .parse()
            .map_err(|e: url::ParseError| EvmError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);
        Ok(Self {
            chain_id: network.chain_id,
            network,
            provider,
        })
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }
}

#[async_trait]
impl EvmReader for EvmClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn balance(&self, owner: &Address, asset: EvmAsset) -> Result<U256, EvmError> {
        match asset {
            EvmAsset::Native => self
                .provider
                .get_balance(*owner)
                .await
                .map_err(|e| EvmError::Rpc(e.to_string())),
            EvmAsset::Token(token) => {
                let contract = token.address_on(self.chain_id).ok_or_else(|| {
                    EvmError::UnsupportedToken(format!("{} on chain {}", token.symbol, self.chain_id))
                })?;
                let contract = IERC20::new(parse_address(contract)?, self.provider.clone());
                contract
                    .balanceOf(*owner)
                    .call()
                    .await
                    .map_err(|e| EvmError::Rpc(e.to_string()))
            }
        }
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, EvmError> {
        let hash: B256 = tx_hash
            .parse()
            .map_err(|e| EvmError::InvalidResponse(format!("invalid tx hash {tx_hash}: {e}")))?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| EvmError::Rpc(format!("failed to get receipt: {e}")))?;

        Ok(receipt.map(|r| TxReceipt {
            tx_hash: tx_hash.to_string(),
            block_number: r.block_number.unwrap_or(0),
            gas_used: r.gas_used as u64,
            success: r.status(),
        }))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm::types::AVAX_FUJI;

    #[test]
    fn rejects_malformed_rpc_url() {
        assert!(matches!(
            EvmClient::new(AVAX_FUJI, Some("not a url")),
            Err(EvmError::InvalidRpcUrl(_))
        ));
    }

    #[tokio::test]
    async fn client_uses_network_chain_id() {
        let client = EvmClient::new(AVAX_FUJI, None).unwrap();
        assert_eq!(client.chain_id(), 43113);
        assert_eq!(client.network().name, "Avalanche Fuji Testnet");
    }

    #[tokio::test]
    async fn malformed_hash_is_rejected_before_rpc() {
        let client = EvmClient::new(AVAX_FUJI, Some("http://127.0.0.1:1")).unwrap();
        assert!(matches!(
            client.receipt("0x1234").await,
            Err(EvmError::InvalidResponse(_))
        ));
    }
}
