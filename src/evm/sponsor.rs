// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sponsored-transaction service for the secondary chain.
//!
//! The sponsor holds users' EVM keys and pays their gas. This crate only
//! asks it to provision wallets and to execute calls from them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::erc20::{parse_address, EvmCall};
use super::EvmError;
use alloy::primitives::Address;

/// Secondary chain operations delegated to the sponsor.
#[async_trait]
pub trait SponsoredRelay: Send + Sync {
    /// Create (or return the existing) custodial wallet for `user_id`.
    async fn provision_wallet(&self, user_id: &str) -> Result<Address, EvmError>;

    /// Execute `call` from `wallet`. Returns the transaction hash.
    ///
    /// `idempotency_key` makes retries of the same logical transfer safe.
    async fn execute(
        &self,
        chain_id: u64,
        wallet: &Address,
        call: &EvmCall,
        idempotency_key: &str,
    ) -> Result<String, EvmError>;
}

#[derive(Debug, Clone)]
pub struct SponsoredRelayClient {
    base_url: String,
    api_key: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct WalletResponse {
    address: String,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SponsoredRelayClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, EvmError> {
        url::Url::parse(base_url).map_err(|e| EvmError::InvalidRpcUrl(e.to_string()))?;
        if api_key.trim().is_empty() {
            return Err(EvmError::Sponsor("API key is empty".into()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EvmError::Sponsor(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    async fn post_json(
        &self,
        path: &str,
        payload: &Value,
        idempotency_key: Option<&str>,
    ) -> Result<Value, EvmError> {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(payload);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EvmError::Sponsor(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EvmError::Sponsor(format!(
                "POST {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EvmError::InvalidResponse(format!("POST {path} invalid JSON: {e}")))
    }
}

#[async_trait]
impl SponsoredRelay for SponsoredRelayClient {
    async fn provision_wallet(&self, user_id: &str) -> Result<Address, EvmError> {
        let response = self
            .post_json("/v1/wallets", &json!({ "user_id": user_id }), Some(user_id))
            .await?;
        let address = parse_wallet_response(response)?;
        info!(user_id, %address, "secondary wallet provisioned");
        Ok(address)
    }

    async fn execute(
        &self,
        chain_id: u64,
        wallet: &Address,
        call: &EvmCall,
        idempotency_key: &str,
    ) -> Result<String, EvmError> {
        let payload = execute_payload(chain_id, wallet, call);
        debug!(%wallet, to = %call.to, chain_id, "submitting sponsored call");
        let response = self
            .post_json("/v1/transactions", &payload, Some(idempotency_key))
            .await?;
        parse_execute_response(response)
    }
}

fn execute_payload(chain_id: u64, wallet: &Address, call: &EvmCall) -> Value {
    json!({
        "chain_id": chain_id,
        "wallet_address": wallet.to_checksum(None),
        "to": call.to.to_checksum(None),
        "value": call.value.to_string(),
        "data": format!("0x{}", alloy::primitives::hex::encode(&call.data)),
    })
}

fn parse_wallet_response(response: Value) -> Result<Address, EvmError> {
    let parsed: WalletResponse = serde_json::from_value(response)
        .map_err(|e| EvmError::InvalidResponse(format!("wallet response: {e}")))?;
    parse_address(&parsed.address)
}

fn parse_execute_response(response: Value) -> Result<String, EvmError> {
    let parsed: ExecuteResponse = serde_json::from_value(response)
        .map_err(|e| EvmError::InvalidResponse(format!("transaction response: {e}")))?;

    let status = parsed
        .status
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();
    if matches!(status.as_str(), "failed" | "rejected" | "reverted") {
        return Err(EvmError::Rejected(
            parsed.error.unwrap_or_else(|| format!("sponsor reported {status}")),
        ));
    }
    parsed
        .tx_hash
        .filter(|hash| !hash.trim().is_empty())
        .ok_or_else(|| EvmError::InvalidResponse("missing tx_hash in response".into()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, U256};

    #[test]
    fn payload_encodes_call() {
        let wallet = parse_address("0x00000000000000000000000000000000000000a1").unwrap();
        let call = EvmCall {
            to: parse_address("0x00000000000000000000000000000000000000b2").unwrap(),
            value: U256::from(5u64),
            data: Bytes::from(vec![0xa9, 0x05]),
        };
        let payload = execute_payload(43113, &wallet, &call);
        assert_eq!(payload["chain_id"], 43113);
        assert_eq!(payload["value"], "5");
        assert_eq!(payload["data"], "0xa905");
        assert!(payload["to"]
            .as_str()
            .unwrap()
            .eq_ignore_ascii_case("0x00000000000000000000000000000000000000b2"));
    }

    #[test]
    fn execute_response_requires_hash() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(
            parse_execute_response(json!({ "tx_hash": hash, "status": "submitted" })).unwrap(),
            hash
        );
        assert!(matches!(
            parse_execute_response(json!({ "status": "pending" })),
            Err(EvmError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_execute_response(json!({ "status": "FAILED", "error": "insufficient balance" })),
            Err(EvmError::Rejected(ref reason)) if reason == "insufficient balance"
        ));
    }

    #[test]
    fn wallet_response_is_validated() {
        let address = parse_wallet_response(json!({
            "address": "0x00000000000000000000000000000000000000c3"
        }))
        .unwrap();
        assert_eq!(address.0[19], 0xc3);
        assert!(parse_wallet_response(json!({ "address": "nope" })).is_err());
        assert!(parse_wallet_response(json!({})).is_err());
    }

    #[test]
    fn client_requires_valid_configuration() {
        assert!(SponsoredRelayClient::new("not a url", "key", Duration::from_secs(1)).is_err());
        assert!(SponsoredRelayClient::new("https://sponsor.test", " ", Duration::from_secs(1)).is_err());
        assert!(SponsoredRelayClient::new("https://sponsor.test/", "key", Duration::from_secs(1)).is_ok());
    }
}
