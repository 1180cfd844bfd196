// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC access to the primary chain.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::{Hash, LedgerError, Pubkey, Signature, Transaction};

const COMMITMENT: &str = "confirmed";

/// Settlement state of a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Processed,
    Confirmed,
    Finalized,
    /// Landed on chain but the program returned an error.
    Failed(String),
}

impl SignatureStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Finalized)
    }
}

/// The primary-chain operations the relay depends on.
///
/// Kept as a trait so tests can swap in an in-memory ledger.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, LedgerError>;

    /// Native balance in lamports.
    async fn native_balance(&self, address: &Pubkey) -> Result<u64, LedgerError>;

    /// Token account balance in base units; zero when the account does not exist.
    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64, LedgerError>;

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, LedgerError>;

    /// `None` when the node has not seen the signature.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError>;
}

/// HTTP JSON-RPC client with an explicit per-request timeout.
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: url::Url,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Deserialize)]
struct TokenAmountValue {
    amount: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusValue {
    err: Option<Value>,
    confirmation_status: Option<String>,
}

impl JsonRpcClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| LedgerError::InvalidRpcUrl(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(Self { http, url })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(LedgerError::Transport(format!("{method}: HTTP {status}")));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{method}: {e}")))?;

        match (parsed.result, parsed.error) {
            (_, Some(error)) => Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(LedgerError::InvalidResponse(format!(
                "{method}: response has neither result nor error"
            ))),
        }
    }
}

#[async_trait]
impl LedgerRpc for JsonRpcClient {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        let response: WithContext<BlockhashValue> = self
            .call("getLatestBlockhash", json!([{ "commitment": COMMITMENT }]))
            .await?;
        response.value.blockhash.parse()
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, LedgerError> {
        let response: WithContext<Option<Value>> = self
            .call(
                "getAccountInfo",
                json!([address.to_string(), { "encoding": "base64", "commitment": COMMITMENT }]),
            )
            .await?;
        Ok(response.value.is_some())
    }

    async fn native_balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        let response: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address.to_string(), { "commitment": COMMITMENT }]),
            )
            .await?;
        Ok(response.value)
    }

    async fn token_balance(&self, token_account: &Pubkey) -> Result<u64, LedgerError> {
        let result: Result<WithContext<TokenAmountValue>, _> = self
            .call(
                "getTokenAccountBalance",
                json!([token_account.to_string(), { "commitment": COMMITMENT }]),
            )
            .await;

        match result {
            Ok(response) => response.value.amount.parse().map_err(|_| {
                LedgerError::InvalidResponse(format!(
                    "token amount is not an integer: {}",
                    response.value.amount
                ))
            }),
            Err(LedgerError::Rpc { message, .. }) if is_missing_account(&message) => Ok(0),
            Err(e) => Err(e),
        }
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    transaction.to_base64(),
                    { "encoding": "base64", "preflightCommitment": COMMITMENT }
                ]),
            )
            .await?;
        signature.parse()
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        let response: WithContext<Vec<Option<StatusValue>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": true }]),
            )
            .await?;

        let Some(Some(status)) = response.value.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(parse_status(status)))
    }
}

fn parse_status(status: StatusValue) -> SignatureStatus {
    if let Some(err) = status.err {
        return SignatureStatus::Failed(err.to_string());
    }
    match status.confirmation_status.as_deref() {
        Some("finalized") => SignatureStatus::Finalized,
        Some("confirmed") => SignatureStatus::Confirmed,
        _ => SignatureStatus::Processed,
    }
}

fn is_missing_account(message: &str) -> bool {
    message.to_ascii_lowercase().contains("could not find account")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_url() {
        assert!(matches!(
            JsonRpcClient::new("not a url", Duration::from_secs(1)),
            Err(LedgerError::InvalidRpcUrl(_))
        ));
        assert!(JsonRpcClient::new("https://api.devnet.solana.com", Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn status_parsing() {
        let parse = |v: Value| parse_status(serde_json::from_value(v).unwrap());

        assert_eq!(
            parse(json!({ "err": null, "confirmationStatus": "finalized" })),
            SignatureStatus::Finalized
        );
        assert_eq!(
            parse(json!({ "err": null, "confirmationStatus": "confirmed" })),
            SignatureStatus::Confirmed
        );
        assert_eq!(
            parse(json!({ "err": null, "confirmationStatus": "processed" })),
            SignatureStatus::Processed
        );
        assert!(matches!(
            parse(json!({ "err": { "InstructionError": [0, "Custom"] }, "confirmationStatus": "confirmed" })),
            SignatureStatus::Failed(_)
        ));
    }

    #[test]
    fn response_envelope_parsing() {
        let ok: RpcResponse<WithContext<u64>> =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 1, "result": { "context": { "slot": 1 }, "value": 42 } }))
                .unwrap();
        assert_eq!(ok.result.unwrap().value, 42);

        let err: RpcResponse<WithContext<u64>> = serde_json::from_value(
            json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32602, "message": "Invalid param: could not find account" } }),
        )
        .unwrap();
        let error = err.error.unwrap();
        assert_eq!(error.code, -32602);
        assert!(is_missing_account(&error.message));
    }
}
