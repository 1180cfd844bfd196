// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into a
//! [`Config`] and passed down explicitly.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for wallet, link, relay and audit files | `/data` |
//! | `PRIMARY_RPC_URL` | Primary chain JSON-RPC endpoint | `https://api.devnet.solana.com` |
//! | `PRIMARY_RPC_TIMEOUT_SECS` | Per-request timeout for primary chain calls | `15` |
//! | `PRIMARY_USDC_MINT` | USDC mint on the primary chain | devnet USDC mint |
//! | `RELAY_SECRET_KEY` | Base58 relay key (32-byte seed or 64-byte keypair) | generated into `DATA_DIR` |
//! | `EVM_RPC_URL` | Secondary chain RPC endpoint | network default |
//! | `EVM_CHAIN_ID` | Secondary chain id (`43113` Fuji, `43114` mainnet) | `43113` |
//! | `SPONSOR_API_URL` | Sponsored-transaction service base URL | secondary chain disabled |
//! | `SPONSOR_API_KEY` | Sponsored-transaction service API key | Required with `SPONSOR_API_URL` |
//! | `LINK_OTP_PEPPER` | Server secret keying one-time code hashes | Required |
//! | `RECONCILE_INTERVAL_SECS` | Reconciler tick interval | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |
//!
//! ## Data Directory
//!
//! Records under `DATA_DIR` are plain files. The service does not encrypt
//! the directory itself, so it must sit on an encrypted volume. Wallet
//! shares are sealed under passcode-derived keys, but a generated relay
//! seed is written raw to `relay/key.bin` with mode `0600`. Supply
//! `RELAY_SECRET_KEY` to keep the seed off disk.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::evm::types::{network_for_chain_id, NetworkConfig, AVAX_FUJI};
use crate::ledger::Pubkey;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const PRIMARY_RPC_URL_ENV: &str = "PRIMARY_RPC_URL";
pub const PRIMARY_RPC_TIMEOUT_ENV: &str = "PRIMARY_RPC_TIMEOUT_SECS";
pub const PRIMARY_USDC_MINT_ENV: &str = "PRIMARY_USDC_MINT";
pub const RELAY_SECRET_KEY_ENV: &str = "RELAY_SECRET_KEY";
pub const EVM_RPC_URL_ENV: &str = "EVM_RPC_URL";
pub const EVM_CHAIN_ID_ENV: &str = "EVM_CHAIN_ID";
pub const SPONSOR_API_URL_ENV: &str = "SPONSOR_API_URL";
pub const SPONSOR_API_KEY_ENV: &str = "SPONSOR_API_KEY";
pub const LINK_OTP_PEPPER_ENV: &str = "LINK_OTP_PEPPER";
pub const RECONCILE_INTERVAL_ENV: &str = "RECONCILE_INTERVAL_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_PRIMARY_RPC_URL: &str = "https://api.devnet.solana.com";
pub const DEFAULT_PRIMARY_USDC_MINT: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("expected `json` or `pretty`, got `{other}`")),
        }
    }
}

/// Secrets are held in `Zeroizing` buffers; neither struct implements `Debug`.
#[derive(Clone)]
pub struct EvmConfig {
    pub network: NetworkConfig,
    /// Overrides the network's default endpoint.
    pub rpc_url: Option<String>,
    pub sponsor_api_url: String,
    pub sponsor_api_key: Zeroizing<String>,
}

#[derive(Clone)]
pub struct Config {
    /// Must be on an encrypted volume; see the module docs.
    pub data_dir: PathBuf,
    pub primary_rpc_url: String,
    pub rpc_timeout: Duration,
    pub primary_usdc_mint: Pubkey,
    pub relay_secret_key: Option<Zeroizing<String>>,
    /// `None` disables the secondary chain.
    pub evm: Option<EvmConfig>,
    pub link_otp_pepper: Zeroizing<String>,
    pub reconcile_interval: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let link_otp_pepper = get(LINK_OTP_PEPPER_ENV)
            .map(Zeroizing::new)
            .ok_or(ConfigError::Missing(LINK_OTP_PEPPER_ENV))?;

        let rpc_timeout = Duration::from_secs(parse_or(
            get(PRIMARY_RPC_TIMEOUT_ENV),
            PRIMARY_RPC_TIMEOUT_ENV,
            DEFAULT_RPC_TIMEOUT_SECS,
        )?);
        let reconcile_interval = Duration::from_secs(parse_or(
            get(RECONCILE_INTERVAL_ENV),
            RECONCILE_INTERVAL_ENV,
            DEFAULT_RECONCILE_INTERVAL_SECS,
        )?);
        if rpc_timeout.is_zero() || reconcile_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: if rpc_timeout.is_zero() {
                    PRIMARY_RPC_TIMEOUT_ENV
                } else {
                    RECONCILE_INTERVAL_ENV
                },
                reason: "must be at least 1 second".into(),
            });
        }

        let primary_usdc_mint = get(PRIMARY_USDC_MINT_ENV)
            .unwrap_or_else(|| DEFAULT_PRIMARY_USDC_MINT.into())
            .parse::<Pubkey>()
            .map_err(|e| ConfigError::Invalid {
                name: PRIMARY_USDC_MINT_ENV,
                reason: e.to_string(),
            })?;

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                reason,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into())),
            primary_rpc_url: get(PRIMARY_RPC_URL_ENV)
                .unwrap_or_else(|| DEFAULT_PRIMARY_RPC_URL.into()),
            rpc_timeout,
            primary_usdc_mint,
            relay_secret_key: get(RELAY_SECRET_KEY_ENV).map(Zeroizing::new),
            evm: evm_config(&get)?,
            link_otp_pepper,
            reconcile_interval,
            log_format,
        })
    }
}

fn evm_config(get: &dyn Fn(&str) -> Option<String>) -> Result<Option<EvmConfig>, ConfigError> {
    let Some(sponsor_api_url) = get(SPONSOR_API_URL_ENV) else {
        return Ok(None);
    };
    let sponsor_api_key = get(SPONSOR_API_KEY_ENV).ok_or(ConfigError::Missing(SPONSOR_API_KEY_ENV))?;

    let chain_id = parse_or(get(EVM_CHAIN_ID_ENV), EVM_CHAIN_ID_ENV, AVAX_FUJI.chain_id)?;
    let network = network_for_chain_id(chain_id)
        .cloned()
        .ok_or_else(|| ConfigError::Invalid {
            name: EVM_CHAIN_ID_ENV,
            reason: format!("unsupported chain id {chain_id}"),
        })?;

    Ok(Some(EvmConfig {
        network,
        rpc_url: get(EVM_RPC_URL_ENV),
        sponsor_api_url,
        sponsor_api_key: Zeroizing::new(sponsor_api_key),
    }))
}

fn parse_or<T: FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_pepper_is_set() {
        let cfg = config(&[(LINK_OTP_PEPPER_ENV, "pepper")]).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/data"));
        assert_eq!(cfg.primary_rpc_url, DEFAULT_PRIMARY_RPC_URL);
        assert_eq!(cfg.rpc_timeout, Duration::from_secs(15));
        assert_eq!(cfg.reconcile_interval, Duration::from_secs(30));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.primary_usdc_mint.to_string(), DEFAULT_PRIMARY_USDC_MINT);
        assert!(cfg.relay_secret_key.is_none());
        assert!(cfg.evm.is_none());
    }

    #[test]
    fn pepper_is_required() {
        assert!(matches!(
            config(&[(LINK_OTP_PEPPER_ENV, "  ")]),
            Err(ConfigError::Missing(LINK_OTP_PEPPER_ENV))
        ));
    }

    #[test]
    fn sponsor_url_requires_key_and_known_chain() {
        let base = [
            (LINK_OTP_PEPPER_ENV, "pepper"),
            (SPONSOR_API_URL_ENV, "https://sponsor.test"),
        ];
        assert!(matches!(
            config(&base),
            Err(ConfigError::Missing(SPONSOR_API_KEY_ENV))
        ));

        let mut vars = base.to_vec();
        vars.push((SPONSOR_API_KEY_ENV, "key"));
        let evm = config(&vars).unwrap().evm.unwrap();
        assert_eq!(evm.network.chain_id, 43113);
        assert_eq!(evm.rpc_url, None);

        vars.push((EVM_CHAIN_ID_ENV, "1"));
        assert!(matches!(
            config(&vars),
            Err(ConfigError::Invalid { name: EVM_CHAIN_ID_ENV, .. })
        ));
    }

    #[test]
    fn invalid_numbers_and_formats_are_reported() {
        assert!(matches!(
            config(&[(LINK_OTP_PEPPER_ENV, "p"), (PRIMARY_RPC_TIMEOUT_ENV, "soon")]),
            Err(ConfigError::Invalid { name: PRIMARY_RPC_TIMEOUT_ENV, .. })
        ));
        assert!(matches!(
            config(&[(LINK_OTP_PEPPER_ENV, "p"), (RECONCILE_INTERVAL_ENV, "0")]),
            Err(ConfigError::Invalid { name: RECONCILE_INTERVAL_ENV, .. })
        ));
        assert!(matches!(
            config(&[(LINK_OTP_PEPPER_ENV, "p"), (PRIMARY_USDC_MINT_ENV, "0xabc")]),
            Err(ConfigError::Invalid { name: PRIMARY_USDC_MINT_ENV, .. })
        ));
        assert!(matches!(
            config(&[(LINK_OTP_PEPPER_ENV, "p"), (LOG_FORMAT_ENV, "xml")]),
            Err(ConfigError::Invalid { name: LOG_FORMAT_ENV, .. })
        ));
        assert_eq!(
            config(&[(LINK_OTP_PEPPER_ENV, "p"), (LOG_FORMAT_ENV, "JSON")])
                .unwrap()
                .log_format,
            LogFormat::Json
        );
    }
}
