// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cross-chain transfer routing.
//!
//! Each supported token has a preferred chain and, when dual-listed, an
//! alternate. A route is possible on a chain only when both parties have a
//! usable wallet there. [`determine_route`] is pure: identical inputs always
//! give identical decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Ledgers a transfer can settle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Primary chain: self-custodied split keys, relay-sponsored fees.
    Solana,
    /// Secondary EVM chain: sponsor-provisioned wallets.
    Avalanche,
}

impl Chain {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Solana => "Solana",
            Self::Avalanche => "Avalanche",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Routing metadata for one token symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRoute {
    pub symbol: &'static str,
    pub preferred: Chain,
    /// Set for dual-listed tokens.
    pub alternate: Option<Chain>,
}

impl TokenRoute {
    fn candidates(&self) -> impl Iterator<Item = Chain> {
        std::iter::once(self.preferred).chain(self.alternate)
    }
}

/// Supported tokens. USDC prefers the primary chain for its lower fees.
pub const TOKEN_ROUTES: &[TokenRoute] = &[
    TokenRoute {
        symbol: "SOL",
        preferred: Chain::Solana,
        alternate: None,
    },
    TokenRoute {
        symbol: "USDC",
        preferred: Chain::Solana,
        alternate: Some(Chain::Avalanche),
    },
    TokenRoute {
        symbol: "AVAX",
        preferred: Chain::Avalanche,
        alternate: None,
    },
    TokenRoute {
        symbol: "rEUR",
        preferred: Chain::Avalanche,
        alternate: None,
    },
];

/// Case-insensitive token lookup.
pub fn token_route(symbol: &str) -> Option<&'static TokenRoute> {
    TOKEN_ROUTES
        .iter()
        .find(|route| route.symbol.eq_ignore_ascii_case(symbol))
}

/// Per-chain wallet availability for one user, derived from their records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletCapability {
    /// Passcode configured and primary-chain address present.
    pub solana: bool,
    /// Sponsor-provisioned secondary-chain wallet present.
    pub avalanche: bool,
}

impl WalletCapability {
    pub fn supports(&self, chain: Chain) -> bool {
        match chain {
            Chain::Solana => self.solana,
            Chain::Avalanche => self.avalanche,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Chosen chain, or the preferred chain when no route exists.
    pub chain: Chain,
    pub possible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Decide which chain a transfer of `token_symbol` should use.
pub fn determine_route(
    token_symbol: &str,
    sender: &WalletCapability,
    recipient: &WalletCapability,
) -> RouteDecision {
    let Some(route) = token_route(token_symbol) else {
        return RouteDecision {
            chain: Chain::Solana,
            possible: false,
            reason: Some(format!("Unsupported token: {token_symbol}")),
        };
    };

    let mut problems = Vec::new();
    for chain in route.candidates() {
        match (sender.supports(chain), recipient.supports(chain)) {
            (true, true) => {
                return RouteDecision {
                    chain,
                    possible: true,
                    reason: None,
                }
            }
            (sender_ok, recipient_ok) => {
                if !sender_ok {
                    problems.push(format!("Sender has no {chain} wallet"));
                }
                if !recipient_ok {
                    problems.push(format!("Recipient cannot receive {} on {chain}", route.symbol));
                }
            }
        }
    }

    RouteDecision {
        chain: route.preferred,
        possible: false,
        reason: Some(problems.join("; ")),
    }
}

/// [`determine_route`], failing with `RouteUnavailable` when no chain works.
pub fn require_route(
    token_symbol: &str,
    sender: &WalletCapability,
    recipient: &WalletCapability,
) -> Result<Chain, WalletError> {
    let decision = determine_route(token_symbol, sender, recipient);
    if decision.possible {
        Ok(decision.chain)
    } else {
        Err(WalletError::RouteUnavailable {
            reason: decision.reason.unwrap_or_else(|| "no route".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: WalletCapability = WalletCapability {
        solana: false,
        avalanche: false,
    };
    const SOLANA_ONLY: WalletCapability = WalletCapability {
        solana: true,
        avalanche: false,
    };
    const AVALANCHE_ONLY: WalletCapability = WalletCapability {
        solana: false,
        avalanche: true,
    };
    const BOTH: WalletCapability = WalletCapability {
        solana: true,
        avalanche: true,
    };

    #[test]
    fn pinned_token_with_sender_on_other_chain_is_unavailable() {
        let decision = determine_route("SOL", &AVALANCHE_ONLY, &BOTH);
        assert!(!decision.possible);
        assert_eq!(decision.chain, Chain::Solana);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("Sender has no Solana wallet"), "{reason}");
        assert!(!reason.contains("Recipient"), "{reason}");

        let err = require_route("SOL", &AVALANCHE_ONLY, &BOTH).unwrap_err();
        assert!(matches!(err, WalletError::RouteUnavailable { ref reason } if reason.contains("Sender")));
    }

    #[test]
    fn dual_listed_token_falls_back_to_alternate() {
        let decision = determine_route("USDC", &AVALANCHE_ONLY, &AVALANCHE_ONLY);
        assert_eq!(
            decision,
            RouteDecision {
                chain: Chain::Avalanche,
                possible: true,
                reason: None
            }
        );
    }

    #[test]
    fn dual_listed_token_prefers_primary_chain() {
        let decision = determine_route("usdc", &BOTH, &BOTH);
        assert_eq!(decision.chain, Chain::Solana);
        assert!(decision.possible);
    }

    #[test]
    fn recipient_gap_is_reported_separately() {
        let decision = determine_route("rEUR", &BOTH, &SOLANA_ONLY);
        assert!(!decision.possible);
        assert_eq!(decision.chain, Chain::Avalanche);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Recipient cannot receive rEUR on Avalanche")
        );
    }

    #[test]
    fn dual_listed_failure_names_both_chains() {
        let decision = determine_route("USDC", &SOLANA_ONLY, &AVALANCHE_ONLY);
        assert!(!decision.possible);
        assert_eq!(decision.chain, Chain::Solana);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("Recipient cannot receive USDC on Solana"));
        assert!(reason.contains("Sender has no Avalanche wallet"));
    }

    #[test]
    fn unknown_token_is_not_routable() {
        let decision = determine_route("DOGE", &BOTH, &BOTH);
        assert!(!decision.possible);
        assert_eq!(decision.reason.as_deref(), Some("Unsupported token: DOGE"));
    }

    #[test]
    fn routing_is_deterministic() {
        for symbol in ["SOL", "USDC", "AVAX", "rEUR", "XYZ"] {
            for sender in [NONE, SOLANA_ONLY, AVALANCHE_ONLY, BOTH] {
                for recipient in [NONE, SOLANA_ONLY, AVALANCHE_ONLY, BOTH] {
                    assert_eq!(
                        determine_route(symbol, &sender, &recipient),
                        determine_route(symbol, &sender, &recipient)
                    );
                }
            }
        }
    }

    #[test]
    fn chain_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Chain::Solana).unwrap(), "\"solana\"");
        assert_eq!(
            serde_json::from_str::<Chain>("\"avalanche\"").unwrap(),
            Chain::Avalanche
        );
    }
}
