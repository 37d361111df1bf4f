//! Chain aliases and well-known token tables
//!
//! Native assets (ETH, BTC, BNB) have no contract on most chains; their
//! wrapped counterparts stand in whenever a contract address is needed.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// EVM networks the clients can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Bsc,
    Polygon,
    Arbitrum,
    Base,
    Optimism,
    Avalanche,
}

impl Chain {
    pub const ALL: [Chain; 7] = [
        Chain::Ethereum,
        Chain::Bsc,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Base,
        Chain::Optimism,
        Chain::Avalanche,
    ];

    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Bsc => 56,
            Chain::Polygon => 137,
            Chain::Arbitrum => 42161,
            Chain::Base => 8453,
            Chain::Optimism => 10,
            Chain::Avalanche => 43114,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Base => "base",
            Chain::Optimism => "optimism",
            Chain::Avalanche => "avalanche",
        }
    }

    /// CoinGecko asset platform id
    pub fn coingecko_platform(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Bsc => "binance-smart-chain",
            Chain::Polygon => "polygon-pos",
            Chain::Arbitrum => "arbitrum-one",
            Chain::Base => "base",
            Chain::Optimism => "optimistic-ethereum",
            Chain::Avalanche => "avalanche",
        }
    }

    /// CoinGecko on-chain (GeckoTerminal) network id
    pub fn coingecko_network(&self) -> &'static str {
        match self {
            Chain::Ethereum => "eth",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon_pos",
            Chain::Arbitrum => "arbitrum",
            Chain::Base => "base",
            Chain::Optimism => "optimism",
            Chain::Avalanche => "avax",
        }
    }

    /// Moralis `chain` query value (hex chain id)
    pub fn moralis_chain(&self) -> String {
        format!("{:#x}", self.chain_id())
    }

    /// Accepts names, short tickers, decimal and hex chain ids and
    /// CoinGecko platform ids.
    pub fn from_alias(alias: &str) -> Option<Chain> {
        let alias = alias.trim().to_lowercase();
        let chain = match alias.as_str() {
            "eth" | "ethereum" | "mainnet" | "0x1" | "1" => Chain::Ethereum,
            "bsc" | "bnb" | "binance-smart-chain" | "0x38" | "56" => Chain::Bsc,
            "polygon" | "matic" | "polygon-pos" | "0x89" | "137" => Chain::Polygon,
            "arbitrum" | "arb" | "arbitrum-one" | "0xa4b1" | "42161" => Chain::Arbitrum,
            "base" | "0x2105" | "8453" => Chain::Base,
            "optimism" | "op" | "optimistic-ethereum" | "0xa" | "10" => Chain::Optimism,
            "avalanche" | "avax" | "0xa86a" | "43114" => Chain::Avalanche,
            _ => return None,
        };
        Some(chain)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resolve a chain alias to a CoinGecko platform id; unknown aliases pass through.
pub fn resolve_platform(chain: &str) -> String {
    Chain::from_alias(chain)
        .map(|c| c.coingecko_platform().to_string())
        .unwrap_or_else(|| chain.trim().to_lowercase())
}

/// Token information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub chain: Chain,
}

impl Token {
    pub fn new(address: Address, symbol: &str, name: &str, decimals: u8, chain: Chain) -> Self {
        Self {
            address,
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            chain,
        }
    }
}

/// Wrapped stand-ins for native assets, keyed by CoinGecko coin id then chain
pub static WRAPPED_NATIVE: LazyLock<HashMap<&'static str, HashMap<Chain, Token>>> =
    LazyLock::new(|| {
        let mut natives = HashMap::new();

        let mut eth = HashMap::new();
        for (chain, addr) in [
            (Chain::Ethereum, address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")),
            (Chain::Arbitrum, address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1")),
            (Chain::Base, address!("4200000000000000000000000000000000000006")),
            (Chain::Optimism, address!("4200000000000000000000000000000000000006")),
            (Chain::Polygon, address!("7ceB23fD6bC0adD59E62ac25578270cFf1b9f619")),
            (Chain::Bsc, address!("2170Ed0880ac9A755fd29B2688956BD959F933F8")),
        ] {
            eth.insert(chain, Token::new(addr, "WETH", "Wrapped Ether", 18, chain));
        }
        natives.insert("ethereum", eth);

        let mut btc = HashMap::new();
        for (chain, addr, decimals) in [
            (Chain::Ethereum, address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"), 8),
            (Chain::Arbitrum, address!("2f2a2543B76A4166549F7aaB2e75Bef0aefC5B0f"), 8),
            (Chain::Polygon, address!("1BFD67037B42Cf73acF2047067bd4F2C47D9BfD6"), 8),
            (Chain::Bsc, address!("7130d2A12B9BCbFAe4f2634d864A1Ee1Ce3Ead9c"), 18),  // BTCB
        ] {
            btc.insert(chain, Token::new(addr, "WBTC", "Wrapped Bitcoin", decimals, chain));
        }
        natives.insert("bitcoin", btc);

        let mut bnb = HashMap::new();
        bnb.insert(
            Chain::Bsc,
            Token::new(
                address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
                "WBNB",
                "Wrapped BNB",
                18,
                Chain::Bsc,
            ),
        );
        natives.insert("binancecoin", bnb);

        natives
    });

/// Whether a CoinGecko coin id is a chain's native asset
pub fn is_native_token(coin_id: &str) -> bool {
    WRAPPED_NATIVE.contains_key(coin_id.to_lowercase().as_str())
}

/// Wrapped stand-in for a native coin on a chain
pub fn wrapped_native(coin_id: &str, chain: Chain) -> Option<&'static Token> {
    WRAPPED_NATIVE.get(coin_id.to_lowercase().as_str())?.get(&chain)
}

/// Perpetual contract symbol quoted in USDT (e.g. "link" -> "LINKUSDT")
pub fn usdt_perp_symbol(token_symbol: &str) -> String {
    format!("{}USDT", token_symbol.trim().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_aliases() {
        assert_eq!(Chain::from_alias("ETH"), Some(Chain::Ethereum));
        assert_eq!(Chain::from_alias("0x1"), Some(Chain::Ethereum));
        assert_eq!(Chain::from_alias("binance-smart-chain"), Some(Chain::Bsc));
        assert_eq!(Chain::from_alias("0xa4b1"), Some(Chain::Arbitrum));
        assert_eq!(Chain::from_alias("solana"), None);
    }

    #[test]
    fn test_resolve_platform() {
        assert_eq!(resolve_platform("eth"), "ethereum");
        assert_eq!(resolve_platform("bsc"), "binance-smart-chain");
        assert_eq!(resolve_platform("Solana"), "solana");
    }

    #[test]
    fn test_moralis_chain_is_hex() {
        assert_eq!(Chain::Ethereum.moralis_chain(), "0x1");
        assert_eq!(Chain::Bsc.moralis_chain(), "0x38");
        assert_eq!(Chain::Arbitrum.moralis_chain(), "0xa4b1");
    }

    #[test]
    fn test_wrapped_native_lookup() {
        assert!(is_native_token("ethereum"));
        assert!(!is_native_token("chainlink"));

        let weth = wrapped_native("ethereum", Chain::Ethereum).unwrap();
        assert_eq!(weth.symbol, "WETH");
        assert_eq!(weth.decimals, 18);

        let btcb = wrapped_native("bitcoin", Chain::Bsc).unwrap();
        assert_eq!(btcb.decimals, 18);
        assert!(wrapped_native("bitcoin", Chain::Base).is_none());
    }

    #[test]
    fn test_perp_symbol() {
        assert_eq!(usdt_perp_symbol(" link "), "LINKUSDT");
    }
}
