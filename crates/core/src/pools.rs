//! Concentrated-liquidity (Uniswap/PancakeSwap V3) pool math

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::Chain;

/// Base of the tick price curve: price = 1.0001^tick
pub const TICK_BASE: f64 = 1.0001;

fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(0.0)
}

/// token1 per token0 at a tick, in raw units
pub fn tick_to_price(tick: i32) -> f64 {
    TICK_BASE.powi(tick)
}

/// token1 per token0 from a Q64.96 square-root price, in raw units
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256) -> f64 {
    let sqrt_price = u256_to_f64(sqrt_price_x96);
    let q96: f64 = 2f64.powi(96);
    (sqrt_price / q96).powi(2)
}

/// Nearest tick at or below a raw price
pub fn price_to_tick(price: f64) -> Option<i32> {
    if !(price.is_finite() && price > 0.0) {
        return None;
    }
    Some((price.ln() / TICK_BASE.ln()).floor() as i32)
}

/// Scale a raw token1/token0 ratio into human units
pub fn decimal_adjustment(token0_decimals: u8, token1_decimals: u8) -> f64 {
    10f64.powi(token0_decimals as i32 - token1_decimals as i32)
}

/// The token0/token1 ratio computed three ways, for cross-checking precision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRatios {
    pub token_ratio_from_tick: f64,
    pub token_ratio_from_sqrt_price: f64,
    pub adjusted_token_ratio: f64,
}

pub fn calculate_token_ratios(
    current_tick: i32,
    sqrt_price_x96: U256,
    token0_decimals: u8,
    token1_decimals: u8,
) -> TokenRatios {
    let token_ratio_from_tick = tick_to_price(current_tick);
    let token_ratio_from_sqrt_price = sqrt_price_x96_to_price(sqrt_price_x96);

    TokenRatios {
        token_ratio_from_tick,
        token_ratio_from_sqrt_price,
        adjusted_token_ratio: token_ratio_from_sqrt_price
            * decimal_adjustment(token0_decimals, token1_decimals),
    }
}

/// Uniswap V3 style pool (concentrated liquidity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V3PoolState {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    pub fee: u32,           // Fee in hundredths of a bip (e.g., 3000 = 0.3%)
    pub liquidity: u128,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub chain: Chain,
}

impl V3PoolState {
    /// Fee tiers
    pub const FEE_LOWEST: u32 = 100;    // 0.01%
    pub const FEE_LOW: u32 = 500;       // 0.05%
    pub const FEE_MEDIUM: u32 = 3000;   // 0.3%
    pub const FEE_HIGH: u32 = 10000;    // 1%

    /// Raw token1 per token0 from sqrtPriceX96
    pub fn current_price(&self) -> f64 {
        sqrt_price_x96_to_price(self.sqrt_price_x96)
    }

    /// token1 per token0 in human units
    pub fn adjusted_price(&self) -> f64 {
        self.current_price() * decimal_adjustment(self.token0_decimals, self.token1_decimals)
    }

    pub fn ratios(&self) -> TokenRatios {
        calculate_token_ratios(
            self.tick,
            self.sqrt_price_x96,
            self.token0_decimals,
            self.token1_decimals,
        )
    }

    /// Get fee as percentage
    pub fn fee_percent(&self) -> f64 {
        self.fee as f64 / 10_000.0
    }
}
