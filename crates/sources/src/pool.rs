//! Concentrated-liquidity pool reader (Uniswap V3 / PancakeSwap V3 layout)

use alloy_primitives::Address;
use alloy_sol_types::sol;
use tracing::debug;

use dexai_core::{Chain, FetchError, FetchResult, V3PoolState};

use crate::rpc::{call3, decode_result, EvmRpcClient};

sol! {
    function slot0() external view returns (
        uint160 sqrtPriceX96,
        int24 tick,
        uint16 observationIndex,
        uint16 observationCardinality,
        uint16 observationCardinalityNext,
        uint32 feeProtocol,
        bool unlocked
    );
    function token0() external view returns (address);
    function token1() external view returns (address);
    function fee() external view returns (uint24);
    function liquidity() external view returns (uint128);
    function decimals() external view returns (uint8);
}

/// Reads pool state over one RPC endpoint
pub struct V3PoolReader<'a> {
    rpc: &'a EvmRpcClient,
    chain: Chain,
}

impl<'a> V3PoolReader<'a> {
    pub fn new(rpc: &'a EvmRpcClient, chain: Chain) -> Self {
        Self { rpc, chain }
    }

    /// Pool state in two multicalls: the pool's own getters, then token decimals
    pub async fn read(&self, pool: Address) -> FetchResult<V3PoolState> {
        let results = self
            .rpc
            .aggregate3(vec![
                call3(pool, &slot0Call {}),
                call3(pool, &token0Call {}),
                call3(pool, &token1Call {}),
                call3(pool, &feeCall {}),
                call3(pool, &liquidityCall {}),
            ])
            .await?;

        let missing = |what: &str| FetchError::Rpc(format!("{pool}: {what}() failed"));
        let slot0 = decode_result::<slot0Call>(&results[0]).ok_or_else(|| missing("slot0"))?;
        let token0 = decode_result::<token0Call>(&results[1]).ok_or_else(|| missing("token0"))?._0;
        let token1 = decode_result::<token1Call>(&results[2]).ok_or_else(|| missing("token1"))?._0;
        let fee = decode_result::<feeCall>(&results[3]).ok_or_else(|| missing("fee"))?._0;
        let liquidity = decode_result::<liquidityCall>(&results[4])
            .ok_or_else(|| missing("liquidity"))?
            ._0;

        let decimals = self
            .rpc
            .aggregate3(vec![call3(token0, &decimalsCall {}), call3(token1, &decimalsCall {})])
            .await?;
        let token0_decimals = decode_result::<decimalsCall>(&decimals[0])
            .ok_or_else(|| missing("token0.decimals"))?
            ._0;
        let token1_decimals = decode_result::<decimalsCall>(&decimals[1])
            .ok_or_else(|| missing("token1.decimals"))?
            ._0;

        let state = V3PoolState {
            address: pool,
            token0,
            token1,
            token0_decimals,
            token1_decimals,
            fee,
            liquidity,
            sqrt_price_x96: slot0.sqrtPriceX96,
            tick: slot0.tick,
            chain: self.chain,
        };
        debug!(
            "{} pool {}: tick {} price {:.8}",
            self.chain,
            pool,
            state.tick,
            state.adjusted_price()
        );
        Ok(state)
    }
}
