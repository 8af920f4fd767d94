use crate::logic::math::ratio_bps;
use crate::logic::pools::PoolId;
use crate::logic::types::ArbitrageHop;
use crate::utils::constants::BPS;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageConfig {
    pub base_bps: u32,
    /// Multiplier on price impact, 10000 = 1x.
    pub price_impact_multiplier_bps: u32,
    /// Extra tolerance for state moving between simulation and inclusion.
    pub mev_buffer_bps: u32,
    pub max_bps: u32,
    /// Used for `minOut` when a path was never evaluated.
    pub default_tolerance_bps: u32,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self { base_bps: 10, price_impact_multiplier_bps: BPS, mev_buffer_bps: 20, max_bps: 300, default_tolerance_bps: 100 }
    }
}

impl SlippageConfig {
    /// `min(priceImpact * multiplier + mevBuffer + base, max)`. Unknown price impact means maximum slippage.
    pub fn slippage_bps(&self, price_impact_bps: Option<u32>) -> u32 {
        let Some(impact) = price_impact_bps else {
            return self.max_bps;
        };
        let scaled_impact = impact as u64 * self.price_impact_multiplier_bps as u64 / BPS as u64;
        let total = scaled_impact + self.mev_buffer_bps as u64 + self.base_bps as u64;
        total.min(self.max_bps as u64) as u32
    }
}

/// Worst per-hop price impact `amountIn / liquidityIn` over the path, or the first pool with no liquidity.
pub fn path_price_impact_bps(hops: &[ArbitrageHop]) -> Result<u32, PoolId> {
    let mut worst = 0;
    for hop in hops {
        let liquidity = hop.pool.get_liquidity(&hop.token_in).map_err(|_| hop.pool.get_pool_id())?;
        let impact = ratio_bps(hop.amount_in, liquidity, BPS).ok_or(hop.pool.get_pool_id())?;
        worst = worst.max(impact);
    }
    Ok(worst)
}
