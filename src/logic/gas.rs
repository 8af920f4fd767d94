use crate::logic::math::{apply_bps, mul_div, mul_div_ceil};
use crate::utils::constants::{BPS, USD_SCALE};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::warn;

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    SimpleSwap,
    MultiHop,
    FlashSwap,
    FlashLoan,
}

/// Gas costs for one chain. Base costs include the first hop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasTable {
    pub chain_id: u64,
    pub simple_swap: u64,
    pub multi_hop: u64,
    pub flash_swap: u64,
    pub flash_loan: u64,
    pub per_extra_hop: u64,
}

impl GasTable {
    pub fn mainnet() -> Self {
        Self { chain_id: 1, simple_swap: 130_000, multi_hop: 150_000, flash_swap: 220_000, flash_loan: 370_000, per_extra_hop: 120_000 }
    }

    pub fn arbitrum() -> Self {
        Self { chain_id: 42_161, simple_swap: 700_000, multi_hop: 800_000, flash_swap: 1_000_000, flash_loan: 1_300_000, per_extra_hop: 450_000 }
    }

    pub fn base_cost(&self, execution_type: ExecutionType) -> u64 {
        match execution_type {
            ExecutionType::SimpleSwap => self.simple_swap,
            ExecutionType::MultiHop => self.multi_hop,
            ExecutionType::FlashSwap => self.flash_swap,
            ExecutionType::FlashLoan => self.flash_loan,
        }
    }

    /// Unbuffered gas units for `hops` swaps executed as `execution_type`.
    pub fn estimate(&self, hops: usize, execution_type: ExecutionType) -> u64 {
        let extra_hops = hops.saturating_sub(1) as u64;
        self.base_cost(execution_type).saturating_add(self.per_extra_hop.saturating_mul(extra_hops))
    }
}

impl Default for GasTable {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Safety multiplier on every estimate, 12000 = 1.2x.
    pub buffer_bps: u32,
    /// Used when the chain client cannot report a gas price.
    pub fallback_gas_price_wei: u128,
    pub tables: Vec<GasTable>,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self { buffer_bps: 12_000, fallback_gas_price_wei: 30_000_000_000, tables: vec![GasTable::mainnet(), GasTable::arbitrum()] }
    }
}

impl GasConfig {
    pub fn table_for(&self, chain_id: u64) -> Option<&GasTable> {
        self.tables.iter().find(|t| t.chain_id == chain_id)
    }

    /// Buffered gas units. Chains without a table use mainnet costs.
    pub fn estimate(&self, hops: usize, chain_id: u64, execution_type: ExecutionType) -> u64 {
        let units = match self.table_for(chain_id) {
            Some(table) => table.estimate(hops, execution_type),
            None => {
                warn!(chain_id, "no gas table for chain, using mainnet costs");
                GasTable::mainnet().estimate(hops, execution_type)
            }
        };
        self.apply_buffer(units)
    }

    pub fn apply_buffer(&self, units: u64) -> u64 {
        buffered(units, self.buffer_bps)
    }
}

/// Prices needed to express gas in units of a token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GasQuote {
    pub gas_price_wei: u128,
    /// USD per native coin, 1e18 scaled.
    pub native_usd_price: U256,
    /// USD per whole token, 1e18 scaled.
    pub token_usd_price: U256,
    pub token_decimals: u8,
}

impl GasQuote {
    pub fn native_cost_wei(&self, gas_units: u64) -> U256 {
        U256::from(gas_units) * U256::from(self.gas_price_wei)
    }

    /// Cost of `gas_units` in the token's smallest unit, rounded up.
    /// `None` when the token has no price.
    pub fn cost_in_token(&self, gas_units: u64) -> Option<U256> {
        let native_wei = self.native_cost_wei(gas_units);
        let token_exp = U256::from(10u64).pow(U256::from(self.token_decimals));
        let usd_value = native_wei.checked_mul(self.native_usd_price)?;
        let denominator = USD_SCALE.checked_mul(self.token_usd_price)?;
        mul_div_ceil(usd_value, token_exp, denominator)
    }

    /// USD value of `amount` smallest units of the token, 1e18 scaled.
    pub fn token_value_usd(&self, amount: U256) -> U256 {
        let token_exp = U256::from(10u64).pow(U256::from(self.token_decimals));
        mul_div(amount, self.token_usd_price, token_exp).unwrap_or(U256::MAX)
    }
}

/// Gas buffer applied to an on-chain estimate.
pub fn buffered(units: u64, buffer_bps: u32) -> u64 {
    apply_bps(U256::from(units), buffer_bps.max(BPS)).saturating_to::<u64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e18(value: u64) -> U256 {
        U256::from(value) * USD_SCALE
    }

    #[test]
    fn test_flash_loan_costs_more_than_multi_hop() {
        let table = GasTable::mainnet();
        assert!(table.estimate(3, ExecutionType::FlashLoan) > table.estimate(3, ExecutionType::MultiHop));
        assert_eq!(table.estimate(1, ExecutionType::FlashLoan), 370_000);
        assert_eq!(table.estimate(3, ExecutionType::FlashLoan), 610_000);
    }

    #[test]
    fn test_buffer_and_unknown_chain() {
        let config = GasConfig::default();
        assert_eq!(config.estimate(1, 1, ExecutionType::SimpleSwap), 156_000);
        assert_eq!(config.estimate(1, 999, ExecutionType::SimpleSwap), 156_000);
        assert_eq!(config.estimate(1, 42_161, ExecutionType::SimpleSwap), 840_000);
        assert_eq!(buffered(100_000, 12_000), 120_000);
        assert_eq!(buffered(100_000, 5_000), 100_000);
    }

    #[test]
    fn test_gas_cost_in_usdc() {
        // 200k gas at 50 gwei with ETH at $2000 is $20
        let quote = GasQuote { gas_price_wei: 50_000_000_000, native_usd_price: e18(2_000), token_usd_price: e18(1), token_decimals: 6 };
        assert_eq!(quote.cost_in_token(200_000), Some(U256::from(20_000_000u64)));
    }

    #[test]
    fn test_gas_cost_in_native_token() {
        let quote = GasQuote { gas_price_wei: 10, native_usd_price: e18(2_000), token_usd_price: e18(2_000), token_decimals: 18 };
        assert_eq!(quote.cost_in_token(7), Some(U256::from(70u64)));
    }

    #[test]
    fn test_unpriced_token() {
        let quote = GasQuote { gas_price_wei: 10, native_usd_price: e18(2_000), token_usd_price: U256::ZERO, token_decimals: 18 };
        assert_eq!(quote.cost_in_token(7), None);
    }

    #[test]
    fn test_cost_is_monotonic_in_gas_price() {
        let mut previous = U256::ZERO;
        for gwei in [1u128, 2, 5, 10, 50, 100, 500] {
            let quote = GasQuote { gas_price_wei: gwei * 1_000_000_000, native_usd_price: e18(3_100), token_usd_price: e18(1), token_decimals: 6 };
            let cost = quote.cost_in_token(250_000).unwrap_or(U256::MAX);
            assert!(cost >= previous);
            previous = cost;
        }
    }
}
