use super::gas::GasQuote;
use super::graph::PathHash;
use super::math::apply_bps;
use super::pools::{PoolId, PoolWrapper};
use crate::data_sync::RiskSnapshot;
use crate::errors::ArbError;
use crate::logic::math::mul_div_ceil;
use crate::utils::constants::BPS_U256;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

/// One swap of a path with concrete amounts.
#[derive(Clone, Debug, PartialEq)]
pub struct ArbitrageHop {
    pub pool: PoolWrapper,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
}

impl ArbitrageHop {
    /// Quotes `amount_in` of `token_in` through `pool`.
    pub fn quote(pool: PoolWrapper, token_in: Address, token_out: Address, amount_in: U256) -> Result<(Self, u64), ArbError> {
        let (amount_out, gas) = pool.calculate_out_amount(&token_in, &token_out, amount_in)?;
        Ok((Self { pool, token_in, token_out, amount_in, amount_out }, gas))
    }
}

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FlashLoanProvider {
    AaveV3 = 0,
    BalancerV2 = 1,
    UniswapV3 = 2,
}

impl FlashLoanProvider {
    pub fn discriminant(&self) -> u8 {
        *self as u8
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashLoanConfig {
    pub provider: FlashLoanProvider,
    pub fee_bps: u32,
}

impl FlashLoanConfig {
    /// Premium owed on `amount`, rounded up as lenders do.
    pub fn fee_for(&self, amount: U256) -> U256 {
        mul_div_ceil(amount, U256::from(self.fee_bps), BPS_U256).unwrap_or(U256::MAX)
    }
}

/// A cycle of hops starting and ending at `start_token`.
///
/// Construction checks that every hop consumes what the previous one produced and
/// that no pool is used twice. Tokens may repeat.
#[derive(Clone, Debug)]
pub struct ArbitragePath {
    pub hash: PathHash,
    pub start_token: Address,
    pub hops: Vec<ArbitrageHop>,
    pub input_amount: U256,
    pub final_amount: U256,
    /// `final - input`, zero when the cycle loses value.
    pub estimated_profit: U256,
    pub total_gas_estimate: u64,
    /// Gas in start token units, zero until priced.
    pub total_gas_cost: U256,
    pub net_profit: U256,
    /// Pool fees in start token units, valued at the entry amount.
    pub total_fees: U256,
    pub price_impact_bps: u32,
    /// Slippage tolerance assigned by evaluation, zero until evaluated.
    pub slippage_impact_bps: u32,
    pub flash_loan: Option<FlashLoanConfig>,
}

impl ArbitragePath {
    pub fn new(start_token: Address, hops: Vec<ArbitrageHop>, gas_estimates: &[u64]) -> Result<Self, ArbError> {
        let (Some(first), Some(last)) = (hops.first(), hops.last()) else {
            return Err(ArbError::Validation("path has no hops".to_string()));
        };
        if first.token_in != start_token {
            return Err(ArbError::Validation(format!("path starts with {} instead of {}", first.token_in, start_token)));
        }
        if last.token_out != start_token {
            return Err(ArbError::Validation(format!("path ends with {} instead of {}", last.token_out, start_token)));
        }
        for pair in hops.windows(2) {
            if pair[0].token_out != pair[1].token_in {
                return Err(ArbError::Validation(format!("hop outputs {} but next hop takes {}", pair[0].token_out, pair[1].token_in)));
            }
            if pair[0].amount_out != pair[1].amount_in {
                return Err(ArbError::Validation("hop amounts are not contiguous".to_string()));
            }
        }
        let mut pools = HashSet::new();
        for hop in &hops {
            if !pools.insert(hop.pool.get_pool_id()) {
                return Err(ArbError::Validation(format!("pool {} used twice", hop.pool.get_pool_id())));
            }
        }

        let input_amount = first.amount_in;
        let final_amount = last.amount_out;
        let total_gas_estimate = if gas_estimates.len() == hops.len() {
            gas_estimates.iter().sum()
        } else {
            hops.iter().map(|h| h.pool.get_gas_estimate()).sum()
        };
        let total_fees = hops.iter().fold(U256::ZERO, |acc, h| acc.saturating_add(apply_bps(input_amount, h.pool.get_fee_bps())));
        let price_impact_bps = super::slippage::path_price_impact_bps(&hops).unwrap_or(u32::MAX);

        let mut tokens = vec![start_token];
        tokens.extend(hops.iter().map(|h| h.token_out));
        let pool_addresses: Vec<Address> = hops.iter().map(|h| h.pool.get_address()).collect();
        let estimated_profit = final_amount.saturating_sub(input_amount);

        Ok(Self {
            hash: PathHash::compute(&tokens, &pool_addresses),
            start_token,
            hops,
            input_amount,
            final_amount,
            estimated_profit,
            total_gas_estimate,
            total_gas_cost: U256::ZERO,
            net_profit: estimated_profit,
            total_fees,
            price_impact_bps,
            slippage_impact_bps: 0,
            flash_loan: None,
        })
    }

    /// The hop count of the path
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn tokens(&self) -> Vec<Address> {
        let mut tokens = vec![self.start_token];
        tokens.extend(self.hops.iter().map(|h| h.token_out));
        tokens
    }

    pub fn pool_ids(&self) -> Vec<PoolId> {
        self.hops.iter().map(|h| h.pool.get_pool_id()).collect()
    }

    pub fn contains_pool(&self, pool_id: &PoolId) -> bool {
        self.hops.iter().any(|h| h.pool.get_pool_id() == *pool_id)
    }

    pub fn with_gas_cost(mut self, total_gas_cost: U256) -> Self {
        self.total_gas_cost = total_gas_cost;
        self.net_profit = self.estimated_profit.saturating_sub(total_gas_cost);
        self
    }

    pub fn with_flash_loan(mut self, flash_loan: FlashLoanConfig) -> Self {
        self.flash_loan = Some(flash_loan);
        self
    }

    /// Copies the evaluated costs onto the path so execution sees the same numbers.
    pub fn apply_evaluation(&mut self, result: &ProfitabilityResult) {
        self.total_gas_cost = result.gas_cost_in_token;
        self.net_profit = result.net_profit;
        self.slippage_impact_bps = result.slippage_bps;
    }
}

impl Display for ArbitragePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let pools: Vec<String> = self.hops.iter().map(|h| format!("{:#}", h.pool.get_address())).collect();
        write!(f, "ArbitragePath(hops={}, pools={:?}, net_profit={})", self.len(), pools, self.net_profit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    NotProfitable,
    ZeroLiquidity(PoolId),
    PriceUnavailable,
    ZeroInput,
    BelowAbsoluteMinimum { net_profit: U256, minimum: U256 },
    BelowRoi { roi_bps: u32, minimum_bps: u32 },
    BelowGasMultiple { net_profit: U256, required: U256 },
    LoanNotRepayable { final_amount: U256, owed: U256 },
}

/// Full cost breakdown of one path. All amounts are start token units.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfitabilityResult {
    pub meets_profit_requirements: bool,
    pub gross_profit: U256,
    pub slippage_bps: u32,
    pub profit_after_slippage: U256,
    pub total_fees: U256,
    pub gas_units: u64,
    pub gas_cost_in_token: U256,
    pub mev_risk_bps: u32,
    pub mev_risk_discount: U256,
    pub flash_loan_fee: U256,
    pub net_profit: U256,
    pub roi_bps: u32,
    pub loan_repayable: bool,
    pub rejection_reasons: Vec<RejectionReason>,
}

impl ProfitabilityResult {
    pub fn rejected(reason: RejectionReason) -> Self {
        Self { rejection_reasons: vec![reason], ..Self::default() }
    }
}

/// Everything the profitability engine needs about the market for one start token in one cycle.
#[derive(Clone, Debug)]
pub struct MarketState {
    pub chain_id: u64,
    pub block_number: u64,
    pub gas: GasQuote,
    pub risk: Arc<RiskSnapshot>,
}
