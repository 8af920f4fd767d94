use super::pool::{CalculationError, DexKind, Pool, PoolClass};
use crate::logic::math::mul_div;
use crate::utils::constants::{MAX_SQRT_PRICE_X96, MIN_SQRT_PRICE_X96, Q96};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

const DEFAULT_SWAP_GAS: u64 = 130_000;
const FEE_TIER_DENOMINATOR: u64 = 1_000_000;

/// Concentrated liquidity pool (Uniswap V3 style) priced within the active tick.
///
/// The active liquidity `L` and `sqrtPriceX96` define virtual reserves
/// `x = L * 2^96 / sqrtP` and `y = L * sqrtP / 2^96`, which behave like a constant
/// product pool as long as the swap does not cross a tick boundary.
///
/// Only the real amounts between the current price and the range bounds can be paid out:
/// `L * (sqrtP - sqrtLower) / 2^96` of token1 and `x * (sqrtUpper - sqrtP) / sqrtUpper` of token0.
/// A quote that would leave the range fails instead of pricing liquidity the pool does not hold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConcentratedLiquidityPool {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub sqrt_price_lower_x96: U256,
    pub sqrt_price_upper_x96: U256,
    /// Hundredths of a basis point (500, 3000, 10000).
    pub fee_tier: u32,
    pub gas_estimate: u64,
}

impl ConcentratedLiquidityPool {
    /// Pool whose liquidity spans the full tick range.
    pub fn new(address: Address, token0: Address, token1: Address, sqrt_price_x96: U256, liquidity: u128, fee_tier: u32) -> Self {
        Self {
            address,
            token0,
            token1,
            sqrt_price_x96,
            liquidity,
            sqrt_price_lower_x96: MIN_SQRT_PRICE_X96,
            sqrt_price_upper_x96: MAX_SQRT_PRICE_X96,
            fee_tier,
            gas_estimate: DEFAULT_SWAP_GAS,
        }
    }

    /// Bounds of the range the active liquidity is valid for, as sqrt prices.
    pub fn with_range(mut self, sqrt_price_lower_x96: U256, sqrt_price_upper_x96: U256) -> Self {
        self.sqrt_price_lower_x96 = sqrt_price_lower_x96;
        self.sqrt_price_upper_x96 = sqrt_price_upper_x96;
        self
    }

    pub fn virtual_reserves(&self) -> Result<(U256, U256), CalculationError> {
        if self.liquidity == 0 || self.sqrt_price_x96.is_zero() {
            return Err(CalculationError::ZeroLiquidity(self.get_pool_id()));
        }
        let liquidity = U256::from(self.liquidity);
        let reserve0 = mul_div(liquidity, Q96, self.sqrt_price_x96).ok_or(CalculationError::Overflow)?;
        let reserve1 = mul_div(liquidity, self.sqrt_price_x96, Q96).ok_or(CalculationError::Overflow)?;
        Ok((reserve0, reserve1))
    }

    /// Token amounts the pool can pay out before the price reaches a range bound.
    pub fn in_range_reserves(&self) -> Result<(U256, U256), CalculationError> {
        let (lower, upper) = (self.sqrt_price_lower_x96, self.sqrt_price_upper_x96);
        if lower >= upper || self.sqrt_price_x96 < lower || self.sqrt_price_x96 > upper {
            return Err(CalculationError::ZeroLiquidity(self.get_pool_id()));
        }
        let (virtual0, _) = self.virtual_reserves()?;
        let reserve0 = mul_div(virtual0, upper - self.sqrt_price_x96, upper).ok_or(CalculationError::Overflow)?;
        let reserve1 = mul_div(U256::from(self.liquidity), self.sqrt_price_x96 - lower, Q96).ok_or(CalculationError::Overflow)?;
        Ok((reserve0, reserve1))
    }
}

#[typetag::serde]
impl Pool for ConcentratedLiquidityPool {
    fn get_class(&self) -> PoolClass {
        PoolClass::ConcentratedLiquidity
    }

    fn get_dex(&self) -> DexKind {
        DexKind::UniswapV3
    }

    fn get_address(&self) -> Address {
        self.address
    }

    fn get_fee_bps(&self) -> u32 {
        self.fee_tier / 100
    }

    fn get_fee_tier(&self) -> u32 {
        self.fee_tier
    }

    fn get_tokens(&self) -> Vec<Address> {
        vec![self.token0, self.token1]
    }

    fn get_gas_estimate(&self) -> u64 {
        self.gas_estimate
    }

    fn get_liquidity(&self, token: &Address) -> Result<U256, CalculationError> {
        let (reserve0, reserve1) = self.in_range_reserves()?;
        if *token == self.token0 {
            Ok(reserve0)
        } else if *token == self.token1 {
            Ok(reserve1)
        } else {
            Err(CalculationError::TokenNotInPool(*token, self.get_pool_id()))
        }
    }

    fn is_usable(&self) -> bool {
        matches!(self.in_range_reserves(), Ok((r0, r1)) if !r0.is_zero() && !r1.is_zero())
    }

    fn calculate_out_amount(&self, token_from: &Address, token_to: &Address, in_amount: U256) -> Result<(U256, u64), CalculationError> {
        if in_amount.is_zero() {
            return Err(CalculationError::ZeroInput);
        }
        let (reserve0, reserve1) = self.virtual_reserves()?;
        let (real0, real1) = self.in_range_reserves()?;
        let (reserve_in, reserve_out, available_out) = if *token_from == self.token0 && *token_to == self.token1 {
            (reserve0, reserve1, real1)
        } else if *token_from == self.token1 && *token_to == self.token0 {
            (reserve1, reserve0, real0)
        } else {
            return Err(CalculationError::TokenNotInPool(*token_from, self.get_pool_id()));
        };
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(CalculationError::ZeroLiquidity(self.get_pool_id()));
        }

        let fee_keep = U256::from(FEE_TIER_DENOMINATOR.saturating_sub(self.fee_tier as u64));
        let amount_in_with_fee = in_amount.checked_mul(fee_keep).ok_or(CalculationError::Overflow)?;
        let numerator = amount_in_with_fee.checked_mul(reserve_out).ok_or(CalculationError::Overflow)?;
        let denominator = reserve_in
            .checked_mul(U256::from(FEE_TIER_DENOMINATOR))
            .and_then(|scaled| scaled.checked_add(amount_in_with_fee))
            .ok_or(CalculationError::Overflow)?;

        let out_amount = numerator / denominator;
        if out_amount > available_out {
            return Err(CalculationError::InsufficientLiquidity(self.get_pool_id()));
        }
        Ok((out_amount, self.gas_estimate))
    }
}
