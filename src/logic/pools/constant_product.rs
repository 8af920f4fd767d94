use super::pool::{CalculationError, DexKind, Pool, PoolClass};
use crate::utils::constants::{BPS, BPS_U256};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

const DEFAULT_SWAP_GAS: u64 = 90_000;

/// `x * y = k` pool (Uniswap V2 and forks).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstantProductPool {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    pub fee_bps: u32,
    pub dex: DexKind,
    pub gas_estimate: u64,
}

impl ConstantProductPool {
    pub fn new(address: Address, token0: Address, token1: Address, reserve0: U256, reserve1: U256, fee_bps: u32) -> Self {
        Self { address, token0, token1, reserve0, reserve1, fee_bps, dex: DexKind::UniswapV2, gas_estimate: DEFAULT_SWAP_GAS }
    }

    pub fn with_dex(mut self, dex: DexKind) -> Self {
        self.dex = dex;
        self
    }

    pub fn with_gas_estimate(mut self, gas_estimate: u64) -> Self {
        self.gas_estimate = gas_estimate;
        self
    }

    fn reserves_for(&self, token_from: &Address, token_to: &Address) -> Result<(U256, U256), CalculationError> {
        if *token_from == self.token0 && *token_to == self.token1 {
            Ok((self.reserve0, self.reserve1))
        } else if *token_from == self.token1 && *token_to == self.token0 {
            Ok((self.reserve1, self.reserve0))
        } else if *token_from != self.token0 && *token_from != self.token1 {
            Err(CalculationError::TokenNotInPool(*token_from, self.get_pool_id()))
        } else {
            Err(CalculationError::TokenNotInPool(*token_to, self.get_pool_id()))
        }
    }
}

/// `amountIn * (10000 - fee) * reserveOut / (reserveIn * 10000 + amountIn * (10000 - fee))`.
///
/// Always strictly below `reserve_out`. Empty reserves are an error, never infinite liquidity.
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256, fee_bps: u32) -> Result<U256, CalculationError> {
    if amount_in.is_zero() {
        return Err(CalculationError::ZeroInput);
    }
    let amount_in_with_fee = amount_in.checked_mul(U256::from(BPS.saturating_sub(fee_bps))).ok_or(CalculationError::Overflow)?;
    let numerator = amount_in_with_fee.checked_mul(reserve_out).ok_or(CalculationError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(BPS_U256)
        .and_then(|scaled| scaled.checked_add(amount_in_with_fee))
        .ok_or(CalculationError::Overflow)?;

    if denominator.is_zero() {
        return Err(CalculationError::Overflow);
    }
    Ok(numerator / denominator)
}

#[typetag::serde]
impl Pool for ConstantProductPool {
    fn get_class(&self) -> PoolClass {
        PoolClass::ConstantProduct
    }

    fn get_dex(&self) -> DexKind {
        self.dex
    }

    fn get_address(&self) -> Address {
        self.address
    }

    fn get_fee_bps(&self) -> u32 {
        self.fee_bps
    }

    fn get_tokens(&self) -> Vec<Address> {
        vec![self.token0, self.token1]
    }

    fn get_gas_estimate(&self) -> u64 {
        self.gas_estimate
    }

    fn get_liquidity(&self, token: &Address) -> Result<U256, CalculationError> {
        if *token == self.token0 {
            Ok(self.reserve0)
        } else if *token == self.token1 {
            Ok(self.reserve1)
        } else {
            Err(CalculationError::TokenNotInPool(*token, self.get_pool_id()))
        }
    }

    fn is_usable(&self) -> bool {
        !self.reserve0.is_zero() && !self.reserve1.is_zero()
    }

    fn calculate_out_amount(&self, token_from: &Address, token_to: &Address, in_amount: U256) -> Result<(U256, u64), CalculationError> {
        let (reserve_in, reserve_out) = self.reserves_for(token_from, token_to)?;
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(CalculationError::ZeroLiquidity(self.get_pool_id()));
        }
        let out_amount = get_amount_out(in_amount, reserve_in, reserve_out, self.fee_bps)?;
        Ok((out_amount, self.gas_estimate))
    }
}
