use super::pool::{CalculationError, DexKind, Pool, PoolClass};
use crate::logic::math::apply_bps;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

const DEFAULT_SWAP_GAS: u64 = 180_000;
const N_COINS: u64 = 2;
const MAX_ITERATIONS: usize = 255;

/// Two coin StableSwap pool (Curve). Balances are normalized to 18 decimals before the
/// invariant is solved, then scaled back to the output token's decimals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StableSwapPool {
    pub address: Address,
    pub tokens: [Address; 2],
    pub balances: [U256; 2],
    pub decimals: [u8; 2],
    pub amp: u64,
    pub fee_bps: u32,
    pub gas_estimate: u64,
}

impl StableSwapPool {
    pub fn new(address: Address, tokens: [Address; 2], balances: [U256; 2], decimals: [u8; 2], amp: u64, fee_bps: u32) -> Self {
        Self { address, tokens, balances, decimals, amp, fee_bps, gas_estimate: DEFAULT_SWAP_GAS }
    }

    fn index_of(&self, token: &Address) -> Result<usize, CalculationError> {
        self.tokens.iter().position(|t| t == token).ok_or(CalculationError::TokenNotInPool(*token, self.get_pool_id()))
    }

    fn precision(&self, index: usize) -> U256 {
        U256::from(10u64).pow(U256::from(18u8.saturating_sub(self.decimals[index])))
    }

    fn normalized_balances(&self) -> Result<[U256; 2], CalculationError> {
        let xp0 = self.balances[0].checked_mul(self.precision(0)).ok_or(CalculationError::Overflow)?;
        let xp1 = self.balances[1].checked_mul(self.precision(1)).ok_or(CalculationError::Overflow)?;
        Ok([xp0, xp1])
    }
}

fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b { a - b } else { b - a }
}

/// StableSwap invariant `D` by Newton iteration.
pub fn get_d(xp: &[U256; 2], amp: u64) -> Result<U256, CalculationError> {
    let n = U256::from(N_COINS);
    let sum = xp[0].checked_add(xp[1]).ok_or(CalculationError::Overflow)?;
    if sum.is_zero() {
        return Ok(U256::ZERO);
    }
    let ann = U256::from(amp).checked_mul(n).ok_or(CalculationError::Overflow)?;
    let mut d = sum;
    for _ in 0..MAX_ITERATIONS {
        let mut d_p = d;
        for x in xp {
            let denominator = x.checked_mul(n).ok_or(CalculationError::Overflow)?;
            if denominator.is_zero() {
                return Err(CalculationError::NoConvergence);
            }
            d_p = d_p.checked_mul(d).ok_or(CalculationError::Overflow)? / denominator;
        }
        let d_prev = d;
        let numerator = ann
            .checked_mul(sum)
            .and_then(|v| v.checked_add(d_p.checked_mul(n)?))
            .and_then(|v| v.checked_mul(d))
            .ok_or(CalculationError::Overflow)?;
        let denominator = ann
            .checked_sub(U256::from(1))
            .and_then(|v| v.checked_mul(d))
            .and_then(|v| v.checked_add(d_p.checked_mul(n + U256::from(1))?))
            .ok_or(CalculationError::Overflow)?;
        if denominator.is_zero() {
            return Err(CalculationError::NoConvergence);
        }
        d = numerator / denominator;
        if abs_diff(d, d_prev) <= U256::from(1) {
            return Ok(d);
        }
    }
    Err(CalculationError::NoConvergence)
}

/// New balance of coin `j` after coin `i` reaches normalized balance `x`.
pub fn get_y(i: usize, j: usize, x: U256, xp: &[U256; 2], amp: u64) -> Result<U256, CalculationError> {
    if i == j || i > 1 || j > 1 {
        return Err(CalculationError::NoConvergence);
    }
    let n = U256::from(N_COINS);
    let d = get_d(xp, amp)?;
    let ann = U256::from(amp).checked_mul(n).ok_or(CalculationError::Overflow)?;
    if ann.is_zero() || x.is_zero() {
        return Err(CalculationError::NoConvergence);
    }

    // With two coins the only other balance is the new `x`
    let sum = x;
    let mut c = d.checked_mul(d).ok_or(CalculationError::Overflow)? / x.checked_mul(n).ok_or(CalculationError::Overflow)?;
    c = c.checked_mul(d).ok_or(CalculationError::Overflow)? / ann.checked_mul(n).ok_or(CalculationError::Overflow)?;
    let b = sum + d / ann;

    let mut y = d;
    for _ in 0..MAX_ITERATIONS {
        let y_prev = y;
        let numerator = y.checked_mul(y).and_then(|v| v.checked_add(c)).ok_or(CalculationError::Overflow)?;
        let denominator = (y * U256::from(2) + b).checked_sub(d).ok_or(CalculationError::NoConvergence)?;
        if denominator.is_zero() {
            return Err(CalculationError::NoConvergence);
        }
        y = numerator / denominator;
        if abs_diff(y, y_prev) <= U256::from(1) {
            return Ok(y);
        }
    }
    Err(CalculationError::NoConvergence)
}

#[typetag::serde]
impl Pool for StableSwapPool {
    fn get_class(&self) -> PoolClass {
        PoolClass::StableSwap
    }

    fn get_dex(&self) -> DexKind {
        DexKind::Curve
    }

    fn get_address(&self) -> Address {
        self.address
    }

    fn get_fee_bps(&self) -> u32 {
        self.fee_bps
    }

    fn get_tokens(&self) -> Vec<Address> {
        self.tokens.to_vec()
    }

    fn get_gas_estimate(&self) -> u64 {
        self.gas_estimate
    }

    fn get_liquidity(&self, token: &Address) -> Result<U256, CalculationError> {
        Ok(self.balances[self.index_of(token)?])
    }

    fn is_usable(&self) -> bool {
        self.balances.iter().all(|b| !b.is_zero()) && self.amp > 0
    }

    fn calculate_out_amount(&self, token_from: &Address, token_to: &Address, in_amount: U256) -> Result<(U256, u64), CalculationError> {
        if in_amount.is_zero() {
            return Err(CalculationError::ZeroInput);
        }
        let i = self.index_of(token_from)?;
        let j = self.index_of(token_to)?;
        if i == j {
            return Err(CalculationError::TokenNotInPool(*token_to, self.get_pool_id()));
        }
        if !self.is_usable() {
            return Err(CalculationError::ZeroLiquidity(self.get_pool_id()));
        }

        let xp = self.normalized_balances()?;
        let dx = in_amount.checked_mul(self.precision(i)).ok_or(CalculationError::Overflow)?;
        let x = xp[i].checked_add(dx).ok_or(CalculationError::Overflow)?;
        let y = get_y(i, j, x, &xp, self.amp)?;

        // One unit kept back against rounding, as the on-chain pool does
        let dy = xp[j].checked_sub(y).and_then(|v| v.checked_sub(U256::from(1))).ok_or(CalculationError::NoConvergence)?;
        let fee = apply_bps(dy, self.fee_bps);
        let out_amount = (dy - fee) / self.precision(j);

        Ok((out_amount, self.gas_estimate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e18(value: u64) -> U256 {
        U256::from(value) * U256::from(10u64).pow(U256::from(18))
    }

    #[test]
    fn test_balanced_pool_trades_near_parity() -> eyre::Result<()> {
        let pool = StableSwapPool::new(
            Address::repeat_byte(0x44),
            [Address::repeat_byte(1), Address::repeat_byte(2)],
            [e18(1_000_000), e18(1_000_000)],
            [18, 18],
            100,
            4,
        );

        let (out_amount, _) = pool.calculate_out_amount(&Address::repeat_byte(1), &Address::repeat_byte(2), e18(1_000))?;

        assert!(out_amount > e18(999));
        assert!(out_amount < e18(1_000));
        Ok(())
    }

    #[test]
    fn test_mixed_decimals_are_normalized() -> eyre::Result<()> {
        let usdc = Address::repeat_byte(1);
        let dai = Address::repeat_byte(2);
        let pool = StableSwapPool::new(
            Address::repeat_byte(0x45),
            [usdc, dai],
            [U256::from(1_000_000u64) * U256::from(1_000_000u64), e18(1_000_000)],
            [6, 18],
            200,
            4,
        );

        let (out_amount, _) = pool.calculate_out_amount(&usdc, &dai, U256::from(1_000_000_000u64))?;

        assert!(out_amount > e18(999));
        assert!(out_amount < e18(1_000));
        Ok(())
    }

    #[test]
    fn test_invariant_of_balanced_pool_is_sum() -> eyre::Result<()> {
        let d = get_d(&[e18(500), e18(500)], 100)?;
        assert!(abs_diff(d, e18(1_000)) <= U256::from(1));
        Ok(())
    }

    #[test]
    fn test_empty_side_is_rejected() {
        let pool = StableSwapPool::new(
            Address::repeat_byte(0x46),
            [Address::repeat_byte(1), Address::repeat_byte(2)],
            [e18(10), U256::ZERO],
            [18, 18],
            100,
            4,
        );
        assert!(!pool.is_usable());
        assert!(matches!(
            pool.calculate_out_amount(&Address::repeat_byte(1), &Address::repeat_byte(2), e18(1)),
            Err(CalculationError::ZeroLiquidity(_))
        ));
    }
}
