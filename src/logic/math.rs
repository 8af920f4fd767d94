use crate::utils::constants::{BPS, BPS_U256};
use alloy_primitives::U256;

/// `a * b / denominator` rounded down, `None` on overflow or a zero denominator.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    a.checked_mul(b).map(|product| product / denominator)
}

/// `a * b / denominator` rounded up.
pub fn mul_div_ceil(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    let product = a.checked_mul(b)?;
    let quotient = product / denominator;
    if (product % denominator).is_zero() { Some(quotient) } else { quotient.checked_add(U256::from(1)) }
}

/// `amount * bps / 10_000`, saturating to `U256::MAX` on overflow.
pub fn apply_bps(amount: U256, bps: u32) -> U256 {
    mul_div(amount, U256::from(bps), BPS_U256).unwrap_or(U256::MAX)
}

/// Keeps `10_000 - bps` of `amount`.
pub fn haircut_bps(amount: U256, bps: u32) -> U256 {
    apply_bps(amount, BPS.saturating_sub(bps))
}

/// `numerator / denominator` in basis points, capped at `cap`. A zero denominator yields `None`.
pub fn ratio_bps(numerator: U256, denominator: U256, cap: u32) -> Option<u32> {
    let ratio = mul_div(numerator, BPS_U256, denominator)?;
    Some(if ratio > U256::from(cap) { cap } else { ratio.to::<u32>() })
}

/// Integer square root of a u128.
pub fn isqrt(value: u128) -> u128 {
    if value < 2 {
        return value;
    }
    let mut x = value;
    let mut y = x.div_ceil(2);
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

/// Population mean and standard deviation of integer samples.
pub fn mean_and_stdev(samples: &[u64]) -> (u64, u64) {
    if samples.is_empty() {
        return (0, 0);
    }
    let n = samples.len() as u128;
    let mean = samples.iter().map(|s| *s as u128).sum::<u128>() / n;
    let squares = samples.iter().fold(U256::ZERO, |acc, s| {
        let d = U256::from((*s as u128).abs_diff(mean));
        acc + d * d
    });
    let variance: u128 = (squares / U256::from(n)).saturating_to();
    (mean as u64, isqrt(variance) as u64)
}
