use alloy_primitives::{Address, U256, address};

pub const WETH: Address = address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

pub const USDC: Address = address!("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

pub const NATIVE: Address = Address::ZERO;

pub const MAX_TOKEN_DECIMALS: u8 = 18;

/// Denominator for every fraction expressed in basis points.
pub const BPS: u32 = 10_000;

pub const BPS_U256: U256 = U256::from_limbs([10_000, 0, 0, 0]);

/// Oracle prices are USD per whole token scaled by 1e18.
pub const USD_SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// 2^96, the fixed point base of concentrated liquidity sqrt prices.
pub const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);

/// sqrt price bounds of the full tick range, `getSqrtRatioAtTick(MIN_TICK)` and `(MAX_TICK)`.
pub const MIN_SQRT_PRICE_X96: U256 = U256::from_limbs([4_295_128_739, 0, 0, 0]);

pub const MAX_SQRT_PRICE_X96: U256 = U256::from_limbs([6_743_328_256_752_651_558, 17_280_870_778_742_802_505, 4_294_805_859, 0]);
