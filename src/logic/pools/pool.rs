use super::pool_id::PoolId;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString, VariantNames};

/// Pricing model of a pool.
#[derive(Copy, Clone, Debug, Display, PartialEq, Hash, Eq, EnumString, VariantNames, Deserialize, Serialize, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolClass {
    ConstantProduct,
    ConcentratedLiquidity,
    StableSwap,
}

/// DEX protocol a pool belongs to. The discriminant is what the on-chain router dispatches on.
#[derive(Copy, Clone, Debug, Display, PartialEq, Hash, Eq, EnumString, VariantNames, Deserialize, Serialize, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum DexKind {
    UniswapV2 = 0,
    SushiSwap = 1,
    UniswapV3 = 2,
    Curve = 3,
}

impl DexKind {
    pub fn discriminant(&self) -> u8 {
        *self as u8
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalculationError {
    #[error("zero liquidity in pool {0}")]
    ZeroLiquidity(PoolId),
    #[error("token {0} is not traded by pool {1}")]
    TokenNotInPool(Address, PoolId),
    #[error("swap exceeds the liquidity pool {0} holds in range")]
    InsufficientLiquidity(PoolId),
    #[error("zero input amount")]
    ZeroInput,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("invariant did not converge")]
    NoConvergence,
}

/// Pricing capability every liquidity source implements.
#[typetag::serde(tag = "type")]
pub trait Pool: Sync + Send {
    fn get_class(&self) -> PoolClass;

    fn get_dex(&self) -> DexKind;

    fn get_address(&self) -> Address;

    fn get_pool_id(&self) -> PoolId {
        PoolId::Address(self.get_address())
    }

    /// Swap fee in basis points.
    fn get_fee_bps(&self) -> u32;

    /// Fee as the router encodes it, in hundredths of a basis point (3000 = 0.3%).
    fn get_fee_tier(&self) -> u32 {
        self.get_fee_bps() * 100
    }

    fn get_tokens(&self) -> Vec<Address>;

    fn get_swap_directions(&self) -> Vec<(Address, Address)> {
        let tokens = self.get_tokens();
        let mut directions = Vec::new();
        for from in &tokens {
            for to in &tokens {
                if from != to {
                    directions.push((*from, *to));
                }
            }
        }
        directions
    }

    /// Gas units one swap through this pool costs.
    fn get_gas_estimate(&self) -> u64;

    /// Amount of `token` the pool can pay out or absorb at the current price.
    fn get_liquidity(&self, token: &Address) -> Result<U256, CalculationError>;

    /// False when any side of the pool is empty. Such pools are never priced.
    fn is_usable(&self) -> bool;

    /// Exact output for `in_amount` of `token_from`, with the gas the swap uses.
    fn calculate_out_amount(&self, token_from: &Address, token_to: &Address, in_amount: U256) -> Result<(U256, u64), CalculationError>;
}

pub struct PoolWrapper {
    pub pool: Arc<dyn Pool>,
}

impl PartialOrd for PoolWrapper {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for PoolWrapper {}

impl Ord for PoolWrapper {
    fn cmp(&self, other: &Self) -> Ordering {
        self.get_pool_id().cmp(&other.get_pool_id())
    }
}

impl Display for PoolWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(fee={}bps)@{}", self.get_dex(), self.get_fee_bps(), self.get_pool_id())
    }
}

impl Debug for PoolWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(fee={}bps)@{:?}", self.get_dex(), self.get_fee_bps(), self.get_pool_id())
    }
}

impl Hash for PoolWrapper {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.get_pool_id().hash(state)
    }
}

impl PartialEq for PoolWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.pool.get_pool_id() == other.pool.get_pool_id()
    }
}

impl PoolWrapper {
    pub fn new(pool: Arc<dyn Pool>) -> Self {
        PoolWrapper { pool }
    }
}

impl Clone for PoolWrapper {
    fn clone(&self) -> Self {
        Self { pool: self.pool.clone() }
    }
}

impl Deref for PoolWrapper {
    type Target = dyn Pool;

    fn deref(&self) -> &Self::Target {
        self.pool.deref()
    }
}

impl<T: 'static + Pool + Clone> From<T> for PoolWrapper {
    fn from(pool: T) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

impl Serialize for PoolWrapper {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.pool.deref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PoolWrapper {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pool: Box<dyn Pool> = Box::deserialize(deserializer)?;
        Ok(PoolWrapper { pool: Arc::from(pool) })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::logic::pools::ConstantProductPool;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PoolClass::ConstantProduct), "CONSTANT_PRODUCT");
        assert_eq!(format!("{}", DexKind::UniswapV3), "UNISWAP_V3");
        assert_eq!(format!("{}", DexKind::SushiSwap), "SUSHI_SWAP");
        assert_eq!(DexKind::Curve.discriminant(), 3);
    }

    #[test]
    fn test_pool_wrapper_serde_roundtrip() -> eyre::Result<()> {
        let pool = ConstantProductPool::new(
            Address::repeat_byte(2),
            Address::repeat_byte(0),
            Address::repeat_byte(1),
            U256::from(1_000u64),
            U256::from(2_000u64),
            30,
        );
        let pool_wrapper = PoolWrapper::from(pool);

        let serialized = serde_json::to_string(&pool_wrapper)?;
        let restored: PoolWrapper = serde_json::from_str(&serialized)?;

        assert_eq!(restored.get_pool_id(), PoolId::Address(Address::repeat_byte(2)));
        assert_eq!(restored.get_class(), PoolClass::ConstantProduct);
        assert_eq!(restored.get_liquidity(&Address::repeat_byte(1))?, U256::from(2_000u64));
        Ok(())
    }

    #[test]
    fn test_default_swap_directions() {
        let pool = PoolWrapper::from(ConstantProductPool::new(
            Address::repeat_byte(2),
            Address::repeat_byte(0),
            Address::repeat_byte(1),
            U256::from(1u64),
            U256::from(1u64),
            30,
        ));
        let directions = pool.get_swap_directions();
        assert_eq!(directions.len(), 2);
        assert!(directions.contains(&(Address::repeat_byte(0), Address::repeat_byte(1))));
        assert!(directions.contains(&(Address::repeat_byte(1), Address::repeat_byte(0))));
    }
}
