pub mod concentrated;
pub mod constant_product;
pub mod pool;
pub mod pool_id;
pub mod stable_swap;

pub use concentrated::ConcentratedLiquidityPool;
pub use constant_product::{ConstantProductPool, get_amount_out};
pub use pool::{CalculationError, DexKind, Pool, PoolClass, PoolWrapper};
pub use pool_id::PoolId;
pub use stable_swap::StableSwapPool;
