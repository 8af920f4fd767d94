use crate::logic::pools::{CalculationError, PoolId};
use alloy_primitives::Bytes;
use std::time::Duration;

/// Failure taxonomy of the arbitrage pipeline.
///
/// Validation and liquidity errors drop a single path. Simulation failures abort
/// the path. Submission and execution failures are surfaced to the caller and
/// never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArbError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("insufficient liquidity in pool {0}")]
    Liquidity(PoolId),
    #[error("simulation failed: {reason}")]
    SimulationFailure { reason: String },
    #[error("submission failed: {0}")]
    SubmissionFailure(String),
    #[error("execution reverted: {reason}")]
    ExecutionRevert { reason: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl From<CalculationError> for ArbError {
    fn from(error: CalculationError) -> Self {
        match error {
            CalculationError::ZeroLiquidity(pool_id) | CalculationError::InsufficientLiquidity(pool_id) => ArbError::Liquidity(pool_id),
            other => ArbError::Validation(other.to_string()),
        }
    }
}

/// Errors reported by the chain client and price oracle collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("call reverted")]
    Reverted { data: Bytes },
    #[error("not found: {0}")]
    NotFound(String),
}

impl ChainError {
    /// Human readable revert reason, decoded from `Error(string)` or `Panic(uint256)` data when possible.
    pub fn revert_reason(&self) -> String {
        match self {
            ChainError::Reverted { data } => {
                alloy_sol_types::decode_revert_reason(data).unwrap_or_else(|| format!("reverted with data {data}"))
            }
            other => other.to_string(),
        }
    }
}
