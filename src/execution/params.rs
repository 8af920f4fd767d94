use crate::errors::ArbError;
use crate::logic::graph::PathHash;
use crate::logic::math::haircut_bps;
use crate::logic::types::ArbitragePath;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};

sol! {
    /// One swap the arbitrage contract performs inside the flash loan callback.
    #[derive(Debug, PartialEq, Eq)]
    struct SwapStep {
        address pool;
        address tokenIn;
        address tokenOut;
        uint32 fee;
        uint256 amountIn;
        uint256 minAmountOut;
        uint8 dexKind;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct FlashLoanArbitrageParams {
        address borrowToken;
        uint256 borrowAmount;
        uint8 provider;
        SwapStep[] steps;
        uint256 minProfit;
        uint256 deadline;
    }

    function executeFlashArbitrage(FlashLoanArbitrageParams params) external returns (uint256 profit);
}

/// Execution intent for one path, built right before simulation and never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltParams {
    pub params: FlashLoanArbitrageParams,
    pub path_hash: PathHash,
    pub expected_profit: U256,
}

impl BuiltParams {
    /// Swap steps with `minAmountOut` protected by the path's evaluated slippage, or
    /// `default_tolerance_bps` when the path was never evaluated.
    pub fn build(path: &ArbitragePath, default_tolerance_bps: u32, deadline_secs: u64, now_secs: u64) -> Result<Self, ArbError> {
        let Some(flash_loan) = path.flash_loan else {
            return Err(ArbError::Validation("path does not borrow".to_string()));
        };
        let tolerance_bps = if path.slippage_impact_bps > 0 { path.slippage_impact_bps } else { default_tolerance_bps };

        let steps = path
            .hops
            .iter()
            .map(|hop| SwapStep {
                pool: hop.pool.get_address(),
                tokenIn: hop.token_in,
                tokenOut: hop.token_out,
                fee: hop.pool.get_fee_tier(),
                amountIn: hop.amount_in,
                minAmountOut: haircut_bps(hop.amount_out, tolerance_bps),
                dexKind: hop.pool.get_dex().discriminant(),
            })
            .collect();

        let flash_fee = flash_loan.fee_for(path.input_amount);
        let expected_profit = path.estimated_profit.saturating_sub(flash_fee);
        let min_profit = haircut_bps(expected_profit, tolerance_bps).max(U256::from(1u64));

        let built = Self {
            params: FlashLoanArbitrageParams {
                borrowToken: path.start_token,
                borrowAmount: path.input_amount,
                provider: flash_loan.provider.discriminant(),
                steps,
                minProfit: min_profit,
                deadline: U256::from(now_secs.saturating_add(deadline_secs)),
            },
            path_hash: path.hash,
            expected_profit,
        };
        built.validate(now_secs)?;
        Ok(built)
    }

    pub fn validate(&self, now_secs: u64) -> Result<(), ArbError> {
        let params = &self.params;
        if params.borrowAmount.is_zero() {
            return Err(ArbError::Validation("borrow amount is zero".to_string()));
        }
        let (Some(first), Some(last)) = (params.steps.first(), params.steps.last()) else {
            return Err(ArbError::Validation("no swap steps".to_string()));
        };
        if first.tokenIn != params.borrowToken || last.tokenOut != params.borrowToken {
            return Err(ArbError::Validation("swap steps do not return the borrowed token".to_string()));
        }
        if params.steps.windows(2).any(|pair| pair[0].tokenOut != pair[1].tokenIn) {
            return Err(ArbError::Validation("swap steps are not contiguous".to_string()));
        }
        if let Some(step) = params.steps.iter().find(|step| step.amountIn.is_zero() || step.minAmountOut.is_zero()) {
            return Err(ArbError::Validation(format!("zero amount in step through pool {}", step.pool)));
        }
        if params.deadline <= U256::from(now_secs) {
            return Err(ArbError::Validation("deadline already passed".to_string()));
        }
        Ok(())
    }

    pub fn calldata(&self) -> Bytes {
        executeFlashArbitrageCall { params: self.params.clone() }.abi_encode().into()
    }

    pub fn borrow_token(&self) -> Address {
        self.params.borrowToken
    }
}

/// Inverse of `BuiltParams::calldata`.
pub fn decode_calldata(calldata: &[u8]) -> Result<FlashLoanArbitrageParams, ArbError> {
    executeFlashArbitrageCall::abi_decode(calldata)
        .map(|call| call.params)
        .map_err(|e| ArbError::Validation(format!("invalid calldata: {e}")))
}
