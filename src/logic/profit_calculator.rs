use super::gas::{ExecutionType, GasConfig};
use super::math::{apply_bps, haircut_bps, ratio_bps};
use super::mev_risk::{MevRiskParams, TransactionType};
use super::slippage::{SlippageConfig, path_price_impact_bps};
use super::types::{ArbitragePath, MarketState, ProfitabilityResult, RejectionReason};
use alloy_primitives::{Address, U256};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfitConfig {
    /// Absolute minimum net profit for start tokens without their own minimum.
    pub default_min_profit: U256,
    /// Minimum net profit relative to the input amount.
    pub min_profit_bps: u32,
    /// Net profit must be at least this multiple of the gas cost, 10000 = 1x.
    pub gas_multiplier_bps: u32,
}

impl Default for ProfitConfig {
    fn default() -> Self {
        Self { default_min_profit: U256::ZERO, min_profit_bps: 10, gas_multiplier_bps: 20_000 }
    }
}

/// Turns a candidate path into an exact, risk-adjusted profit figure.
///
/// Pure integer arithmetic, no I/O. Everything market-dependent arrives through `MarketState`.
#[derive(Clone, Debug)]
pub struct ProfitabilityEngine {
    profit: ProfitConfig,
    slippage: SlippageConfig,
    gas: GasConfig,
    mev: MevRiskParams,
    token_minimums: HashMap<Address, U256>,
    parallel: bool,
}

impl ProfitabilityEngine {
    pub fn new(profit: ProfitConfig, slippage: SlippageConfig, gas: GasConfig, mev: MevRiskParams) -> Self {
        Self { profit, slippage, gas, mev, token_minimums: HashMap::new(), parallel: true }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Overrides the absolute minimum profit for paths starting at `token`.
    pub fn with_token_minimum(mut self, token: Address, min_profit: U256) -> Self {
        self.token_minimums.insert(token, min_profit);
        self
    }

    pub fn min_profit_for(&self, token: &Address) -> U256 {
        self.token_minimums.get(token).copied().unwrap_or(self.profit.default_min_profit)
    }

    pub fn gas_config(&self) -> &GasConfig {
        &self.gas
    }

    pub fn execution_type(path: &ArbitragePath) -> ExecutionType {
        if path.flash_loan.is_some() {
            ExecutionType::FlashLoan
        } else if path.len() == 1 {
            ExecutionType::SimpleSwap
        } else {
            ExecutionType::MultiHop
        }
    }

    /// Full breakdown for one path. Every failed threshold is recorded, not just the first.
    pub fn evaluate(&self, path: &ArbitragePath, market: &MarketState) -> ProfitabilityResult {
        let input = path.input_amount;
        if input.is_zero() {
            return ProfitabilityResult::rejected(RejectionReason::ZeroInput);
        }
        let mut reasons = Vec::new();

        let gross_profit = path.final_amount.saturating_sub(input);

        let slippage_bps = match path_price_impact_bps(&path.hops) {
            Ok(impact) => self.slippage.slippage_bps(Some(impact)),
            Err(pool_id) => {
                reasons.push(RejectionReason::ZeroLiquidity(pool_id));
                self.slippage.slippage_bps(None)
            }
        };
        let profit_after_slippage = haircut_bps(gross_profit, slippage_bps);

        let gas_units = self.gas.estimate(path.len(), market.chain_id, Self::execution_type(path));
        let gas_cost_in_token = match market.gas.cost_in_token(gas_units) {
            Some(cost) => cost,
            None => {
                reasons.push(RejectionReason::PriceUnavailable);
                U256::ZERO
            }
        };

        let tx_type = if path.flash_loan.is_some() { TransactionType::FlashLoan } else { TransactionType::Arbitrage };
        let tx_value_usd = market.gas.token_value_usd(input);
        let mev_risk_bps =
            self.mev.mev_risk_bps(tx_type, tx_value_usd, market.risk.congestion.value_bps, market.risk.searcher_density.value_bps);
        let mev_risk_discount = self.mev.risk_discount(profit_after_slippage, input, mev_risk_bps);

        let flash_loan_fee = path.flash_loan.map(|loan| loan.fee_for(input)).unwrap_or_default();

        let net_profit = profit_after_slippage
            .checked_sub(gas_cost_in_token)
            .and_then(|p| p.checked_sub(mev_risk_discount))
            .and_then(|p| p.checked_sub(flash_loan_fee))
            .unwrap_or_default();
        if net_profit.is_zero() {
            reasons.push(RejectionReason::NotProfitable);
        }

        let roi_bps = ratio_bps(net_profit, input, u32::MAX).unwrap_or(u32::MAX);

        let minimum = self.min_profit_for(&path.start_token);
        if net_profit < minimum {
            reasons.push(RejectionReason::BelowAbsoluteMinimum { net_profit, minimum });
        }
        if roi_bps < self.profit.min_profit_bps {
            reasons.push(RejectionReason::BelowRoi { roi_bps, minimum_bps: self.profit.min_profit_bps });
        }
        let required = apply_bps(gas_cost_in_token, self.profit.gas_multiplier_bps);
        if net_profit < required {
            reasons.push(RejectionReason::BelowGasMultiple { net_profit, required });
        }

        let owed = input.saturating_add(flash_loan_fee);
        let loan_repayable = path.final_amount >= owed;
        if !loan_repayable {
            reasons.push(RejectionReason::LoanNotRepayable { final_amount: path.final_amount, owed });
        }

        ProfitabilityResult {
            meets_profit_requirements: reasons.is_empty(),
            gross_profit,
            slippage_bps,
            profit_after_slippage,
            total_fees: path.total_fees,
            gas_units,
            gas_cost_in_token,
            mev_risk_bps,
            mev_risk_discount,
            flash_loan_fee,
            net_profit,
            roi_bps,
            loan_repayable,
            rejection_reasons: reasons,
        }
    }

    /// Evaluates every path against the same market state and copies the costs onto the paths.
    pub fn evaluate_batch(&self, paths: Vec<ArbitragePath>, market: &MarketState) -> Vec<(ArbitragePath, ProfitabilityResult)> {
        let evaluate = |mut path: ArbitragePath| {
            let result = self.evaluate(&path, market);
            path.apply_evaluation(&result);
            (path, result)
        };
        let results: Vec<(ArbitragePath, ProfitabilityResult)> =
            if self.parallel { paths.into_par_iter().map(evaluate).collect() } else { paths.into_iter().map(evaluate).collect() };

        let accepted = results.iter().filter(|(_, r)| r.meets_profit_requirements).count();
        debug!(accepted, total = results.len(), parallel = self.parallel, "profitability evaluation finished");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sync::RiskSnapshot;
    use crate::logic::gas::GasQuote;
    use crate::logic::pools::{ConstantProductPool, PoolId, PoolWrapper};
    use crate::logic::types::{ArbitrageHop, FlashLoanConfig, FlashLoanProvider};
    use crate::utils::constants::{USD_SCALE, WETH};
    use std::sync::Arc;

    fn e18(value: u64) -> U256 {
        U256::from(value) * U256::from(10u64).pow(U256::from(18))
    }

    fn quoted_hop(pool: u8, token_in: Address, token_out: Address, reserve_in: U256, reserve_out: U256, amount_in: U256) -> ArbitrageHop {
        let pool = PoolWrapper::from(ConstantProductPool::new(Address::repeat_byte(pool), token_in, token_out, reserve_in, reserve_out, 30));
        ArbitrageHop::quote(pool, token_in, token_out, amount_in).map(|(hop, _)| hop).unwrap_or_else(|e| panic!("quote failed: {e}"))
    }

    // 10 WETH through two mispriced pools, about 9.5% gross
    fn profitable_path() -> ArbitragePath {
        let t1 = Address::repeat_byte(1);
        let first = quoted_hop(10, WETH, t1, e18(10_000), e18(20_000), e18(10));
        let second = quoted_hop(11, t1, WETH, e18(18_000), e18(10_000), first.amount_out);
        ArbitragePath::new(WETH, vec![first, second], &[]).unwrap_or_else(|e| panic!("invalid path: {e}"))
    }

    fn market(gas_price_gwei: u128) -> MarketState {
        MarketState {
            chain_id: 1,
            block_number: 100,
            gas: GasQuote {
                gas_price_wei: gas_price_gwei * 1_000_000_000,
                native_usd_price: U256::from(2_000u64) * USD_SCALE,
                token_usd_price: U256::from(2_000u64) * USD_SCALE,
                token_decimals: 18,
            },
            risk: Arc::new(RiskSnapshot::from_bps(3_000, 2_000, false)),
        }
    }

    fn engine() -> ProfitabilityEngine {
        ProfitabilityEngine::new(ProfitConfig::default(), SlippageConfig::default(), GasConfig::default(), MevRiskParams::default())
    }

    #[test]
    fn test_profitable_path_breakdown() {
        let path = profitable_path();
        let result = engine().evaluate(&path, &market(20));

        assert!(result.meets_profit_requirements, "{:?}", result.rejection_reasons);
        assert_eq!(result.gross_profit, path.final_amount - path.input_amount);
        assert_eq!(result.gas_units, 324_000);
        assert_eq!(result.gas_cost_in_token, U256::from(324_000u64) * U256::from(20_000_000_000u64));
        assert_eq!(
            result.net_profit,
            result.profit_after_slippage - result.gas_cost_in_token - result.mev_risk_discount - result.flash_loan_fee
        );
        assert!(result.profit_after_slippage < result.gross_profit);
        assert!(result.mev_risk_bps > 0);
        assert!(result.loan_repayable);
    }

    #[test]
    fn test_gas_price_never_increases_profit() {
        let path = profitable_path();
        let engine = engine();
        let mut previous = U256::MAX;
        for gwei in [1u128, 10, 50, 200, 1_000, 10_000, 100_000] {
            let net = engine.evaluate(&path, &market(gwei)).net_profit;
            assert!(net <= previous);
            previous = net;
        }
        assert_eq!(previous, U256::ZERO);
    }

    #[test]
    fn test_below_absolute_minimum_is_rejected() {
        let path = profitable_path();
        let accepted = engine().evaluate(&path, &market(20));
        let strict = engine().with_token_minimum(WETH, accepted.net_profit + U256::from(1u64));

        let result = strict.evaluate(&path, &market(20));
        assert!(!result.meets_profit_requirements);
        assert!(matches!(result.rejection_reasons.as_slice(), [RejectionReason::BelowAbsoluteMinimum { .. }]));
    }

    #[test]
    fn test_flash_loan_fee_is_charged() {
        let path = profitable_path();
        let borrowed = path.clone().with_flash_loan(FlashLoanConfig { provider: FlashLoanProvider::AaveV3, fee_bps: 9 });

        let plain = engine().evaluate(&path, &market(20));
        let loan = engine().evaluate(&borrowed, &market(20));
        assert_eq!(loan.flash_loan_fee, e18(10) * U256::from(9u64) / U256::from(10_000u64));
        assert!(loan.gas_units > plain.gas_units);
        assert!(loan.mev_risk_bps > plain.mev_risk_bps);
        assert!(loan.net_profit < plain.net_profit);
    }

    #[test]
    fn test_unrepayable_loan_is_rejected() {
        let path = profitable_path().with_flash_loan(FlashLoanConfig { provider: FlashLoanProvider::BalancerV2, fee_bps: 5_000 });
        let result = engine().evaluate(&path, &market(20));
        assert!(!result.loan_repayable);
        assert!(result.rejection_reasons.iter().any(|r| matches!(r, RejectionReason::LoanNotRepayable { .. })));
        assert!(result.rejection_reasons.contains(&RejectionReason::NotProfitable));
    }

    #[test]
    fn test_zero_liquidity_hop_rejects_with_max_slippage() {
        let t1 = Address::repeat_byte(1);
        let first = quoted_hop(10, WETH, t1, e18(10_000), e18(20_000), e18(10));
        let empty = PoolWrapper::from(ConstantProductPool::new(Address::repeat_byte(11), t1, WETH, U256::ZERO, e18(10_000), 30));
        let second = ArbitrageHop { pool: empty, token_in: t1, token_out: WETH, amount_in: first.amount_out, amount_out: e18(11) };
        let path = ArbitragePath::new(WETH, vec![first, second], &[]).unwrap_or_else(|e| panic!("invalid path: {e}"));

        let result = engine().evaluate(&path, &market(20));
        assert!(!result.meets_profit_requirements);
        assert_eq!(result.slippage_bps, SlippageConfig::default().max_bps);
        assert!(result.rejection_reasons.contains(&RejectionReason::ZeroLiquidity(PoolId::Address(Address::repeat_byte(11)))));
    }

    #[test]
    fn test_unpriced_token_is_rejected() {
        let path = profitable_path();
        let mut market = market(20);
        market.gas.token_usd_price = U256::ZERO;
        let result = engine().evaluate(&path, &market);
        assert!(result.rejection_reasons.contains(&RejectionReason::PriceUnavailable));
        assert!(!result.meets_profit_requirements);
    }

    #[test]
    fn test_gas_multiple_rule() {
        let path = profitable_path();
        let config = ProfitConfig { gas_multiplier_bps: 100_000_000, ..ProfitConfig::default() };
        let engine = ProfitabilityEngine::new(config, SlippageConfig::default(), GasConfig::default(), MevRiskParams::default());
        let result = engine.evaluate(&path, &market(20));
        assert!(result.rejection_reasons.iter().any(|r| matches!(r, RejectionReason::BelowGasMultiple { .. })));
    }

    #[test]
    fn test_batch_matches_single_evaluation() {
        let paths = vec![profitable_path(), profitable_path().with_flash_loan(FlashLoanConfig { provider: FlashLoanProvider::AaveV3, fee_bps: 9 })];
        let market = market(20);
        let engine = engine();

        let parallel = engine.evaluate_batch(paths.clone(), &market);
        let sequential = engine.clone().with_parallel(false).evaluate_batch(paths.clone(), &market);

        for ((path, result), (seq_path, seq_result)) in parallel.iter().zip(sequential.iter()) {
            assert_eq!(result, seq_result);
            assert_eq!(path.net_profit, result.net_profit);
            assert_eq!(seq_path.slippage_impact_bps, result.slippage_bps);
            assert_eq!(path.total_gas_cost, result.gas_cost_in_token);
        }
        assert_eq!(parallel[0].1, engine.evaluate(&paths[0], &market));
    }
}
