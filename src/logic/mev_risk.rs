use crate::logic::math::{apply_bps, ratio_bps};
use crate::utils::constants::{BPS, USD_SCALE};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Transaction shape, ordered by how attractive it is to front-run.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    LiquidityProvision,
    Arbitrage,
    FlashLoan,
    FrontRunnable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontRunProbabilities {
    pub liquidity_provision_bps: u32,
    pub arbitrage_bps: u32,
    pub flash_loan_bps: u32,
    pub front_runnable_bps: u32,
}

impl Default for FrontRunProbabilities {
    fn default() -> Self {
        Self { liquidity_provision_bps: 2_000, arbitrage_bps: 7_000, flash_loan_bps: 8_000, front_runnable_bps: 9_000 }
    }
}

/// Adversarial risk model. All weights are basis points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MevRiskParams {
    pub base_risk_bps: u32,
    pub value_sensitivity_bps: u32,
    pub congestion_factor_bps: u32,
    pub searcher_density_bps: u32,
    pub front_run: FrontRunProbabilities,
    /// Transaction value (USD, 1e18 scaled) at which value sensitivity saturates.
    pub reference_value_usd: U256,
    /// Discount never exceeds this share of the transaction value.
    pub max_value_discount_bps: u32,
}

impl Default for MevRiskParams {
    fn default() -> Self {
        Self {
            base_risk_bps: 10,
            value_sensitivity_bps: 1_500,
            congestion_factor_bps: 3_000,
            searcher_density_bps: 2_500,
            front_run: FrontRunProbabilities::default(),
            reference_value_usd: U256::from(100_000u64) * USD_SCALE,
            max_value_discount_bps: 9_500,
        }
    }
}

impl MevRiskParams {
    pub fn front_run_probability_bps(&self, tx_type: TransactionType) -> u32 {
        match tx_type {
            TransactionType::LiquidityProvision => self.front_run.liquidity_provision_bps,
            TransactionType::Arbitrage => self.front_run.arbitrage_bps,
            TransactionType::FlashLoan => self.front_run.flash_loan_bps,
            TransactionType::FrontRunnable => self.front_run.front_runnable_bps,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let weights = [
            ("base_risk_bps", self.base_risk_bps),
            ("value_sensitivity_bps", self.value_sensitivity_bps),
            ("congestion_factor_bps", self.congestion_factor_bps),
            ("searcher_density_bps", self.searcher_density_bps),
            ("max_value_discount_bps", self.max_value_discount_bps),
            ("front_run.liquidity_provision_bps", self.front_run.liquidity_provision_bps),
            ("front_run.arbitrage_bps", self.front_run.arbitrage_bps),
            ("front_run.flash_loan_bps", self.front_run.flash_loan_bps),
            ("front_run.front_runnable_bps", self.front_run.front_runnable_bps),
        ];
        if let Some((name, value)) = weights.iter().find(|(_, value)| *value > BPS) {
            return Err(format!("mev.{name} = {value} exceeds {BPS}"));
        }
        let p = &self.front_run;
        if !(p.liquidity_provision_bps < p.arbitrage_bps && p.arbitrage_bps < p.flash_loan_bps && p.flash_loan_bps < p.front_runnable_bps) {
            return Err("front-run probabilities must increase from liquidity provision to front-runnable".to_string());
        }
        Ok(())
    }

    /// Transaction value relative to the reference value, capped at 1.
    pub fn value_ratio_bps(&self, tx_value_usd: U256) -> u32 {
        ratio_bps(tx_value_usd, self.reference_value_usd, BPS).unwrap_or(BPS)
    }

    /// `(base + valueSensitivity*value + congestionFactor*congestion + densityWeight*density) * P(front-run)`,
    /// capped at 10000 bps.
    pub fn mev_risk_bps(&self, tx_type: TransactionType, tx_value_usd: U256, congestion_bps: u32, searcher_density_bps: u32) -> u32 {
        let value_ratio = self.value_ratio_bps(tx_value_usd) as u64;
        let raw = self.base_risk_bps as u64 * BPS as u64
            + self.value_sensitivity_bps as u64 * value_ratio
            + self.congestion_factor_bps as u64 * congestion_bps.min(BPS) as u64
            + self.searcher_density_bps as u64 * searcher_density_bps.min(BPS) as u64;
        let raw_bps = raw / BPS as u64;
        let risk = raw_bps * self.front_run_probability_bps(tx_type) as u64 / BPS as u64;
        risk.min(BPS as u64) as u32
    }

    /// Expected loss to adversaries: `min(profit, maxShare * txValue) * risk`.
    pub fn risk_discount(&self, profit: U256, tx_value: U256, risk_bps: u32) -> U256 {
        let exposed = profit.min(apply_bps(tx_value, self.max_value_discount_bps));
        apply_bps(exposed, risk_bps)
    }
}
