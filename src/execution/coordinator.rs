use super::params::BuiltParams;
use super::state::{ExecutionState, SimulatedTransaction, SubmittedTransaction};
use crate::chain::{ChainClient, TxReceipt, TxRequest};
use crate::config::ExecutionConfig;
use crate::data_sync::PoolDataCache;
use crate::data_sync::sensors::now_ms;
use crate::errors::{ArbError, ChainError};
use crate::logic::gas::buffered;
use crate::logic::types::ArbitragePath;
use alloy_primitives::{Address, U256};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
pub struct ExecutionStats {
    pub attempted: AtomicU64,
    pub confirmed: AtomicU64,
    pub reverted: AtomicU64,
    pub timeouts: AtomicU64,
    pub rejected: AtomicU64,
    pub submission_failures: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionStatsSnapshot {
    pub attempted: u64,
    pub confirmed: u64,
    pub reverted: u64,
    pub timeouts: u64,
    pub rejected: u64,
    pub submission_failures: u64,
}

impl ExecutionStats {
    pub fn snapshot(&self) -> ExecutionStatsSnapshot {
        ExecutionStatsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            reverted: self.reverted.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            submission_failures: self.submission_failures.load(Ordering::Relaxed),
        }
    }
}

/// Drives one atomic borrow, swap, repay transaction per path from parameters to a terminal state.
///
/// The signer's nonce is the only shared mutable resource: one attempt per signer holds the
/// signer lock from simulation until its transaction is final. Nothing is ever retried.
pub struct FlashLoanCoordinator {
    client: Arc<dyn ChainClient>,
    cache: Arc<PoolDataCache>,
    config: ExecutionConfig,
    default_tolerance_bps: u32,
    gas_buffer_bps: u32,
    signer_locks: DashMap<Address, Arc<Mutex<()>>>,
    pub stats: ExecutionStats,
}

impl FlashLoanCoordinator {
    pub fn new(
        client: Arc<dyn ChainClient>,
        cache: Arc<PoolDataCache>,
        config: ExecutionConfig,
        default_tolerance_bps: u32,
        gas_buffer_bps: u32,
    ) -> Self {
        Self { client, cache, config, default_tolerance_bps, gas_buffer_bps, signer_locks: DashMap::new(), stats: ExecutionStats::default() }
    }

    pub fn build_params(&self, path: &ArbitragePath) -> Result<BuiltParams, ArbError> {
        BuiltParams::build(path, self.default_tolerance_bps, self.config.deadline_secs, now_ms() / 1_000)
    }

    fn request(&self, built: &BuiltParams, gas_limit: Option<u64>) -> TxRequest {
        TxRequest { from: self.config.signer, to: self.config.contract, data: built.calldata(), value: U256::ZERO, gas_limit }
    }

    /// Dry run. A revert or a timeout means the path is abandoned.
    pub async fn simulate(&self, built: BuiltParams) -> Result<SimulatedTransaction, ArbError> {
        built.validate(now_ms() / 1_000)?;
        let request = self.request(&built, None);
        match tokio::time::timeout(self.config.simulate_timeout(), self.client.simulate(&request)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ArbError::SimulationFailure { reason: e.revert_reason() }),
            Err(_) => return Err(ArbError::Timeout(self.config.simulate_timeout())),
        }

        let gas_limit = self.estimate_gas(&request).await;
        Ok(SimulatedTransaction::new(built, TxRequest { gas_limit: Some(gas_limit), ..request }))
    }

    /// On-chain estimate with the configured buffer, or the configured default when estimation fails.
    async fn estimate_gas(&self, request: &TxRequest) -> u64 {
        match tokio::time::timeout(self.config.simulate_timeout(), self.client.estimate_gas(request)).await {
            Ok(Ok(estimate)) => buffered(estimate, self.gas_buffer_bps),
            Ok(Err(e)) => {
                warn!(error = %e, default = self.config.default_gas_limit, "gas estimation failed, using default limit");
                self.config.default_gas_limit
            }
            Err(_) => {
                warn!(default = self.config.default_gas_limit, "gas estimation timed out, using default limit");
                self.config.default_gas_limit
            }
        }
    }

    /// Sends exactly one transaction. Failures are surfaced, never retried.
    pub async fn submit(&self, simulated: SimulatedTransaction) -> Result<SubmittedTransaction, ArbError> {
        let send = self.client.send_transaction(simulated.request());
        let tx_hash = match tokio::time::timeout(self.config.submit_timeout(), send).await {
            Ok(Ok(tx_hash)) => tx_hash,
            Ok(Err(e)) => return Err(ArbError::SubmissionFailure(e.to_string())),
            Err(_) => return Err(ArbError::SubmissionFailure(format!("no response within {:?}", self.config.submit_timeout()))),
        };
        info!(%tx_hash, path = %simulated.built().path_hash, "arbitrage transaction submitted");
        Ok(SubmittedTransaction { tx_hash, built: simulated.into_built() })
    }

    /// Polls for the receipt until the configured bound.
    pub async fn monitor(&self, submitted: &SubmittedTransaction) -> ExecutionState {
        let tx_hash = submitted.tx_hash;
        let timeout = self.config.receipt_timeout();
        let poll_interval = self.config.receipt_poll_interval();

        let wait_for_receipt = async {
            loop {
                match self.client.get_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => warn!(%tx_hash, error = %e, "receipt lookup failed"),
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        match tokio::time::timeout(timeout, wait_for_receipt).await {
            Ok(receipt) => Self::receipt_state(receipt),
            Err(_) => ExecutionState::Timeout { tx_hash, waited: timeout },
        }
    }

    fn receipt_state(receipt: TxReceipt) -> ExecutionState {
        if receipt.success {
            ExecutionState::Confirmed { tx_hash: receipt.tx_hash, gas_used: receipt.gas_used, block_number: receipt.block_number }
        } else {
            let reason = match receipt.revert_data {
                Some(data) => ChainError::Reverted { data }.revert_reason(),
                None => "reverted without reason".to_string(),
            };
            ExecutionState::Reverted { tx_hash: receipt.tx_hash, reason }
        }
    }

    fn reject(&self, state: ExecutionState, reason: String) -> Result<ExecutionState, ArbError> {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(%state, %reason, "execution rejected");
        state.transition(ExecutionState::Rejected { reason })
    }

    /// Runs one path to a terminal state. Submission failures are the only `Err`.
    pub async fn execute_path(&self, path: &ArbitragePath) -> Result<ExecutionState, ArbError> {
        self.stats.attempted.fetch_add(1, Ordering::Relaxed);
        let state = ExecutionState::Idle;

        let built = match self.build_params(path) {
            Ok(built) => built,
            Err(e) => return self.reject(state, e.to_string()),
        };
        let state = state.transition(ExecutionState::ParamsBuilt)?;

        let lock = self.signer_locks.entry(self.config.signer).or_default().clone();
        let Ok(_signer_guard) = tokio::time::timeout(self.config.signer_lock_timeout(), lock.lock_owned()).await else {
            return self.reject(state, format!("signer {} busy", self.config.signer));
        };

        let simulated = match self.simulate(built).await {
            Ok(simulated) => simulated,
            Err(e) => return self.reject(state, e.to_string()),
        };
        let state = state.transition(ExecutionState::Simulated)?;
        debug!(path = %path.hash, gas_limit = ?simulated.request().gas_limit, "simulation passed");

        let submitted = match self.submit(simulated).await {
            Ok(submitted) => submitted,
            Err(e) => {
                self.stats.submission_failures.fetch_add(1, Ordering::Relaxed);
                error!(path = %path.hash, error = %e, "submission failed");
                return Err(e);
            }
        };
        let state = state.transition(ExecutionState::Submitted { tx_hash: submitted.tx_hash })?;

        let terminal = self.monitor(&submitted).await;
        match &terminal {
            ExecutionState::Confirmed { tx_hash, gas_used, block_number } => {
                self.stats.confirmed.fetch_add(1, Ordering::Relaxed);
                info!(%tx_hash, gas_used, block_number, expected_profit = %submitted.built.expected_profit, "arbitrage confirmed");
            }
            ExecutionState::Reverted { tx_hash, reason } => {
                self.stats.reverted.fetch_add(1, Ordering::Relaxed);
                error!(%tx_hash, %reason, "arbitrage reverted on chain");
            }
            ExecutionState::Timeout { tx_hash, waited } => {
                self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                error!(%tx_hash, ?waited, "no receipt in time, invalidating pool cache");
                self.cache.invalidate_all();
            }
            _ => {}
        }
        state.transition(terminal)
    }
}
