use super::params::BuiltParams;
use crate::chain::TxRequest;
use crate::errors::ArbError;
use alloy_primitives::B256;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Lifecycle of one execution attempt.
///
/// `Idle -> ParamsBuilt -> Simulated -> Submitted -> {Confirmed | Reverted | Timeout}`, with
/// `Rejected` reachable from every state before submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    ParamsBuilt,
    Simulated,
    Submitted { tx_hash: B256 },
    Confirmed { tx_hash: B256, gas_used: u64, block_number: u64 },
    Reverted { tx_hash: B256, reason: String },
    Timeout { tx_hash: B256, waited: Duration },
    Rejected { reason: String },
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Confirmed { .. }
                | ExecutionState::Reverted { .. }
                | ExecutionState::Timeout { .. }
                | ExecutionState::Rejected { .. }
        )
    }

    pub fn can_transition_to(&self, next: &ExecutionState) -> bool {
        use ExecutionState::*;
        match (self, next) {
            (Idle, ParamsBuilt) | (ParamsBuilt, Simulated) => true,
            (Simulated, Submitted { .. }) => true,
            (Idle | ParamsBuilt | Simulated, Rejected { .. }) => true,
            (Submitted { tx_hash }, Confirmed { tx_hash: next_hash, .. })
            | (Submitted { tx_hash }, Reverted { tx_hash: next_hash, .. })
            | (Submitted { tx_hash }, Timeout { tx_hash: next_hash, .. }) => tx_hash == next_hash,
            _ => false,
        }
    }

    pub fn transition(self, next: ExecutionState) -> Result<ExecutionState, ArbError> {
        if self.can_transition_to(&next) {
            Ok(next)
        } else {
            Err(ArbError::Validation(format!("illegal execution transition {self} -> {next}")))
        }
    }

    /// Confirmed hash, or the failure as an error.
    pub fn into_result(self) -> Result<B256, ArbError> {
        match self {
            ExecutionState::Confirmed { tx_hash, .. } => Ok(tx_hash),
            ExecutionState::Reverted { reason, .. } => Err(ArbError::ExecutionRevert { reason }),
            ExecutionState::Timeout { waited, .. } => Err(ArbError::Timeout(waited)),
            ExecutionState::Rejected { reason } => Err(ArbError::SimulationFailure { reason }),
            other => Err(ArbError::Validation(format!("execution not finished: {other}"))),
        }
    }
}

impl Display for ExecutionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionState::Idle => write!(f, "IDLE"),
            ExecutionState::ParamsBuilt => write!(f, "PARAMS_BUILT"),
            ExecutionState::Simulated => write!(f, "SIMULATED"),
            ExecutionState::Submitted { tx_hash } => write!(f, "SUBMITTED({tx_hash})"),
            ExecutionState::Confirmed { tx_hash, .. } => write!(f, "CONFIRMED({tx_hash})"),
            ExecutionState::Reverted { reason, .. } => write!(f, "REVERTED({reason})"),
            ExecutionState::Timeout { tx_hash, .. } => write!(f, "TIMEOUT({tx_hash})"),
            ExecutionState::Rejected { reason } => write!(f, "REJECTED({reason})"),
        }
    }
}

/// Parameters that passed a dry run. Only the coordinator can create one, so nothing
/// reaches submission without a successful simulation.
#[derive(Debug)]
pub struct SimulatedTransaction {
    built: BuiltParams,
    request: TxRequest,
}

impl SimulatedTransaction {
    pub(super) fn new(built: BuiltParams, request: TxRequest) -> Self {
        Self { built, request }
    }

    pub fn built(&self) -> &BuiltParams {
        &self.built
    }

    pub fn request(&self) -> &TxRequest {
        &self.request
    }

    pub fn into_built(self) -> BuiltParams {
        self.built
    }
}

#[derive(Debug)]
pub struct SubmittedTransaction {
    pub tx_hash: B256,
    pub built: BuiltParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() -> eyre::Result<()> {
        let hash = B256::with_last_byte(1);
        let state = ExecutionState::Idle
            .transition(ExecutionState::ParamsBuilt)?
            .transition(ExecutionState::Simulated)?
            .transition(ExecutionState::Submitted { tx_hash: hash })?
            .transition(ExecutionState::Confirmed { tx_hash: hash, gas_used: 1, block_number: 2 })?;
        assert!(state.is_terminal());
        assert_eq!(state.into_result()?, hash);
        Ok(())
    }

    #[test]
    fn test_illegal_transitions() {
        let hash = B256::with_last_byte(1);
        assert!(ExecutionState::Idle.transition(ExecutionState::Simulated).is_err());
        assert!(ExecutionState::ParamsBuilt.transition(ExecutionState::Submitted { tx_hash: hash }).is_err());
        assert!(ExecutionState::Submitted { tx_hash: hash }.transition(ExecutionState::Rejected { reason: "late".to_string() }).is_err());
        assert!(
            ExecutionState::Submitted { tx_hash: hash }
                .transition(ExecutionState::Confirmed { tx_hash: B256::with_last_byte(2), gas_used: 1, block_number: 2 })
                .is_err()
        );
        assert!(ExecutionState::Rejected { reason: "x".to_string() }.transition(ExecutionState::ParamsBuilt).is_err());
    }

    #[test]
    fn test_terminal_states_map_to_errors() {
        let hash = B256::with_last_byte(1);
        assert!(!ExecutionState::Submitted { tx_hash: hash }.is_terminal());
        assert_eq!(
            ExecutionState::Reverted { tx_hash: hash, reason: "K".to_string() }.into_result(),
            Err(ArbError::ExecutionRevert { reason: "K".to_string() })
        );
        assert_eq!(
            ExecutionState::Timeout { tx_hash: hash, waited: Duration::from_secs(1) }.into_result(),
            Err(ArbError::Timeout(Duration::from_secs(1)))
        );
        assert!(matches!(ExecutionState::Simulated.into_result(), Err(ArbError::Validation(_))));
    }
}
