pub mod coordinator;
pub mod params;
pub mod state;

pub use coordinator::{ExecutionStats, ExecutionStatsSnapshot, FlashLoanCoordinator};
pub use params::{BuiltParams, FlashLoanArbitrageParams, SwapStep, decode_calldata};
pub use state::{ExecutionState, SimulatedTransaction, SubmittedTransaction};
