//! Agent Module
//!
//! Drives the swap workload:
//! - State machine for a single swap operation
//! - Swap orchestration with balance checks and the one-shot funding rule
//! - Amount sampling and adaptive pacing
//! - Per-wallet worker loops and the fleet runner
//! - End-of-run reporting

pub mod fleet;
pub mod orchestrator;
pub mod pacing;
pub mod report;
pub mod state_machine;
pub mod worker;

pub use fleet::{wallet_rng, FleetRunner};
pub use orchestrator::{Confirmation, SwapOrchestrator, SwapOutcome, SwapPolicy};
pub use pacing::{AmountSampler, DelayPolicy};
pub use state_machine::{StageTransition, SwapStage, SwapStateMachine};
pub use worker::WorkerLoop;
