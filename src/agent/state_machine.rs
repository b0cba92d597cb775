//! Swap State Machine
//!
//! Stages of one wallet-level swap operation:
//! - QueryBalance: read the spendable balance
//! - FundWallet: one funding attempt when the balance is too low
//! - Quote / Build: aggregator round trips
//! - Submit: signing and channel fallback
//! - Completed / Failed: terminal

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapStage {
    QueryBalance,
    FundWallet,
    Quote,
    Build,
    Submit,
    Completed,
    Failed,
}

impl std::fmt::Display for SwapStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapStage::QueryBalance => write!(f, "QueryBalance"),
            SwapStage::FundWallet => write!(f, "FundWallet"),
            SwapStage::Quote => write!(f, "Quote"),
            SwapStage::Build => write!(f, "Build"),
            SwapStage::Submit => write!(f, "Submit"),
            SwapStage::Completed => write!(f, "Completed"),
            SwapStage::Failed => write!(f, "Failed"),
        }
    }
}

/// State transition record
#[derive(Debug, Clone)]
pub struct StageTransition {
    pub from: SwapStage,
    pub to: SwapStage,
    pub timestamp: i64,
    pub reason: Option<String>,
}

/// Per-operation state machine; dropped when the operation ends
pub struct SwapStateMachine {
    current: SwapStage,
    history: Vec<StageTransition>,
}

impl SwapStateMachine {
    pub fn new() -> Self {
        Self {
            current: SwapStage::QueryBalance,
            history: Vec::with_capacity(6),
        }
    }

    pub fn current_stage(&self) -> SwapStage {
        self.current
    }

    /// Check if transition is valid
    pub fn can_transition_to(&self, target: SwapStage) -> bool {
        use SwapStage::*;

        match (self.current, target) {
            // Terminal stages never move
            (Completed, _) | (Failed, _) => false,

            // Any live stage can fail
            (_, Failed) => true,

            (QueryBalance, FundWallet) => true,
            (QueryBalance, Quote) => true,

            // Funding happens at most once per operation
            (FundWallet, Quote) => true,

            (Quote, Build) => true,
            (Build, Submit) => true,
            (Submit, Completed) => true,

            _ => false,
        }
    }

    pub fn transition_to(&mut self, target: SwapStage) -> bool {
        self.transition_to_with_reason(target, None)
    }

    pub fn transition_to_with_reason(&mut self, target: SwapStage, reason: Option<String>) -> bool {
        if !self.can_transition_to(target) {
            warn!("Invalid stage transition: {} -> {}", self.current, target);
            return false;
        }

        debug!(
            "Stage transition: {} -> {}{}",
            self.current,
            target,
            reason.as_deref().map(|r| format!(" ({})", r)).unwrap_or_default()
        );

        self.history.push(StageTransition {
            from: self.current,
            to: target,
            timestamp: chrono::Utc::now().timestamp_millis(),
            reason,
        });
        self.current = target;

        true
    }

    pub fn history(&self) -> &[StageTransition] {
        &self.history
    }

    /// Stages visited, starting with the initial one
    pub fn path(&self) -> Vec<SwapStage> {
        std::iter::once(SwapStage::QueryBalance)
            .chain(self.history.iter().map(|t| t.to))
            .collect()
    }

    pub fn funding_attempted(&self) -> bool {
        self.history.iter().any(|t| t.to == SwapStage::FundWallet)
    }
}

impl Default for SwapStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_stage() {
        let sm = SwapStateMachine::new();
        assert_eq!(sm.current_stage(), SwapStage::QueryBalance);
        assert!(sm.history().is_empty());
    }

    #[test]
    fn test_happy_path() {
        let mut sm = SwapStateMachine::new();
        assert!(sm.transition_to(SwapStage::Quote));
        assert!(sm.transition_to(SwapStage::Build));
        assert!(sm.transition_to(SwapStage::Submit));
        assert!(sm.transition_to(SwapStage::Completed));
        assert_eq!(sm.current_stage(), SwapStage::Completed);
        assert_eq!(sm.history().len(), 4);
        assert!(!sm.funding_attempted());
    }

    #[test]
    fn test_funding_path() {
        let mut sm = SwapStateMachine::new();
        assert!(sm.transition_to(SwapStage::FundWallet));
        assert!(sm.transition_to(SwapStage::Quote));
        assert!(sm.funding_attempted());
        assert_eq!(
            sm.path(),
            vec![SwapStage::QueryBalance, SwapStage::FundWallet, SwapStage::Quote]
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = SwapStateMachine::new();
        assert!(!sm.transition_to(SwapStage::Submit));
        assert!(sm.transition_to(SwapStage::Quote));
        assert!(!sm.transition_to(SwapStage::FundWallet));
        assert_eq!(sm.current_stage(), SwapStage::Quote);
    }

    #[test]
    fn test_terminal_is_final() {
        let mut sm = SwapStateMachine::new();
        assert!(sm.transition_to_with_reason(SwapStage::Failed, Some("no funds".into())));
        assert!(!sm.transition_to(SwapStage::Quote));
        assert!(!sm.transition_to(SwapStage::Failed));
        assert_eq!(sm.history()[0].reason.as_deref(), Some("no funds"));
    }
}
