//! Execution Module
//!
//! Everything between "the wallet has enough to swap" and "a channel took
//! the transaction":
//! - DEX aggregator quote and transaction build
//! - Local signing of the built transaction
//! - Ordered submission channels (paymaster first, direct RPC second)

pub mod dex;
pub mod paymaster;
pub mod signer;
pub mod submitter;

pub use dex::{BuiltTransaction, DexClient, Quote, SwapRouter};
pub use paymaster::PaymasterChannel;
pub use submitter::{RpcSubmitChannel, SubmissionChannel, SubmissionPipeline};

use std::fmt;
use thiserror::Error;

/// Base58 of the all-zero signature. Returned by some nodes for a
/// transaction they accepted but cannot identify yet.
pub const PLACEHOLDER_SIGNATURE: &str =
    "1111111111111111111111111111111111111111111111111111111111111111";

/// Why a channel did not take the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// Known, expected failure; move on quietly
    Transient,
    /// Anything else
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectReason {
    pub kind: RejectKind,
    pub detail: String,
}

impl RejectReason {
    pub fn transient(detail: impl Into<String>) -> Self {
        Self {
            kind: RejectKind::Transient,
            detail: detail.into(),
        }
    }

    pub fn hard(detail: impl Into<String>) -> Self {
        Self {
            kind: RejectKind::Hard,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RejectKind::Transient => write!(f, "transient: {}", self.detail),
            RejectKind::Hard => write!(f, "{}", self.detail),
        }
    }
}

/// Result of one channel attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Taken, with a traceable reference
    Accepted(String),
    /// Taken by policy, but not individually traceable
    Ambiguous(String),
    Rejected(RejectReason),
}

/// Reference returned for a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxReference {
    Signature(String),
    Placeholder,
}

impl TxReference {
    /// Traceable signature, if there is one
    pub fn signature(&self) -> Option<&str> {
        match self {
            TxReference::Signature(sig) => Some(sig),
            TxReference::Placeholder => None,
        }
    }
}

impl fmt::Display for TxReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxReference::Signature(sig) => write!(f, "{}", sig),
            TxReference::Placeholder => write!(f, "placeholder"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub channel: &'static str,
    pub reference: TxReference,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("all {attempted} submission channels rejected the transaction (last: {last})")]
    Exhausted { attempted: usize, last: String },
}
