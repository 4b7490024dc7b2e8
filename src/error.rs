use super::offspring::{FinancialState, KeeperIntent, LifeState, PaperworkState, PlacementState};

/// A patch that would leave the offspring in an inconsistent state. Every
/// variant is a caller mistake and is deterministic for the same inputs.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal placement transition {from:?} -> {to:?}: {reason}")]
    IllegalPlacementTransition {
        from: PlacementState,
        to: PlacementState,
        reason: &'static str,
    },
    #[error("illegal life state transition {from:?} -> {to:?}: {reason}")]
    IllegalLifeStateTransition {
        from: LifeState,
        to: LifeState,
        reason: &'static str,
    },
    #[error("illegal keeper intent transition {from:?} -> {to:?}: {reason}")]
    IllegalKeeperIntentTransition {
        from: KeeperIntent,
        to: KeeperIntent,
        reason: &'static str,
    },
    #[error("illegal financial transition {from:?} -> {to:?}: {reason}")]
    IllegalFinancialTransition {
        from: FinancialState,
        to: FinancialState,
        reason: &'static str,
    },
    #[error("illegal paperwork transition {from:?} -> {to:?}: {reason}")]
    IllegalPaperworkTransition {
        from: PaperworkState,
        to: PaperworkState,
        reason: &'static str,
    },
}

impl TransitionError {
    /// Rejected patches are input errors (4xx), never system faults.
    pub fn is_user_error(&self) -> bool {
        true
    }
    pub fn reason(&self) -> &'static str {
        match self {
            TransitionError::IllegalPlacementTransition { reason, .. }
            | TransitionError::IllegalLifeStateTransition { reason, .. }
            | TransitionError::IllegalKeeperIntentTransition { reason, .. }
            | TransitionError::IllegalFinancialTransition { reason, .. }
            | TransitionError::IllegalPaperworkTransition { reason, .. } => reason,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("offspring {0} not found")]
    NotFound(String),
    #[error("offspring revision is stale: expected {expected}, found {actual}")]
    StaleRevision { expected: String, actual: String },
    #[error("gave up writing offspring after {attempts} conflicting attempts")]
    Contention { attempts: u32 },
}
