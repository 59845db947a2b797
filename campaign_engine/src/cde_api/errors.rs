use thiserror::Error;

use crate::traits::{CampaignStoreError, LedgerError};

/// Errors surfaced by [`crate::EvaluationApi`].
///
/// Budget exhaustion never appears here: a candidate failing its budget check is ordinary
/// ineligibility and evaluation continues with the next candidate.
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    /// Malformed order context or a structural currency mismatch. Nothing was committed.
    #[error("Invalid order context: {0}")]
    Validation(String),
    /// The atomic budget update lost its race repeatedly and bounded retries were exhausted.
    /// The caller may retry the evaluation.
    #[error("Budget update contention persisted past {0} retries")]
    TransientConflict(u32),
    #[error("{0}")]
    Store(#[from] CampaignStoreError),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}
