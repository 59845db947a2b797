use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{Campaign, CampaignUsage, NewCampaignUsage, OrderId};

/// The outcome of an atomic budget-checked commit attempt.
///
/// Budget exhaustion is a normal outcome, not an error: the evaluation pipeline moves on to the
/// next candidate.
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    /// The ledger entry was written and the campaign totals were incremented atomically.
    Committed(CampaignUsage),
    /// A cap would have been exceeded; nothing was written.
    BudgetExhausted(BudgetBreach),
}

/// Which cap rejected the candidate. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetBreach {
    GlobalUsageCount,
    GlobalBudget,
    CustomerUsageCount,
    CustomerBudget,
}

impl std::fmt::Display for BudgetBreach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetBreach::GlobalUsageCount => write!(f, "total usage limit reached"),
            BudgetBreach::GlobalBudget => write!(f, "total budget limit reached"),
            BudgetBreach::CustomerUsageCount => write!(f, "per-customer usage limit reached"),
            BudgetBreach::CustomerBudget => write!(f, "per-customer budget limit reached"),
        }
    }
}

/// Evaluation-time behaviour for campaign storage backends: candidate loading, the atomic usage
/// commit, and reversal.
///
/// Per-campaign budget mutation is linearizable: every commit and reversal touching one
/// campaign's running totals forms a single serial history. Different campaigns are independent.
#[allow(async_fn_in_trait)]
pub trait DiscountLedger: Clone {
    /// Returns the candidate campaigns for evaluation at `now`: `Active`, not soft-deleted, and
    /// inside their date window, ordered by priority descending then creation order.
    ///
    /// As a side effect, any non-terminal campaign observed past its end date is transitioned to
    /// `Expired` first (lazy expiry; safe to run redundantly from concurrent callers).
    async fn active_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, LedgerError>;

    /// Atomically checks all four caps and, if they hold, inserts the ledger entry and
    /// increments the campaign's running totals in one transaction, all or nothing.
    ///
    /// Per-customer aggregates are recomputed live from non-reversed ledger rows inside the same
    /// transaction; they are never cached.
    async fn commit_usage(&self, usage: NewCampaignUsage) -> Result<CommitOutcome, LedgerError>;

    /// Reverses every non-reversed ledger entry for the order, decrementing the owning
    /// campaigns' totals in the same transaction. Idempotent: already-reversed entries are
    /// untouched. Returns the entries reversed by this call.
    async fn reverse_order(&self, order_id: &OrderId) -> Result<Vec<CampaignUsage>, LedgerError>;

    /// Live (count, sum-in-minor-units) of non-reversed usage for one (campaign, customer) pair.
    async fn customer_usage(&self, campaign_id: i64, customer_id: &str) -> Result<(i64, i64), LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    /// The write path lost a race for the database write lock. Retryable.
    #[error("The ledger write lost a race for the database lock")]
    Busy,
    #[error("The requested campaign {0} does not exist")]
    CampaignNotFound(i64),
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<super::CampaignStoreError> for LedgerError {
    fn from(e: super::CampaignStoreError) -> Self {
        use super::CampaignStoreError::*;
        match e {
            DatabaseError(s) if s.contains("database is locked") || s.contains("database table is locked") => {
                LedgerError::Busy
            },
            DatabaseError(s) => LedgerError::DatabaseError(s),
            CampaignNotFound(id) => LedgerError::CampaignNotFound(id),
            other => LedgerError::Validation(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            let msg = db.message();
            if msg.contains("database is locked") || msg.contains("database table is locked") {
                return LedgerError::Busy;
            }
        }
        LedgerError::DatabaseError(e.to_string())
    }
}
