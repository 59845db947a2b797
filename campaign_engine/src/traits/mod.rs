//! Behaviour traits that a storage backend must implement to drive the campaign engine.
//!
//! * [`CampaignManagement`] covers administration: campaign and rule definition, lifecycle
//!   transitions, and reporting reads.
//! * [`DiscountLedger`] covers the evaluation-time hot path: candidate loading (with lazy
//!   expiry), the atomic budget-checked usage commit, and reversal.
//!
//! Backends implement both on the same handle; the SQLite implementation lives in
//! [`crate::SqliteDatabase`].

mod campaign_management;
mod discount_ledger;

pub use campaign_management::{CampaignManagement, CampaignStoreError};
pub use discount_ledger::{BudgetBreach, CommitOutcome, DiscountLedger, LedgerError};
