//! Campaign Discount Engine
//!
//! The campaign discount engine evaluates time-boxed, prioritized, budget-capped promotional
//! campaigns against order content, computes the discount per line, and durably records every
//! application in a usage ledger so that global and per-customer spending caps are never
//! exceeded, even under concurrent order submission and cancellation.
//!
//! The library is divided into three sections:
//! 1. Pure logic: the lifecycle state machine ([`mod@lifecycle`]), targeting and eligibility
//!    matching ([`mod@matching`]), and discount calculation ([`mod@discount`]). These have no
//!    I/O and are exhaustively unit-tested.
//! 2. Storage: the behaviour traits backends implement ([`mod@traits`]) and the SQLite
//!    implementation ([`SqliteDatabase`]). The ledger insert and the campaign's running-total
//!    update always travel in one transaction.
//! 3. The public API: [`CampaignApi`] for administration (definition, lifecycle, reporting) and
//!    [`EvaluationApi`] for the order-time flow (evaluate, reverse).
//!
//! Catalog, customer, and order data are external collaborators: the engine receives pre-resolved
//! projections ([`evaluation_objects::OrderContext`]) and returns
//! [`evaluation_objects::AppliedDiscount`] records for the caller's pricing logic to apply.

mod cde_api;
pub mod db_types;
pub mod discount;
pub mod lifecycle;
pub mod matching;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{db_url, SqliteDatabase};

pub use cde_api::{
    campaign_api::CampaignApi,
    campaign_objects,
    errors::EvaluationError,
    evaluation_api::EvaluationApi,
    evaluation_objects,
};
