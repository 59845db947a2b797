//! Data objects for the administrative and reporting surface.

use cde_common::Money;
use serde::{Deserialize, Serialize};

use crate::{db_types::DiscountRule, matching::RuleTargets};

/// Aggregate usage for one campaign, sourced from the ledger (not from the running totals, so
/// reports can also see reversed history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignUsageStats {
    pub campaign_id: i64,
    pub committed_count: i64,
    pub committed_total: Money,
    pub reversed_count: i64,
    pub reversed_total: Money,
}

/// A rule together with its resolved target sets, as returned to administration clients.
#[derive(Debug, Clone)]
pub struct RuleWithTargets {
    pub rule: DiscountRule,
    pub targets: RuleTargets,
}
