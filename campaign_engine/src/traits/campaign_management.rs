use thiserror::Error;

use crate::{
    cde_api::campaign_objects::CampaignUsageStats,
    db_types::{Campaign, CampaignUsage, DiscountRule, NewCampaign, NewDiscountRule, OrderId},
    lifecycle::{InvalidTransition, LifecycleOp},
    matching::RuleTargets,
};

/// Administrative and reporting behaviour for campaign storage backends.
///
/// Soft-deleted campaigns are invisible to every method here except their ledger history, which
/// is preserved for audit.
#[allow(async_fn_in_trait)]
pub trait CampaignManagement: Clone {
    /// Stores a new campaign in `Draft` status. Returns the stored record.
    async fn insert_campaign(&self, campaign: NewCampaign) -> Result<Campaign, CampaignStoreError>;

    /// Creates or updates a campaign addressed by its external sync key.
    ///
    /// The payload must carry a sync key. An existing campaign keeps its status and running
    /// totals; only the definition fields (name, description, window, priority, limits) are
    /// updated. Used by integration sync, which does not know internal ids.
    async fn upsert_campaign_by_sync_key(&self, campaign: NewCampaign) -> Result<Campaign, CampaignStoreError>;

    async fn fetch_campaign(&self, campaign_id: i64) -> Result<Option<Campaign>, CampaignStoreError>;

    async fn fetch_campaign_by_sync_key(&self, sync_key: &str) -> Result<Option<Campaign>, CampaignStoreError>;

    /// Stores a rule and its targeting associations in a single transaction.
    async fn insert_rule(&self, campaign_id: i64, rule: NewDiscountRule) -> Result<DiscountRule, CampaignStoreError>;

    /// The campaign's rules in definition order (insertion order).
    async fn fetch_rules(&self, campaign: &Campaign) -> Result<Vec<DiscountRule>, CampaignStoreError>;

    /// The resolved target sets for one rule.
    async fn fetch_rule_targets(&self, rule_id: i64) -> Result<RuleTargets, CampaignStoreError>;

    /// Applies a lifecycle transition with a guarded update, so that concurrent administrative
    /// calls serialize correctly. Returns the updated campaign.
    async fn apply_transition(&self, campaign_id: i64, op: LifecycleOp) -> Result<Campaign, CampaignStoreError>;

    /// Soft-deletes the campaign. Its ledger history remains queryable by order.
    async fn delete_campaign(&self, campaign_id: i64) -> Result<(), CampaignStoreError>;

    /// All ledger entries (reversed included) recorded against one order.
    async fn fetch_usage_for_order(&self, order_id: &OrderId) -> Result<Vec<CampaignUsage>, CampaignStoreError>;

    /// Aggregate usage statistics for a campaign, sourced from the ledger.
    async fn usage_stats(&self, campaign_id: i64) -> Result<CampaignUsageStats, CampaignStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum CampaignStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested campaign {0} does not exist")]
    CampaignNotFound(i64),
    #[error("The requested rule {0} does not exist")]
    RuleNotFound(i64),
    #[error("A campaign with sync key '{0}' already exists")]
    DuplicateSyncKey(String),
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransition),
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for CampaignStoreError {
    fn from(e: sqlx::Error) -> Self {
        CampaignStoreError::DatabaseError(e.to_string())
    }
}
