use std::fmt::Debug;

use log::*;

use crate::{
    cde_api::campaign_objects::{CampaignUsageStats, RuleWithTargets},
    db_types::{Campaign, CampaignUsage, DiscountRule, NewCampaign, NewDiscountRule, OrderId},
    lifecycle::LifecycleOp,
    traits::{CampaignManagement, CampaignStoreError},
};

/// `CampaignApi` is the administrative surface of the engine: campaign and rule definition,
/// lifecycle transitions, sync-key upserts, soft deletion, and reporting reads.
pub struct CampaignApi<B> {
    db: B,
}

impl<B> Debug for CampaignApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CampaignApi")
    }
}

impl<B> CampaignApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CampaignApi<B>
where B: CampaignManagement
{
    /// Creates a new campaign in `Draft` status.
    ///
    /// Rejects `end_date <= start_date` and negative limits before anything is written.
    pub async fn create_campaign(&self, campaign: NewCampaign) -> Result<Campaign, CampaignStoreError> {
        validate_campaign(&campaign)?;
        let campaign = self.db.insert_campaign(campaign).await?;
        info!("🎯️ Campaign '{}' created with id {} ({})", campaign.name, campaign.id, campaign.status);
        Ok(campaign)
    }

    /// Creates or updates a campaign addressed by its external sync key. Definition fields are
    /// replaced; status, running totals, and the ledger are untouched.
    pub async fn upsert_campaign(&self, campaign: NewCampaign) -> Result<Campaign, CampaignStoreError> {
        validate_campaign(&campaign)?;
        if campaign.sync_key.is_none() {
            return Err(CampaignStoreError::Validation("Upsert requires a sync key".to_string()));
        }
        let campaign = self.db.upsert_campaign_by_sync_key(campaign).await?;
        debug!("🎯️ Campaign '{}' upserted via sync key (id {})", campaign.name, campaign.id);
        Ok(campaign)
    }

    /// Adds a rule (with its targeting associations) to a campaign.
    pub async fn add_rule(
        &self,
        campaign_id: i64,
        rule: NewDiscountRule,
    ) -> Result<DiscountRule, CampaignStoreError> {
        validate_rule(&rule)?;
        let rule = self.db.insert_rule(campaign_id, rule).await?;
        debug!("🎯️ Rule {} ({} {}) added to campaign {campaign_id}", rule.id, rule.discount_type, rule.discount_value);
        Ok(rule)
    }

    pub async fn fetch_campaign(&self, campaign_id: i64) -> Result<Option<Campaign>, CampaignStoreError> {
        self.db.fetch_campaign(campaign_id).await
    }

    pub async fn fetch_campaign_by_sync_key(&self, sync_key: &str) -> Result<Option<Campaign>, CampaignStoreError> {
        self.db.fetch_campaign_by_sync_key(sync_key).await
    }

    /// The campaign's rules with their resolved target sets, in definition order.
    pub async fn fetch_rules(&self, campaign_id: i64) -> Result<Vec<RuleWithTargets>, CampaignStoreError> {
        let campaign = self
            .db
            .fetch_campaign(campaign_id)
            .await?
            .ok_or(CampaignStoreError::CampaignNotFound(campaign_id))?;
        let rules = self.db.fetch_rules(&campaign).await?;
        let mut result = Vec::with_capacity(rules.len());
        for rule in rules {
            let targets = self.db.fetch_rule_targets(rule.id).await?;
            result.push(RuleWithTargets { rule, targets });
        }
        Ok(result)
    }

    /// Draft → Scheduled.
    pub async fn schedule(&self, campaign_id: i64) -> Result<Campaign, CampaignStoreError> {
        self.transition(campaign_id, LifecycleOp::Schedule).await
    }

    /// Scheduled | Paused → Active.
    pub async fn activate(&self, campaign_id: i64) -> Result<Campaign, CampaignStoreError> {
        self.transition(campaign_id, LifecycleOp::Activate).await
    }

    /// Scheduled | Active → Paused.
    pub async fn pause(&self, campaign_id: i64) -> Result<Campaign, CampaignStoreError> {
        self.transition(campaign_id, LifecycleOp::Pause).await
    }

    /// Any non-terminal → Cancelled.
    pub async fn cancel(&self, campaign_id: i64) -> Result<Campaign, CampaignStoreError> {
        self.transition(campaign_id, LifecycleOp::Cancel).await
    }

    async fn transition(&self, campaign_id: i64, op: LifecycleOp) -> Result<Campaign, CampaignStoreError> {
        let campaign = self.db.apply_transition(campaign_id, op).await?;
        info!("🎯️ Campaign {campaign_id} is now {}", campaign.status);
        Ok(campaign)
    }

    /// Soft-deletes a campaign. Usage history is preserved for audit.
    pub async fn delete_campaign(&self, campaign_id: i64) -> Result<(), CampaignStoreError> {
        self.db.delete_campaign(campaign_id).await?;
        info!("🎯️ Campaign {campaign_id} soft-deleted");
        Ok(())
    }

    /// All ledger entries recorded against an order, reversed ones included.
    pub async fn usage_for_order(&self, order_id: &OrderId) -> Result<Vec<CampaignUsage>, CampaignStoreError> {
        self.db.fetch_usage_for_order(order_id).await
    }

    /// Ledger-sourced usage statistics for reporting.
    pub async fn usage_stats(&self, campaign_id: i64) -> Result<CampaignUsageStats, CampaignStoreError> {
        self.db.usage_stats(campaign_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn validate_campaign(campaign: &NewCampaign) -> Result<(), CampaignStoreError> {
    if campaign.name.trim().is_empty() {
        return Err(CampaignStoreError::Validation("Campaign name must not be empty".to_string()));
    }
    if campaign.end_date <= campaign.start_date {
        return Err(CampaignStoreError::Validation(format!(
            "end_date ({}) must be after start_date ({})",
            campaign.end_date, campaign.start_date
        )));
    }
    for (field, value) in [
        ("total_budget_limit", campaign.total_budget_limit),
        ("total_usage_limit", campaign.total_usage_limit),
        ("per_customer_budget_limit", campaign.per_customer_budget_limit),
        ("per_customer_usage_limit", campaign.per_customer_usage_limit),
    ] {
        if matches!(value, Some(v) if v <= 0) {
            return Err(CampaignStoreError::Validation(format!("{field} must be positive when set")));
        }
    }
    Ok(())
}

fn validate_rule(rule: &NewDiscountRule) -> Result<(), CampaignStoreError> {
    use crate::db_types::{CustomerTargetType::*, DiscountType::*, ProductTargetType::*};
    if rule.discount_value <= 0 {
        return Err(CampaignStoreError::Validation("discount_value must be positive".to_string()));
    }
    if rule.discount_type == Percentage && rule.discount_value > 100 {
        return Err(CampaignStoreError::Validation(format!(
            "Percentage discount_value must be at most 100, got {}",
            rule.discount_value
        )));
    }
    if matches!(rule.max_discount_amount, Some(v) if v <= 0) {
        return Err(CampaignStoreError::Validation("max_discount_amount must be positive when set".to_string()));
    }
    if matches!(rule.min_order_amount, Some(v) if v <= 0) {
        return Err(CampaignStoreError::Validation("min_order_amount must be positive when set".to_string()));
    }
    if matches!(rule.min_quantity, Some(v) if v <= 0) {
        return Err(CampaignStoreError::Validation("min_quantity must be positive when set".to_string()));
    }
    let empty_target = match rule.product_target_type {
        AllProducts => false,
        SpecificProducts => rule.product_ids.is_empty(),
        SpecificCategories => rule.category_ids.is_empty(),
        SpecificBrands => rule.brand_ids.is_empty(),
    };
    if empty_target {
        return Err(CampaignStoreError::Validation(format!(
            "{:?} requires at least one product target",
            rule.product_target_type
        )));
    }
    let empty_target = match rule.customer_target_type {
        AllCustomers => false,
        SpecificCustomers => rule.customer_ids.is_empty(),
        SpecificTiers => rule.tier_ids.is_empty(),
    };
    if empty_target {
        return Err(CampaignStoreError::Validation(format!(
            "{:?} requires at least one customer target",
            rule.customer_target_type
        )));
    }
    Ok(())
}
