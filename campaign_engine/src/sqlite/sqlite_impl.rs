//! `SqliteDatabase` is a concrete storage backend for the campaign engine.
//!
//! It implements [`CampaignManagement`] and [`DiscountLedger`] over an `SqlitePool`. Every
//! multi-statement operation runs in a single transaction; in particular the budget-checked
//! usage commit pairs the ledger insert with the conditional running-total update so the two can
//! never diverge.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{campaigns, new_pool, rules, usage};
use crate::{
    cde_api::campaign_objects::CampaignUsageStats,
    db_types::{Campaign, CampaignUsage, DiscountRule, NewCampaign, NewCampaignUsage, NewDiscountRule, OrderId},
    lifecycle::{InvalidTransition, LifecycleOp},
    matching::RuleTargets,
    traits::{BudgetBreach, CampaignManagement, CampaignStoreError, CommitOutcome, DiscountLedger, LedgerError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl CampaignManagement for SqliteDatabase {
    async fn insert_campaign(&self, campaign: NewCampaign) -> Result<Campaign, CampaignStoreError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(key) = campaign.sync_key.as_deref() {
            if campaigns::fetch_campaign_by_sync_key(key, &mut conn).await?.is_some() {
                return Err(CampaignStoreError::DuplicateSyncKey(key.to_string()));
            }
        }
        campaigns::insert_campaign(campaign, &mut conn).await
    }

    async fn upsert_campaign_by_sync_key(&self, campaign: NewCampaign) -> Result<Campaign, CampaignStoreError> {
        let key = campaign
            .sync_key
            .clone()
            .ok_or_else(|| CampaignStoreError::Validation("Upsert requires a sync key".to_string()))?;
        let mut tx = self.pool.begin().await?;
        let result = match campaigns::update_campaign_by_sync_key(&campaign, &key, &mut tx).await? {
            Some(updated) => {
                debug!("🗃️ Campaign {} updated via sync key '{key}'", updated.id);
                updated
            },
            None => campaigns::insert_campaign(campaign, &mut tx).await?,
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_campaign(&self, campaign_id: i64) -> Result<Option<Campaign>, CampaignStoreError> {
        let mut conn = self.pool.acquire().await?;
        campaigns::fetch_campaign(campaign_id, &mut conn).await
    }

    async fn fetch_campaign_by_sync_key(&self, sync_key: &str) -> Result<Option<Campaign>, CampaignStoreError> {
        let mut conn = self.pool.acquire().await?;
        campaigns::fetch_campaign_by_sync_key(sync_key, &mut conn).await
    }

    async fn insert_rule(&self, campaign_id: i64, rule: NewDiscountRule) -> Result<DiscountRule, CampaignStoreError> {
        let mut tx = self.pool.begin().await?;
        let campaign = campaigns::fetch_campaign(campaign_id, &mut tx)
            .await?
            .ok_or(CampaignStoreError::CampaignNotFound(campaign_id))?;
        let rule = rules::insert_rule(campaign_id, &rule, campaign.currency, &mut tx).await?;
        tx.commit().await?;
        Ok(rule)
    }

    async fn fetch_rules(&self, campaign: &Campaign) -> Result<Vec<DiscountRule>, CampaignStoreError> {
        let mut conn = self.pool.acquire().await?;
        let rules = rules::fetch_rules_for_campaign(campaign.id, campaign.currency, &mut conn).await?;
        Ok(rules)
    }

    async fn fetch_rule_targets(&self, rule_id: i64) -> Result<RuleTargets, CampaignStoreError> {
        let mut conn = self.pool.acquire().await?;
        if !rules::rule_exists(rule_id, &mut conn).await? {
            return Err(CampaignStoreError::RuleNotFound(rule_id));
        }
        let targets = rules::fetch_targets(rule_id, &mut conn).await?;
        Ok(targets)
    }

    async fn apply_transition(&self, campaign_id: i64, op: LifecycleOp) -> Result<Campaign, CampaignStoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = campaigns::guarded_transition(campaign_id, op, &mut tx).await?;
        let result = match updated {
            Some(campaign) => campaign,
            None => {
                // Distinguish "gone" from "wrong state" for the caller.
                let current = campaigns::fetch_campaign(campaign_id, &mut tx)
                    .await?
                    .ok_or(CampaignStoreError::CampaignNotFound(campaign_id))?;
                return Err(InvalidTransition { from: current.status, op }.into());
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn delete_campaign(&self, campaign_id: i64) -> Result<(), CampaignStoreError> {
        let mut conn = self.pool.acquire().await?;
        if !campaigns::soft_delete(campaign_id, &mut conn).await? {
            return Err(CampaignStoreError::CampaignNotFound(campaign_id));
        }
        Ok(())
    }

    async fn fetch_usage_for_order(&self, order_id: &OrderId) -> Result<Vec<CampaignUsage>, CampaignStoreError> {
        let mut conn = self.pool.acquire().await?;
        usage::fetch_usage_for_order(order_id, &mut conn).await
    }

    async fn usage_stats(&self, campaign_id: i64) -> Result<CampaignUsageStats, CampaignStoreError> {
        let mut conn = self.pool.acquire().await?;
        let campaign = campaigns::fetch_campaign(campaign_id, &mut conn)
            .await?
            .ok_or(CampaignStoreError::CampaignNotFound(campaign_id))?;
        let stats = usage::usage_stats(campaign_id, campaign.currency, &mut conn).await?;
        Ok(stats)
    }
}

impl DiscountLedger for SqliteDatabase {
    async fn active_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let expired = campaigns::expire_overdue(now, &mut tx).await?;
        if expired > 0 {
            info!("📅️ Lazily expired {expired} campaigns past their end date");
        }
        let candidates = campaigns::active_campaigns(now, &mut tx).await?;
        tx.commit().await?;
        Ok(candidates)
    }

    /// The whole budget check-and-commit is one transaction:
    /// 1. re-read the campaign (limits may have changed),
    /// 2. recompute the per-customer aggregate from the ledger and check the customer caps,
    /// 3. conditionally increment the running totals (global caps re-checked in the UPDATE),
    /// 4. insert the ledger row.
    /// Any failed check rolls the transaction back, so totals and ledger move in lockstep.
    async fn commit_usage(&self, new_usage: NewCampaignUsage) -> Result<CommitOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let campaign = campaigns::fetch_campaign(new_usage.campaign_id, &mut tx)
            .await?
            .ok_or(LedgerError::CampaignNotFound(new_usage.campaign_id))?;
        let amount = new_usage.discount_amount;
        if amount.currency() != campaign.currency {
            return Err(LedgerError::Validation(format!(
                "Discount {amount} does not match campaign {} currency {}",
                campaign.id, campaign.currency
            )));
        }
        if !amount.is_positive() {
            return Err(LedgerError::Validation(format!("Discount amount must be positive, got {amount}")));
        }

        if campaign.per_customer_usage_limit.is_some() || campaign.per_customer_budget_limit.is_some() {
            let (count, spent) =
                usage::customer_usage_totals(campaign.id, &new_usage.customer_id, &mut tx).await?;
            if let Some(limit) = campaign.per_customer_usage_limit {
                if count >= limit {
                    return Ok(CommitOutcome::BudgetExhausted(BudgetBreach::CustomerUsageCount));
                }
            }
            if let Some(limit) = campaign.per_customer_budget_limit {
                if spent + amount.amount() > limit.amount() {
                    return Ok(CommitOutcome::BudgetExhausted(BudgetBreach::CustomerBudget));
                }
            }
        }

        if !campaigns::try_reserve_budget(campaign.id, amount.amount(), &mut tx).await? {
            // The conditional UPDATE cannot tell which cap failed; look at the totals we read.
            let breach = match campaign.total_usage_limit {
                Some(limit) if campaign.total_usage_count >= limit => BudgetBreach::GlobalUsageCount,
                _ => BudgetBreach::GlobalBudget,
            };
            return Ok(CommitOutcome::BudgetExhausted(breach));
        }
        let entry = usage::insert_usage(&new_usage, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🧾️ Usage {} committed: campaign {} charged {} for order {}",
            entry.id, entry.campaign_id, entry.discount_amount, entry.order_id
        );
        Ok(CommitOutcome::Committed(entry))
    }

    async fn reverse_order(&self, order_id: &OrderId) -> Result<Vec<CampaignUsage>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let entries = usage::fetch_unreversed_for_order(order_id, &mut tx).await?;
        let now = Utc::now();
        let mut reversed = Vec::with_capacity(entries.len());
        for mut entry in entries {
            // The guard makes a lost race (someone else reversed it first) a clean no-op.
            if usage::mark_reversed(entry.id, now, &mut tx).await? {
                campaigns::release_budget(entry.campaign_id, entry.discount_amount.amount(), &mut tx).await?;
                entry.is_reversed = true;
                entry.reversed_at = Some(now);
                reversed.push(entry);
            }
        }
        tx.commit().await?;
        Ok(reversed)
    }

    async fn customer_usage(&self, campaign_id: i64, customer_id: &str) -> Result<(i64, i64), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let totals = usage::customer_usage_totals(campaign_id, customer_id, &mut conn).await?;
        Ok(totals)
    }
}
