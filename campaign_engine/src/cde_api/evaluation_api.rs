use std::{collections::HashMap, fmt::Debug, time::Duration};

use cde_common::Money;
use log::*;

use crate::{
    cde_api::{
        errors::EvaluationError,
        evaluation_objects::{AppliedDiscount, OrderContext, OrderLine},
    },
    db_types::{Campaign, CampaignUsage, DiscountRule, NewCampaignUsage, OrderId},
    discount::compute_discount,
    matching::{rule_matches, RuleTargets},
    traits::{CampaignManagement, CommitOutcome, DiscountLedger, LedgerError},
};

/// How often a commit that lost the database write lock is retried before the evaluation gives
/// up with a transient-conflict error, and the linear backoff step between attempts.
const MAX_COMMIT_RETRIES: u32 = 5;
const COMMIT_RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// `EvaluationApi` is the order-time surface of the engine: it walks the prioritized candidate
/// list for each order line, commits the first budget-feasible match through the usage ledger,
/// and reverses committed usage when an order is cancelled.
pub struct EvaluationApi<B> {
    db: B,
}

impl<B> Debug for EvaluationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EvaluationApi")
    }
}

impl<B> EvaluationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> EvaluationApi<B>
where B: DiscountLedger + CampaignManagement
{
    /// Evaluates an order against the active campaigns and returns the committed discounts.
    ///
    /// Candidates are ordered by campaign priority descending (creation order as tiebreak), and
    /// within a campaign by rule definition order. The first matching rule that also clears the
    /// budget check wins the line; rules never stack. A line with no surviving candidate simply
    /// has no discount; that is a normal outcome, not an error.
    pub async fn evaluate_order(&self, ctx: &OrderContext) -> Result<Vec<AppliedDiscount>, EvaluationError> {
        validate_context(ctx)?;
        let campaigns = self.db.active_campaigns(ctx.now).await?;
        trace!("🛒️ {} candidate campaigns for order {}", campaigns.len(), ctx.order_id);

        let mut candidates: Vec<(Campaign, Vec<DiscountRule>)> = Vec::with_capacity(campaigns.len());
        for campaign in campaigns {
            if campaign.currency != ctx.subtotal.currency() {
                debug!(
                    "🛒️ Campaign {} is denominated in {}; order {} is {}. Skipping.",
                    campaign.id,
                    campaign.currency,
                    ctx.order_id,
                    ctx.subtotal.currency()
                );
                continue;
            }
            let rules = self.db.fetch_rules(&campaign).await?;
            candidates.push((campaign, rules));
        }

        let mut target_cache: HashMap<i64, RuleTargets> = HashMap::new();
        let mut applied = Vec::new();
        for line in &ctx.lines {
            if let Some(discount) = self.evaluate_line(ctx, line, &candidates, &mut target_cache).await? {
                applied.push(discount);
            }
        }
        debug!("🛒️ Order {} evaluated: {} of {} lines discounted", ctx.order_id, applied.len(), ctx.lines.len());
        Ok(applied)
    }

    /// Walks the ordered candidate list for one line and commits the first feasible discount.
    async fn evaluate_line(
        &self,
        ctx: &OrderContext,
        line: &OrderLine,
        candidates: &[(Campaign, Vec<DiscountRule>)],
        target_cache: &mut HashMap<i64, RuleTargets>,
    ) -> Result<Option<AppliedDiscount>, EvaluationError> {
        let base = line.subtotal();
        for (campaign, rules) in candidates {
            for rule in rules {
                if !target_cache.contains_key(&rule.id) {
                    let targets = self.db.fetch_rule_targets(rule.id).await?;
                    target_cache.insert(rule.id, targets);
                }
                let targets = &target_cache[&rule.id];
                if !rule_matches(rule, targets, line, ctx.subtotal, &ctx.customer_id, ctx.customer_tier.as_deref()) {
                    continue;
                }
                let Some(amount) = compute_discount(rule, base, line.quantity) else {
                    continue;
                };
                let usage = NewCampaignUsage {
                    campaign_id: campaign.id,
                    rule_id: rule.id,
                    customer_id: ctx.customer_id.clone(),
                    order_id: ctx.order_id.clone(),
                    order_item_id: Some(line.order_item_id.clone()),
                    discount_amount: amount,
                };
                match self.commit_with_retry(usage).await? {
                    CommitOutcome::Committed(entry) => {
                        debug!(
                            "🛒️ Line {} of order {} gets {} from campaign {} rule {}",
                            line.order_item_id, ctx.order_id, amount, campaign.id, rule.id
                        );
                        return Ok(Some(AppliedDiscount {
                            campaign_id: campaign.id,
                            rule_id: rule.id,
                            order_item_id: entry.order_item_id.clone(),
                            amount: entry.discount_amount,
                            usage_id: entry.id,
                        }));
                    },
                    CommitOutcome::BudgetExhausted(breach) => {
                        // Not an error. The next candidate may still fit.
                        debug!(
                            "🛒️ Campaign {} rejected for line {} of order {}: {breach}",
                            campaign.id, line.order_item_id, ctx.order_id
                        );
                        continue;
                    },
                }
            }
        }
        Ok(None)
    }

    /// Retries the atomic commit a bounded number of times when it loses the write lock, with
    /// linear backoff, then reports a transient conflict.
    async fn commit_with_retry(&self, usage: NewCampaignUsage) -> Result<CommitOutcome, EvaluationError> {
        let mut attempt = 0u32;
        loop {
            match self.db.commit_usage(usage.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(LedgerError::Busy) if attempt < MAX_COMMIT_RETRIES => {
                    attempt += 1;
                    warn!(
                        "🛒️ Budget update for campaign {} lost the write lock; retry {attempt}/{MAX_COMMIT_RETRIES}",
                        usage.campaign_id
                    );
                    tokio::time::sleep(COMMIT_RETRY_BACKOFF * attempt).await;
                },
                Err(LedgerError::Busy) => return Err(EvaluationError::TransientConflict(MAX_COMMIT_RETRIES)),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reverses all committed usage for a cancelled order. Idempotent.
    pub async fn reverse_order(&self, order_id: &OrderId) -> Result<Vec<CampaignUsage>, EvaluationError> {
        let reversed = self.db.reverse_order(order_id).await?;
        if reversed.is_empty() {
            debug!("🧾️ Nothing to reverse for order {order_id}");
        } else {
            info!("🧾️ Reversed {} ledger entries for order {order_id}", reversed.len());
        }
        Ok(reversed)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn validate_context(ctx: &OrderContext) -> Result<(), EvaluationError> {
    let currency = ctx.subtotal.currency();
    if ctx.customer_id.trim().is_empty() {
        return Err(EvaluationError::Validation("customer_id must not be empty".to_string()));
    }
    if ctx.subtotal.amount() < 0 {
        return Err(EvaluationError::Validation(format!("Order subtotal is negative: {}", ctx.subtotal)));
    }
    for line in &ctx.lines {
        if line.unit_price.currency() != currency {
            return Err(EvaluationError::Validation(format!(
                "Line {} is priced in {} but the order subtotal is in {currency}",
                line.order_item_id,
                line.unit_price.currency()
            )));
        }
        if line.quantity < 0 {
            return Err(EvaluationError::Validation(format!(
                "Line {} has negative quantity {}",
                line.order_item_id, line.quantity
            )));
        }
        if line.unit_price.amount() < 0 {
            return Err(EvaluationError::Validation(format!(
                "Line {} has negative unit price {}",
                line.order_item_id, line.unit_price
            )));
        }
    }
    Ok(())
}
