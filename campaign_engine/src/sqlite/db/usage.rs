use cde_common::{Currency, Money};
use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    cde_api::campaign_objects::CampaignUsageStats,
    db_types::{CampaignUsage, NewCampaignUsage, OrderId},
    traits::CampaignStoreError,
};

#[derive(Debug, Clone, FromRow)]
pub struct UsageRow {
    pub id: i64,
    pub campaign_id: i64,
    pub rule_id: i64,
    pub customer_id: String,
    pub order_id: OrderId,
    pub order_item_id: Option<String>,
    pub discount_amount: i64,
    pub currency: String,
    pub used_at: DateTime<Utc>,
    pub is_reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl TryFrom<UsageRow> for CampaignUsage {
    type Error = CampaignStoreError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|_| CampaignStoreError::Validation(format!("Malformed currency on usage {}: '{}'", row.id, row.currency)))?;
        Ok(CampaignUsage {
            id: row.id,
            campaign_id: row.campaign_id,
            rule_id: row.rule_id,
            customer_id: row.customer_id,
            order_id: row.order_id,
            order_item_id: row.order_item_id,
            discount_amount: Money::new(row.discount_amount, currency),
            used_at: row.used_at,
            is_reversed: row.is_reversed,
            reversed_at: row.reversed_at,
        })
    }
}

/// Appends one ledger entry. Not atomic on its own; the caller pairs it with
/// [`super::campaigns::try_reserve_budget`] in one transaction.
pub async fn insert_usage(
    usage: &NewCampaignUsage,
    conn: &mut SqliteConnection,
) -> Result<CampaignUsage, CampaignStoreError> {
    let row: UsageRow = sqlx::query_as(
        r#"
            INSERT INTO campaign_usage (
                campaign_id,
                rule_id,
                customer_id,
                order_id,
                order_item_id,
                discount_amount,
                currency,
                used_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(usage.campaign_id)
    .bind(usage.rule_id)
    .bind(usage.customer_id.clone())
    .bind(usage.order_id.as_str().to_string())
    .bind(usage.order_item_id.clone())
    .bind(usage.discount_amount.amount())
    .bind(usage.discount_amount.currency().as_str().to_string())
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("🧾️ Ledger entry {} written for campaign {} order {}", row.id, row.campaign_id, row.order_id);
    row.try_into()
}

/// Live per-customer aggregate over non-reversed entries: (count, sum in minor units).
/// Deliberately computed from the ledger on every check, never cached, so it cannot drift.
pub async fn customer_usage_totals(
    campaign_id: i64,
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(i64, i64), sqlx::Error> {
    let totals: (i64, i64) = sqlx::query_as(
        r#"
            SELECT COUNT(*), COALESCE(SUM(discount_amount), 0)
            FROM campaign_usage
            WHERE campaign_id = $1 AND customer_id = $2 AND is_reversed = 0
        "#,
    )
    .bind(campaign_id)
    .bind(customer_id)
    .fetch_one(conn)
    .await?;
    Ok(totals)
}

pub async fn fetch_usage_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<CampaignUsage>, CampaignStoreError> {
    let rows: Vec<UsageRow> =
        sqlx::query_as("SELECT * FROM campaign_usage WHERE order_id = $1 ORDER BY id ASC")
            .bind(order_id.as_str())
            .fetch_all(conn)
            .await?;
    rows.into_iter().map(CampaignUsage::try_from).collect()
}

pub async fn fetch_unreversed_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<CampaignUsage>, CampaignStoreError> {
    let rows: Vec<UsageRow> =
        sqlx::query_as("SELECT * FROM campaign_usage WHERE order_id = $1 AND is_reversed = 0 ORDER BY id ASC")
            .bind(order_id.as_str())
            .fetch_all(conn)
            .await?;
    rows.into_iter().map(CampaignUsage::try_from).collect()
}

/// Flips one entry to reversed. The `is_reversed = 0` guard makes redundant reversals no-ops,
/// which is what keeps order-level reversal idempotent under concurrency.
pub async fn mark_reversed(
    usage_id: i64,
    reversed_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE campaign_usage SET is_reversed = 1, reversed_at = $1 WHERE id = $2 AND is_reversed = 0",
    )
    .bind(reversed_at)
    .bind(usage_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Ledger-sourced aggregates for reporting, split by reversal state.
pub async fn usage_stats(
    campaign_id: i64,
    currency: Currency,
    conn: &mut SqliteConnection,
) -> Result<CampaignUsageStats, sqlx::Error> {
    let (committed_count, committed_total): (i64, i64) = sqlx::query_as(
        r#"
            SELECT COUNT(*), COALESCE(SUM(discount_amount), 0)
            FROM campaign_usage
            WHERE campaign_id = $1 AND is_reversed = 0
        "#,
    )
    .bind(campaign_id)
    .fetch_one(&mut *conn)
    .await?;
    let (reversed_count, reversed_total): (i64, i64) = sqlx::query_as(
        r#"
            SELECT COUNT(*), COALESCE(SUM(discount_amount), 0)
            FROM campaign_usage
            WHERE campaign_id = $1 AND is_reversed = 1
        "#,
    )
    .bind(campaign_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(CampaignUsageStats {
        campaign_id,
        committed_count,
        committed_total: Money::new(committed_total, currency),
        reversed_count,
        reversed_total: Money::new(reversed_total, currency),
    })
}
