use cde_common::{Currency, Money};
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Campaign, CampaignStatus, NewCampaign},
    lifecycle::LifecycleOp,
    traits::CampaignStoreError,
};

/// Raw campaign row. Money columns are minor-unit integers denominated in the `currency` column;
/// [`Campaign`] reassembles them into `Money` values.
#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub currency: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: CampaignStatus,
    pub priority: i64,
    pub total_budget_limit: Option<i64>,
    pub total_usage_limit: Option<i64>,
    pub per_customer_budget_limit: Option<i64>,
    pub per_customer_usage_limit: Option<i64>,
    pub total_discount_used: i64,
    pub total_usage_count: i64,
    pub sync_key: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = CampaignStoreError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|_| CampaignStoreError::Validation(format!("Malformed currency on campaign {}: '{}'", row.id, row.currency)))?;
        Ok(Campaign {
            id: row.id,
            name: row.name,
            description: row.description,
            currency,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status,
            priority: row.priority,
            total_budget_limit: row.total_budget_limit.map(|v| Money::new(v, currency)),
            total_usage_limit: row.total_usage_limit,
            per_customer_budget_limit: row.per_customer_budget_limit.map(|v| Money::new(v, currency)),
            per_customer_usage_limit: row.per_customer_usage_limit,
            total_discount_used: Money::new(row.total_discount_used, currency),
            total_usage_count: row.total_usage_count,
            sync_key: row.sync_key,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert_campaign(
    campaign: NewCampaign,
    conn: &mut SqliteConnection,
) -> Result<Campaign, CampaignStoreError> {
    let now = Utc::now();
    let row: CampaignRow = sqlx::query_as(
        r#"
            INSERT INTO campaigns (
                name,
                description,
                currency,
                start_date,
                end_date,
                priority,
                total_budget_limit,
                total_usage_limit,
                per_customer_budget_limit,
                per_customer_usage_limit,
                sync_key,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING *;
        "#,
    )
    .bind(campaign.name)
    .bind(campaign.description)
    .bind(campaign.currency.as_str().to_string())
    .bind(campaign.start_date)
    .bind(campaign.end_date)
    .bind(campaign.priority)
    .bind(campaign.total_budget_limit)
    .bind(campaign.total_usage_limit)
    .bind(campaign.per_customer_budget_limit)
    .bind(campaign.per_customer_usage_limit)
    .bind(campaign.sync_key)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Campaign '{}' inserted with id {}", row.name, row.id);
    row.try_into()
}

pub async fn fetch_campaign(
    campaign_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Campaign>, CampaignStoreError> {
    let row: Option<CampaignRow> =
        sqlx::query_as("SELECT * FROM campaigns WHERE id = $1 AND deleted_at IS NULL")
            .bind(campaign_id)
            .fetch_optional(conn)
            .await?;
    row.map(Campaign::try_from).transpose()
}

pub async fn fetch_campaign_by_sync_key(
    sync_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Campaign>, CampaignStoreError> {
    let row: Option<CampaignRow> =
        sqlx::query_as("SELECT * FROM campaigns WHERE sync_key = $1 AND deleted_at IS NULL")
            .bind(sync_key)
            .fetch_optional(conn)
            .await?;
    row.map(Campaign::try_from).transpose()
}

/// Replaces the definition fields of the campaign carrying `sync_key`. Status, running totals
/// and the ledger are untouched. Returns `None` when no live campaign carries the key.
pub async fn update_campaign_by_sync_key(
    campaign: &NewCampaign,
    sync_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Campaign>, CampaignStoreError> {
    let row: Option<CampaignRow> = sqlx::query_as(
        r#"
            UPDATE campaigns SET
                name = $1,
                description = $2,
                start_date = $3,
                end_date = $4,
                priority = $5,
                total_budget_limit = $6,
                total_usage_limit = $7,
                per_customer_budget_limit = $8,
                per_customer_usage_limit = $9,
                updated_at = $10
            WHERE sync_key = $11 AND deleted_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(&campaign.name)
    .bind(&campaign.description)
    .bind(campaign.start_date)
    .bind(campaign.end_date)
    .bind(campaign.priority)
    .bind(campaign.total_budget_limit)
    .bind(campaign.total_usage_limit)
    .bind(campaign.per_customer_budget_limit)
    .bind(campaign.per_customer_usage_limit)
    .bind(Utc::now())
    .bind(sync_key)
    .fetch_optional(conn)
    .await?;
    row.map(Campaign::try_from).transpose()
}

/// Applies a lifecycle transition as a single guarded UPDATE: the `status IN (...)` clause
/// re-checks the transition table against the current row, so concurrent administrative calls
/// serialize on the database and cannot both succeed.
///
/// Returns `None` when no row qualified (missing, soft-deleted, or in a disallowed status);
/// the caller distinguishes those cases.
pub async fn guarded_transition(
    campaign_id: i64,
    op: LifecycleOp,
    conn: &mut SqliteConnection,
) -> Result<Option<Campaign>, CampaignStoreError> {
    let mut builder = QueryBuilder::new("UPDATE campaigns SET status = ");
    builder.push_bind(op.target());
    builder.push(", updated_at = ");
    builder.push_bind(Utc::now());
    builder.push(" WHERE id = ");
    builder.push_bind(campaign_id);
    builder.push(" AND deleted_at IS NULL AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in op.allowed_from() {
        statuses.push_bind(*status);
    }
    builder.push(") RETURNING *");
    let row: Option<CampaignRow> = builder.build_query_as().fetch_optional(conn).await?;
    row.map(Campaign::try_from).transpose()
}

/// Lazy expiry: flips every non-terminal campaign whose end date has passed to `Expired`.
/// Redundant concurrent invocations are harmless; the guarded UPDATE makes the flip idempotent.
pub async fn expire_overdue(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE campaigns
            SET status = 'Expired', updated_at = $1
            WHERE deleted_at IS NULL
              AND status IN ('Scheduled', 'Active', 'Paused')
              AND end_date < $1
        "#,
    )
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Candidate campaigns for evaluation at `now`: Active, live, inside their window, ordered by
/// priority descending with creation order (id) as the deterministic tiebreak.
pub async fn active_campaigns(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Campaign>, CampaignStoreError> {
    let rows: Vec<CampaignRow> = sqlx::query_as(
        r#"
            SELECT * FROM campaigns
            WHERE deleted_at IS NULL
              AND status = 'Active'
              AND start_date <= $1
              AND end_date >= $1
            ORDER BY priority DESC, id ASC
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Campaign::try_from).collect()
}

pub async fn soft_delete(campaign_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE campaigns SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL")
        .bind(Utc::now())
        .bind(campaign_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// The global half of the budget accountant: increments the running totals only when both
/// global caps still hold, in one conditional UPDATE. Returns `false` (nothing written) when a
/// cap would be exceeded. Must run in the same transaction as the ledger insert.
pub async fn try_reserve_budget(
    campaign_id: i64,
    amount: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE campaigns
            SET total_discount_used = total_discount_used + $1,
                total_usage_count = total_usage_count + 1,
                updated_at = $2
            WHERE id = $3
              AND deleted_at IS NULL
              AND (total_usage_limit IS NULL OR total_usage_count < total_usage_limit)
              AND (total_budget_limit IS NULL OR total_discount_used + $1 <= total_budget_limit)
        "#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(campaign_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Decrements the running totals for one reversed ledger entry. Must run in the same
/// transaction as the reversal flag update.
pub async fn release_budget(
    campaign_id: i64,
    amount: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE campaigns
            SET total_discount_used = total_discount_used - $1,
                total_usage_count = total_usage_count - 1,
                updated_at = $2
            WHERE id = $3
        "#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(campaign_id)
    .execute(conn)
    .await?;
    Ok(())
}
