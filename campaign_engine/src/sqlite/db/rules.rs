use cde_common::{Currency, Money};
use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{CustomerTargetType, DiscountRule, DiscountType, NewDiscountRule, ProductTargetType},
    matching::RuleTargets,
    traits::CampaignStoreError,
};

#[derive(Debug, Clone, FromRow)]
pub struct RuleRow {
    pub id: i64,
    pub campaign_id: i64,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_discount_amount: Option<i64>,
    pub product_target_type: ProductTargetType,
    pub customer_target_type: CustomerTargetType,
    pub min_order_amount: Option<i64>,
    pub min_quantity: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl RuleRow {
    /// Rule money columns are denominated in the owning campaign's currency, which the caller
    /// supplies.
    pub fn into_rule(self, currency: Currency) -> DiscountRule {
        DiscountRule {
            id: self.id,
            campaign_id: self.campaign_id,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            max_discount_amount: self.max_discount_amount.map(|v| Money::new(v, currency)),
            product_target_type: self.product_target_type,
            customer_target_type: self.customer_target_type,
            min_order_amount: self.min_order_amount.map(|v| Money::new(v, currency)),
            min_quantity: self.min_quantity,
            created_at: self.created_at,
        }
    }
}

/// Inserts the rule row and all its targeting associations. Not atomic on its own; run inside a
/// transaction.
pub async fn insert_rule(
    campaign_id: i64,
    rule: &NewDiscountRule,
    currency: Currency,
    conn: &mut SqliteConnection,
) -> Result<DiscountRule, CampaignStoreError> {
    let row: RuleRow = sqlx::query_as(
        r#"
            INSERT INTO discount_rules (
                campaign_id,
                discount_type,
                discount_value,
                max_discount_amount,
                product_target_type,
                customer_target_type,
                min_order_amount,
                min_quantity,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(campaign_id)
    .bind(rule.discount_type)
    .bind(rule.discount_value)
    .bind(rule.max_discount_amount)
    .bind(rule.product_target_type)
    .bind(rule.customer_target_type)
    .bind(rule.min_order_amount)
    .bind(rule.min_quantity)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    insert_targets(row.id, "rule_products", "product_id", &rule.product_ids, conn).await?;
    insert_targets(row.id, "rule_categories", "category_id", &rule.category_ids, conn).await?;
    insert_targets(row.id, "rule_brands", "brand_id", &rule.brand_ids, conn).await?;
    insert_targets(row.id, "rule_customers", "customer_id", &rule.customer_ids, conn).await?;
    insert_targets(row.id, "rule_customer_tiers", "tier_id", &rule.tier_ids, conn).await?;
    trace!("🗃️ Rule {} stored for campaign {campaign_id}", row.id);
    Ok(row.into_rule(currency))
}

async fn insert_targets(
    rule_id: i64,
    table: &str,
    column: &str,
    ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    // Table and column names come from the fixed call sites above, never from input.
    for id in ids {
        sqlx::query(&format!("INSERT OR IGNORE INTO {table} (rule_id, {column}) VALUES ($1, $2)"))
            .bind(rule_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// The campaign's rules in definition order.
pub async fn fetch_rules_for_campaign(
    campaign_id: i64,
    currency: Currency,
    conn: &mut SqliteConnection,
) -> Result<Vec<DiscountRule>, sqlx::Error> {
    let rows: Vec<RuleRow> =
        sqlx::query_as("SELECT * FROM discount_rules WHERE campaign_id = $1 ORDER BY id ASC")
            .bind(campaign_id)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(|r| r.into_rule(currency)).collect())
}

pub async fn rule_exists(rule_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM discount_rules WHERE id = $1")
        .bind(rule_id)
        .fetch_optional(conn)
        .await?;
    Ok(id.is_some())
}

/// Loads the five association sets for one rule.
pub async fn fetch_targets(rule_id: i64, conn: &mut SqliteConnection) -> Result<RuleTargets, sqlx::Error> {
    let products: Vec<String> = sqlx::query_scalar("SELECT product_id FROM rule_products WHERE rule_id = $1")
        .bind(rule_id)
        .fetch_all(&mut *conn)
        .await?;
    let categories: Vec<String> = sqlx::query_scalar("SELECT category_id FROM rule_categories WHERE rule_id = $1")
        .bind(rule_id)
        .fetch_all(&mut *conn)
        .await?;
    let brands: Vec<String> = sqlx::query_scalar("SELECT brand_id FROM rule_brands WHERE rule_id = $1")
        .bind(rule_id)
        .fetch_all(&mut *conn)
        .await?;
    let customers: Vec<String> = sqlx::query_scalar("SELECT customer_id FROM rule_customers WHERE rule_id = $1")
        .bind(rule_id)
        .fetch_all(&mut *conn)
        .await?;
    let tiers: Vec<String> = sqlx::query_scalar("SELECT tier_id FROM rule_customer_tiers WHERE rule_id = $1")
        .bind(rule_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(RuleTargets {
        products: products.into_iter().collect(),
        categories: categories.into_iter().collect(),
        brands: brands.into_iter().collect(),
        customers: customers.into_iter().collect(),
        tiers: tiers.into_iter().collect(),
    })
}
