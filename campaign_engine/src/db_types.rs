//! Core data types for the campaign discount engine.
//!
//! These types mirror the persisted schema: campaigns, their discount rules, and the usage ledger.
//! Money amounts always carry their currency; a campaign's money-valued limits and rule values are
//! denominated in the campaign's currency.

use std::{fmt::Display, str::FromStr};

use cde_common::{Currency, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {field}: {value}")]
pub struct ConversionError {
    pub field: &'static str,
    pub value: String,
}

impl ConversionError {
    pub fn new(field: &'static str, value: impl Display) -> Self {
        Self { field, value: value.to_string() }
    }
}

//--------------------------------------   CampaignStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CampaignStatus {
    /// Newly created; not visible to evaluation.
    Draft,
    /// Approved and waiting for its start date.
    Scheduled,
    /// Eligible for evaluation while inside its date window.
    Active,
    /// Temporarily withheld from evaluation.
    Paused,
    /// Terminal. Cancelled by an administrator.
    Cancelled,
    /// Terminal. The end date passed; set lazily by evaluation reads.
    Expired,
}

impl CampaignStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Cancelled | CampaignStatus::Expired)
    }
}

impl Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "Draft"),
            CampaignStatus::Scheduled => write!(f, "Scheduled"),
            CampaignStatus::Active => write!(f, "Active"),
            CampaignStatus::Paused => write!(f, "Paused"),
            CampaignStatus::Cancelled => write!(f, "Cancelled"),
            CampaignStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for CampaignStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Scheduled" => Ok(Self::Scheduled),
            "Active" => Ok(Self::Active),
            "Paused" => Ok(Self::Paused),
            "Cancelled" => Ok(Self::Cancelled),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError::new("campaign status", s)),
        }
    }
}

//--------------------------------------    DiscountType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum DiscountType {
    /// `value` is a whole percentage of the base amount (1..=100).
    Percentage,
    /// `value` is an absolute amount in minor units, clamped to the base.
    FixedAmount,
    /// `value` is an amount in minor units per unit of quantity, clamped to the base.
    FixedAmountPerUnit,
}

impl Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "Percentage"),
            DiscountType::FixedAmount => write!(f, "FixedAmount"),
            DiscountType::FixedAmountPerUnit => write!(f, "FixedAmountPerUnit"),
        }
    }
}

//--------------------------------------  ProductTargetType  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ProductTargetType {
    AllProducts,
    SpecificProducts,
    SpecificCategories,
    SpecificBrands,
}

//-------------------------------------- CustomerTargetType  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CustomerTargetType {
    AllCustomers,
    SpecificCustomers,
    SpecificTiers,
}

//--------------------------------------       OrderId       ---------------------------------------------------------
/// The order identifier as assigned by the order subsystem. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl<S: Into<String>> From<S> for OrderId {
    fn from(s: S) -> Self {
        Self(s.into())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      Campaign       ---------------------------------------------------------
/// A promotional container: a date window, a priority, budget caps and running totals.
///
/// The running totals (`total_discount_used`, `total_usage_count`) are maintained atomically with
/// every ledger write and always equal the aggregate of the campaign's non-reversed usage entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub currency: Currency,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: CampaignStatus,
    pub priority: i64,
    pub total_budget_limit: Option<Money>,
    pub total_usage_limit: Option<i64>,
    pub per_customer_budget_limit: Option<Money>,
    pub per_customer_usage_limit: Option<i64>,
    pub total_discount_used: Money,
    pub total_usage_count: i64,
    pub sync_key: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Whether `now` falls inside the campaign's `[start_date, end_date]` window.
    pub fn is_in_window(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }
}

//--------------------------------------     NewCampaign     ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub description: Option<String>,
    pub currency: Currency,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub priority: i64,
    /// Minor units in the campaign currency.
    pub total_budget_limit: Option<i64>,
    pub total_usage_limit: Option<i64>,
    /// Minor units in the campaign currency.
    pub per_customer_budget_limit: Option<i64>,
    pub per_customer_usage_limit: Option<i64>,
    pub sync_key: Option<String>,
}

impl NewCampaign {
    pub fn new(
        name: impl Into<String>,
        currency: Currency,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            currency,
            start_date,
            end_date,
            priority: 0,
            total_budget_limit: None,
            total_usage_limit: None,
            per_customer_budget_limit: None,
            per_customer_usage_limit: None,
            sync_key: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_total_budget_limit(mut self, limit: i64) -> Self {
        self.total_budget_limit = Some(limit);
        self
    }

    pub fn with_total_usage_limit(mut self, limit: i64) -> Self {
        self.total_usage_limit = Some(limit);
        self
    }

    pub fn with_per_customer_budget_limit(mut self, limit: i64) -> Self {
        self.per_customer_budget_limit = Some(limit);
        self
    }

    pub fn with_per_customer_usage_limit(mut self, limit: i64) -> Self {
        self.per_customer_usage_limit = Some(limit);
        self
    }

    pub fn with_sync_key(mut self, key: impl Into<String>) -> Self {
        self.sync_key = Some(key.into());
        self
    }
}

//--------------------------------------    DiscountRule     ---------------------------------------------------------
/// One discount policy belonging to exactly one campaign. Multiple rules per campaign are
/// independent alternatives; they are never combined on a single line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountRule {
    pub id: i64,
    pub campaign_id: i64,
    pub discount_type: DiscountType,
    /// Whole percent for `Percentage`, minor units otherwise.
    pub discount_value: i64,
    pub max_discount_amount: Option<Money>,
    pub product_target_type: ProductTargetType,
    pub customer_target_type: CustomerTargetType,
    /// Gate on the order subtotal.
    pub min_order_amount: Option<Money>,
    /// Gate on the line quantity.
    pub min_quantity: Option<i64>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   NewDiscountRule   ---------------------------------------------------------
/// Insert payload for a discount rule, including its target sets. All money values are minor units
/// in the owning campaign's currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscountRule {
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_discount_amount: Option<i64>,
    pub product_target_type: ProductTargetType,
    pub customer_target_type: CustomerTargetType,
    pub min_order_amount: Option<i64>,
    pub min_quantity: Option<i64>,
    pub product_ids: Vec<String>,
    pub category_ids: Vec<String>,
    pub brand_ids: Vec<String>,
    pub customer_ids: Vec<String>,
    pub tier_ids: Vec<String>,
}

impl NewDiscountRule {
    pub fn new(discount_type: DiscountType, discount_value: i64) -> Self {
        Self {
            discount_type,
            discount_value,
            max_discount_amount: None,
            product_target_type: ProductTargetType::AllProducts,
            customer_target_type: CustomerTargetType::AllCustomers,
            min_order_amount: None,
            min_quantity: None,
            product_ids: Vec::new(),
            category_ids: Vec::new(),
            brand_ids: Vec::new(),
            customer_ids: Vec::new(),
            tier_ids: Vec::new(),
        }
    }

    pub fn with_max_discount_amount(mut self, amount: i64) -> Self {
        self.max_discount_amount = Some(amount);
        self
    }

    pub fn with_min_order_amount(mut self, amount: i64) -> Self {
        self.min_order_amount = Some(amount);
        self
    }

    pub fn with_min_quantity(mut self, quantity: i64) -> Self {
        self.min_quantity = Some(quantity);
        self
    }

    pub fn for_products(mut self, product_ids: Vec<String>) -> Self {
        self.product_target_type = ProductTargetType::SpecificProducts;
        self.product_ids = product_ids;
        self
    }

    pub fn for_categories(mut self, category_ids: Vec<String>) -> Self {
        self.product_target_type = ProductTargetType::SpecificCategories;
        self.category_ids = category_ids;
        self
    }

    pub fn for_brands(mut self, brand_ids: Vec<String>) -> Self {
        self.product_target_type = ProductTargetType::SpecificBrands;
        self.brand_ids = brand_ids;
        self
    }

    pub fn for_customers(mut self, customer_ids: Vec<String>) -> Self {
        self.customer_target_type = CustomerTargetType::SpecificCustomers;
        self.customer_ids = customer_ids;
        self
    }

    pub fn for_tiers(mut self, tier_ids: Vec<String>) -> Self {
        self.customer_target_type = CustomerTargetType::SpecificTiers;
        self.tier_ids = tier_ids;
        self
    }
}

//--------------------------------------   CampaignUsage     ---------------------------------------------------------
/// One committed discount application. Append-mostly: the only mutation ever applied is flipping
/// `is_reversed` and stamping `reversed_at` when the owning order is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignUsage {
    pub id: i64,
    pub campaign_id: i64,
    pub rule_id: i64,
    pub customer_id: String,
    pub order_id: OrderId,
    /// `None` for an order-level application.
    pub order_item_id: Option<String>,
    pub discount_amount: Money,
    pub used_at: DateTime<Utc>,
    pub is_reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
}

//--------------------------------------  NewCampaignUsage   ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewCampaignUsage {
    pub campaign_id: i64,
    pub rule_id: i64,
    pub customer_id: String,
    pub order_id: OrderId,
    pub order_item_id: Option<String>,
    pub discount_amount: Money,
}
