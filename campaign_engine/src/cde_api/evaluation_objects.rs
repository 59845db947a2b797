//! Read-only order projections supplied by the order subsystem, and the evaluation output.

use cde_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::OrderId;

/// One order line as seen by the engine. Catalog attributes (categories, brand) arrive
/// pre-resolved; the engine never queries the catalog itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_item_id: String,
    pub product_id: String,
    pub category_ids: Vec<String>,
    pub brand_id: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderLine {
    /// `unit_price × quantity`, the base amount for line-level discounts.
    pub fn subtotal(&self) -> Money {
        Money::new(self.unit_price.amount().saturating_mul(self.quantity), self.unit_price.currency())
    }
}

/// The full evaluation input for one order. `now` is supplied by the caller so that the date
/// window check is deterministic and testable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderContext {
    pub order_id: OrderId,
    pub customer_id: String,
    pub customer_tier: Option<String>,
    pub now: DateTime<Utc>,
    pub subtotal: Money,
    pub lines: Vec<OrderLine>,
}

impl OrderContext {
    pub fn new(order_id: OrderId, customer_id: impl Into<String>, subtotal: Money) -> Self {
        Self {
            order_id,
            customer_id: customer_id.into(),
            customer_tier: None,
            now: Utc::now(),
            subtotal,
            lines: Vec::new(),
        }
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.customer_tier = Some(tier.into());
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_line(mut self, line: OrderLine) -> Self {
        self.lines.push(line);
        self
    }
}

/// One committed discount, returned to the caller for incorporation into order pricing.
/// The engine records the matching ledger entry; it never mutates order pricing itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub campaign_id: i64,
    pub rule_id: i64,
    /// `None` for an order-level application.
    pub order_item_id: Option<String>,
    pub amount: Money,
    /// Id of the ledger entry backing this discount.
    pub usage_id: i64,
}
