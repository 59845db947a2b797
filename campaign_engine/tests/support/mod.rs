//! Shared helpers for the integration tests: throwaway databases and order-context builders.
#![allow(dead_code)]

use campaign_engine::{
    db_types::{NewCampaign, OrderId},
    evaluation_objects::{OrderContext, OrderLine},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SqliteDatabase,
};
use cde_common::{Currency, Money};
use chrono::{Duration, Utc};

pub async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn usd() -> Currency {
    "USD".parse().unwrap()
}

pub fn money(amount: i64) -> Money {
    Money::new(amount, usd())
}

/// A campaign whose window comfortably covers "now".
pub fn open_campaign(name: &str) -> NewCampaign {
    let now = Utc::now();
    NewCampaign::new(name, usd(), now - Duration::days(1), now + Duration::days(30))
}

pub fn line(item_id: &str, product_id: &str, quantity: i64, unit_price: i64) -> OrderLine {
    OrderLine {
        order_item_id: item_id.to_string(),
        product_id: product_id.to_string(),
        category_ids: vec![],
        brand_id: None,
        quantity,
        unit_price: money(unit_price),
    }
}

/// Builds an order context whose subtotal is the sum of its line subtotals.
pub fn order(order_id: &str, customer_id: &str, lines: Vec<OrderLine>) -> OrderContext {
    let subtotal = lines.iter().map(|l| l.subtotal().amount()).sum();
    let mut ctx = OrderContext::new(OrderId::from(order_id), customer_id, money(subtotal));
    for l in lines {
        ctx = ctx.with_line(l);
    }
    ctx
}
