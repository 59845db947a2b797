//! End-to-end evaluation: definition, activation, matching, calculation, and the ledger record.

mod support;

use campaign_engine::{
    db_types::{DiscountType, NewDiscountRule, OrderId},
    CampaignApi, EvaluationApi, EvaluationError,
};
use support::{line, money, new_db, open_campaign, order};

#[tokio::test]
async fn percentage_discount_is_capped() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let campaign = admin.create_campaign(open_campaign("Spring promo")).await.unwrap();
    // 10% with a 5.00 cap
    let rule = admin
        .add_rule(campaign.id, NewDiscountRule::new(DiscountType::Percentage, 10).with_max_discount_amount(500))
        .await
        .unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let api = EvaluationApi::new(db);
    let ctx = order("order-1", "cust-1", vec![line("item-1", "p1", 1, 10_000)]);
    let applied = api.evaluate_order(&ctx).await.unwrap();

    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].amount, money(500));
    assert_eq!(applied[0].campaign_id, campaign.id);
    assert_eq!(applied[0].rule_id, rule.id);

    // The ledger backs the result and the running totals moved in lockstep.
    let entries = admin.usage_for_order(&OrderId::from("order-1")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].discount_amount, money(500));
    assert!(!entries[0].is_reversed);
    let campaign = admin.fetch_campaign(campaign.id).await.unwrap().unwrap();
    assert_eq!(campaign.total_discount_used, money(500));
    assert_eq!(campaign.total_usage_count, 1);
}

#[tokio::test]
async fn specific_products_only_match_their_lines() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let campaign = admin.create_campaign(open_campaign("Targeted")).await.unwrap();
    admin
        .add_rule(
            campaign.id,
            NewDiscountRule::new(DiscountType::Percentage, 20).for_products(vec!["p1".to_string()]),
        )
        .await
        .unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let api = EvaluationApi::new(db);
    let ctx = order("order-2", "cust-1", vec![line("item-1", "p1", 1, 1_000), line("item-2", "p2", 1, 1_000)]);
    let applied = api.evaluate_order(&ctx).await.unwrap();

    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].order_item_id.as_deref(), Some("item-1"));
    assert_eq!(applied[0].amount, money(200));
}

#[tokio::test]
async fn higher_priority_campaign_wins() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let low = admin.create_campaign(open_campaign("Low").with_priority(1)).await.unwrap();
    let high = admin.create_campaign(open_campaign("High").with_priority(10)).await.unwrap();
    for c in [&low, &high] {
        admin.add_rule(c.id, NewDiscountRule::new(DiscountType::Percentage, 10)).await.unwrap();
        admin.schedule(c.id).await.unwrap();
        admin.activate(c.id).await.unwrap();
    }

    let api = EvaluationApi::new(db);
    let applied =
        api.evaluate_order(&order("order-3", "cust-1", vec![line("item-1", "p1", 1, 1_000)])).await.unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].campaign_id, high.id);
}

#[tokio::test]
async fn first_matching_rule_in_definition_order_wins() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let campaign = admin.create_campaign(open_campaign("Two rules")).await.unwrap();
    let first = admin.add_rule(campaign.id, NewDiscountRule::new(DiscountType::Percentage, 5)).await.unwrap();
    admin.add_rule(campaign.id, NewDiscountRule::new(DiscountType::Percentage, 50)).await.unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let api = EvaluationApi::new(db);
    let applied =
        api.evaluate_order(&order("order-4", "cust-1", vec![line("item-1", "p1", 1, 1_000)])).await.unwrap();
    // Rules are alternatives: the first one matched, so the 50% rule never ran.
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].rule_id, first.id);
    assert_eq!(applied[0].amount, money(50));
}

#[tokio::test]
async fn thresholds_gate_the_match() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let campaign = admin.create_campaign(open_campaign("Big spenders")).await.unwrap();
    admin
        .add_rule(
            campaign.id,
            NewDiscountRule::new(DiscountType::Percentage, 10).with_min_order_amount(50_000).with_min_quantity(2),
        )
        .await
        .unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let api = EvaluationApi::new(db);
    // Subtotal below the minimum: no discount, and that is not an error.
    let applied =
        api.evaluate_order(&order("order-5", "cust-1", vec![line("item-1", "p1", 2, 1_000)])).await.unwrap();
    assert!(applied.is_empty());
    // Subtotal and quantity both qualify.
    let applied =
        api.evaluate_order(&order("order-6", "cust-1", vec![line("item-1", "p1", 2, 25_000)])).await.unwrap();
    assert_eq!(applied.len(), 1);
}

#[tokio::test]
async fn fixed_per_unit_scales_and_clamps() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let campaign = admin.create_campaign(open_campaign("Per unit")).await.unwrap();
    admin
        .add_rule(campaign.id, NewDiscountRule::new(DiscountType::FixedAmountPerUnit, 150))
        .await
        .unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let api = EvaluationApi::new(db);
    let applied =
        api.evaluate_order(&order("order-7", "cust-1", vec![line("item-1", "p1", 3, 1_000)])).await.unwrap();
    assert_eq!(applied[0].amount, money(450));
}

#[tokio::test]
async fn draft_campaigns_are_invisible_to_evaluation() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let campaign = admin.create_campaign(open_campaign("Still draft")).await.unwrap();
    admin.add_rule(campaign.id, NewDiscountRule::new(DiscountType::Percentage, 10)).await.unwrap();

    let api = EvaluationApi::new(db);
    let applied =
        api.evaluate_order(&order("order-8", "cust-1", vec![line("item-1", "p1", 1, 1_000)])).await.unwrap();
    assert!(applied.is_empty());
}

#[tokio::test]
async fn mixed_currency_context_is_a_validation_error() {
    let db = new_db().await;
    let api = EvaluationApi::new(db);
    let mut ctx = order("order-9", "cust-1", vec![line("item-1", "p1", 1, 1_000)]);
    ctx.lines[0].unit_price = cde_common::Money::new(1_000, "EUR".parse().unwrap());
    let err = api.evaluate_order(&ctx).await.unwrap_err();
    assert!(matches!(err, EvaluationError::Validation(_)));
}

#[tokio::test]
async fn cross_currency_campaigns_are_skipped_not_fatal() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let mut new = open_campaign("Eurozone");
    new.currency = "EUR".parse().unwrap();
    let campaign = admin.create_campaign(new).await.unwrap();
    admin.add_rule(campaign.id, NewDiscountRule::new(DiscountType::Percentage, 10)).await.unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let api = EvaluationApi::new(db);
    let applied =
        api.evaluate_order(&order("order-10", "cust-1", vec![line("item-1", "p1", 1, 1_000)])).await.unwrap();
    assert!(applied.is_empty());
}
