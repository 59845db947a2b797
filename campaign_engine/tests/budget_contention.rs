//! Budget accounting under contention: the caps must hold even when commits race.

mod support;

use campaign_engine::{
    db_types::{DiscountType, NewDiscountRule},
    CampaignApi, EvaluationApi,
};
use futures_util::future::join_all;
use support::{line, money, new_db, open_campaign, order};

#[tokio::test]
async fn usage_limit_of_one_admits_exactly_one_concurrent_commit() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let campaign = admin.create_campaign(open_campaign("One shot").with_total_usage_limit(1)).await.unwrap();
    admin.add_rule(campaign.id, NewDiscountRule::new(DiscountType::Percentage, 10)).await.unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let tasks = (0..2).map(|i| {
        let db = db.clone();
        tokio::spawn(async move {
            let api = EvaluationApi::new(db);
            let ctx = order(&format!("order-{i}"), &format!("cust-{i}"), vec![line("item-1", "p1", 1, 10_000)]);
            api.evaluate_order(&ctx).await
        })
    });
    let results = join_all(tasks).await;

    let mut applied_total = 0;
    for result in results {
        let applied = result.unwrap().expect("evaluation must not error");
        applied_total += applied.len();
    }
    // Exactly one order won the budget; the other was silently rejected.
    assert_eq!(applied_total, 1);

    let campaign = admin.fetch_campaign(campaign.id).await.unwrap().unwrap();
    assert_eq!(campaign.total_usage_count, 1);
    assert_eq!(campaign.total_discount_used, money(1_000));
}

#[tokio::test]
async fn usage_count_cap_blocks_even_with_budget_headroom() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    // Tiny usage limit, enormous budget.
    let campaign = admin
        .create_campaign(open_campaign("Counted").with_total_usage_limit(1).with_total_budget_limit(1_000_000))
        .await
        .unwrap();
    admin.add_rule(campaign.id, NewDiscountRule::new(DiscountType::FixedAmount, 100)).await.unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let api = EvaluationApi::new(db);
    let first = api.evaluate_order(&order("o1", "c1", vec![line("i1", "p1", 1, 1_000)])).await.unwrap();
    assert_eq!(first.len(), 1);
    let second = api.evaluate_order(&order("o2", "c2", vec![line("i1", "p1", 1, 1_000)])).await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn budget_cap_blocks_even_with_usage_headroom() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    // Budget fits exactly one 5.00 discount; usage count is unconstrained.
    let campaign = admin.create_campaign(open_campaign("Budgeted").with_total_budget_limit(500)).await.unwrap();
    admin.add_rule(campaign.id, NewDiscountRule::new(DiscountType::FixedAmount, 500)).await.unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let api = EvaluationApi::new(db);
    let first = api.evaluate_order(&order("o1", "c1", vec![line("i1", "p1", 1, 1_000)])).await.unwrap();
    assert_eq!(first[0].amount, money(500));
    let second = api.evaluate_order(&order("o2", "c2", vec![line("i1", "p1", 1, 1_000)])).await.unwrap();
    assert!(second.is_empty());

    let campaign = admin.fetch_campaign(campaign.id).await.unwrap().unwrap();
    assert_eq!(campaign.total_discount_used, money(500));
    assert_eq!(campaign.total_usage_count, 1);
}

#[tokio::test]
async fn per_customer_usage_cap_is_per_customer() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    let campaign =
        admin.create_campaign(open_campaign("Once each").with_per_customer_usage_limit(1)).await.unwrap();
    admin.add_rule(campaign.id, NewDiscountRule::new(DiscountType::FixedAmount, 100)).await.unwrap();
    admin.schedule(campaign.id).await.unwrap();
    admin.activate(campaign.id).await.unwrap();

    let api = EvaluationApi::new(db);
    let first = api.evaluate_order(&order("o1", "c1", vec![line("i1", "p1", 1, 1_000)])).await.unwrap();
    assert_eq!(first.len(), 1);
    // Same customer again: rejected.
    let second = api.evaluate_order(&order("o2", "c1", vec![line("i1", "p1", 1, 1_000)])).await.unwrap();
    assert!(second.is_empty());
    // A fresh customer still qualifies.
    let third = api.evaluate_order(&order("o3", "c2", vec![line("i1", "p1", 1, 1_000)])).await.unwrap();
    assert_eq!(third.len(), 1);
}

#[tokio::test]
async fn budget_rejection_falls_through_to_the_next_campaign() {
    let db = new_db().await;
    let admin = CampaignApi::new(db.clone());
    // The preferred campaign is out of budget; the cheaper one should then win the line.
    let preferred =
        admin.create_campaign(open_campaign("Preferred").with_priority(10).with_total_usage_limit(1)).await.unwrap();
    let fallback = admin.create_campaign(open_campaign("Fallback").with_priority(1)).await.unwrap();
    for c in [&preferred, &fallback] {
        admin.add_rule(c.id, NewDiscountRule::new(DiscountType::Percentage, 10)).await.unwrap();
        admin.schedule(c.id).await.unwrap();
        admin.activate(c.id).await.unwrap();
    }

    let api = EvaluationApi::new(db);
    let first = api.evaluate_order(&order("o1", "c1", vec![line("i1", "p1", 1, 1_000)])).await.unwrap();
    assert_eq!(first[0].campaign_id, preferred.id);
    let second = api.evaluate_order(&order("o2", "c2", vec![line("i1", "p1", 1, 1_000)])).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].campaign_id, fallback.id);
}
