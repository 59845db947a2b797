//! Rule eligibility matching.
//!
//! The targeting index ([`RuleTargets`]) is a pure membership lookup over the rule's association
//! sets; the matcher combines it with the threshold gates. Campaign-level gating (status, date
//! window) happens before rules are considered, in the store's candidate query and
//! [`crate::db_types::Campaign::is_in_window`].

use std::collections::HashSet;

use cde_common::Money;

use crate::{
    cde_api::evaluation_objects::OrderLine,
    db_types::{CustomerTargetType, DiscountRule, ProductTargetType},
};

/// The resolved target sets for one rule. Only the sets named by the rule's target types are
/// consulted; the others stay empty.
#[derive(Debug, Clone, Default)]
pub struct RuleTargets {
    pub products: HashSet<String>,
    pub categories: HashSet<String>,
    pub brands: HashSet<String>,
    pub customers: HashSet<String>,
    pub tiers: HashSet<String>,
}

/// Customer-target gate. `AllCustomers` always passes; the `Specific*` variants require set
/// membership of the customer id or its tier.
pub fn customer_matches(
    rule: &DiscountRule,
    targets: &RuleTargets,
    customer_id: &str,
    customer_tier: Option<&str>,
) -> bool {
    match rule.customer_target_type {
        CustomerTargetType::AllCustomers => true,
        CustomerTargetType::SpecificCustomers => targets.customers.contains(customer_id),
        CustomerTargetType::SpecificTiers => {
            customer_tier.map(|tier| targets.tiers.contains(tier)).unwrap_or(false)
        },
    }
}

/// Product-target gate. Any of the line's category ids matching counts as a category pass.
pub fn product_matches(rule: &DiscountRule, targets: &RuleTargets, line: &OrderLine) -> bool {
    match rule.product_target_type {
        ProductTargetType::AllProducts => true,
        ProductTargetType::SpecificProducts => targets.products.contains(&line.product_id),
        ProductTargetType::SpecificCategories => {
            line.category_ids.iter().any(|cat| targets.categories.contains(cat))
        },
        ProductTargetType::SpecificBrands => {
            line.brand_id.as_deref().map(|brand| targets.brands.contains(brand)).unwrap_or(false)
        },
    }
}

/// Threshold gates: minimum order amount against the order subtotal, minimum quantity against the
/// line. Absent thresholds always pass. A mismatched-currency `min_order_amount` never passes;
/// the pipeline screens out cross-currency campaigns before rules are evaluated.
pub fn thresholds_match(rule: &DiscountRule, line: &OrderLine, order_subtotal: Money) -> bool {
    if let Some(min_order) = rule.min_order_amount {
        if min_order.currency() != order_subtotal.currency() || order_subtotal.amount() < min_order.amount() {
            return false;
        }
    }
    if let Some(min_qty) = rule.min_quantity {
        if line.quantity < min_qty {
            return false;
        }
    }
    true
}

/// A rule matches iff the customer target, product target, and both thresholds all pass.
pub fn rule_matches(
    rule: &DiscountRule,
    targets: &RuleTargets,
    line: &OrderLine,
    order_subtotal: Money,
    customer_id: &str,
    customer_tier: Option<&str>,
) -> bool {
    customer_matches(rule, targets, customer_id, customer_tier)
        && product_matches(rule, targets, line)
        && thresholds_match(rule, line, order_subtotal)
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::db_types::{DiscountType, NewDiscountRule};

    fn usd(amount: i64) -> Money {
        Money::new(amount, "USD".parse().unwrap())
    }

    fn rule_from(new: NewDiscountRule) -> (DiscountRule, RuleTargets) {
        let rule = DiscountRule {
            id: 1,
            campaign_id: 1,
            discount_type: new.discount_type,
            discount_value: new.discount_value,
            max_discount_amount: new.max_discount_amount.map(|v| usd(v)),
            product_target_type: new.product_target_type,
            customer_target_type: new.customer_target_type,
            min_order_amount: new.min_order_amount.map(|v| usd(v)),
            min_quantity: new.min_quantity,
            created_at: Utc::now(),
        };
        let targets = RuleTargets {
            products: new.product_ids.into_iter().collect(),
            categories: new.category_ids.into_iter().collect(),
            brands: new.brand_ids.into_iter().collect(),
            customers: new.customer_ids.into_iter().collect(),
            tiers: new.tier_ids.into_iter().collect(),
        };
        (rule, targets)
    }

    fn line(product: &str, categories: &[&str], brand: Option<&str>, quantity: i64, unit_price: i64) -> OrderLine {
        OrderLine {
            order_item_id: "item-1".to_string(),
            product_id: product.to_string(),
            category_ids: categories.iter().map(|c| c.to_string()).collect(),
            brand_id: brand.map(|b| b.to_string()),
            quantity,
            unit_price: usd(unit_price),
        }
    }

    #[test]
    fn all_products_all_customers_always_pass() {
        let (rule, targets) = rule_from(NewDiscountRule::new(DiscountType::Percentage, 10));
        let line = line("p1", &[], None, 1, 1000);
        assert!(rule_matches(&rule, &targets, &line, usd(1000), "c1", None));
    }

    #[test]
    fn specific_products_require_membership() {
        let new = NewDiscountRule::new(DiscountType::Percentage, 10).for_products(vec!["p1".to_string()]);
        let (rule, targets) = rule_from(new);
        assert!(product_matches(&rule, &targets, &line("p1", &[], None, 1, 1000)));
        assert!(!product_matches(&rule, &targets, &line("p2", &[], None, 1, 1000)));
    }

    #[test]
    fn any_category_overlap_passes() {
        let new = NewDiscountRule::new(DiscountType::Percentage, 10)
            .for_categories(vec!["tools".to_string(), "fasteners".to_string()]);
        let (rule, targets) = rule_from(new);
        assert!(product_matches(&rule, &targets, &line("p1", &["widgets", "tools"], None, 1, 1000)));
        assert!(!product_matches(&rule, &targets, &line("p1", &["widgets"], None, 1, 1000)));
        assert!(!product_matches(&rule, &targets, &line("p1", &[], None, 1, 1000)));
    }

    #[test]
    fn brand_targeting_requires_a_brand() {
        let new = NewDiscountRule::new(DiscountType::Percentage, 10).for_brands(vec!["acme".to_string()]);
        let (rule, targets) = rule_from(new);
        assert!(product_matches(&rule, &targets, &line("p1", &[], Some("acme"), 1, 1000)));
        assert!(!product_matches(&rule, &targets, &line("p1", &[], Some("other"), 1, 1000)));
        assert!(!product_matches(&rule, &targets, &line("p1", &[], None, 1, 1000)));
    }

    #[test]
    fn tier_targeting() {
        let new = NewDiscountRule::new(DiscountType::Percentage, 10).for_tiers(vec!["gold".to_string()]);
        let (rule, targets) = rule_from(new);
        assert!(customer_matches(&rule, &targets, "c1", Some("gold")));
        assert!(!customer_matches(&rule, &targets, "c1", Some("silver")));
        assert!(!customer_matches(&rule, &targets, "c1", None));
    }

    #[test]
    fn specific_customers() {
        let new = NewDiscountRule::new(DiscountType::Percentage, 10).for_customers(vec!["c1".to_string()]);
        let (rule, targets) = rule_from(new);
        assert!(customer_matches(&rule, &targets, "c1", None));
        assert!(!customer_matches(&rule, &targets, "c2", None));
    }

    #[test]
    fn threshold_gates_are_inclusive() {
        let new = NewDiscountRule::new(DiscountType::Percentage, 10).with_min_order_amount(5000).with_min_quantity(3);
        let (rule, _) = rule_from(new);
        let l = line("p1", &[], None, 3, 1000);
        assert!(thresholds_match(&rule, &l, usd(5000)));
        assert!(!thresholds_match(&rule, &l, usd(4999)));
        let small = line("p1", &[], None, 2, 1000);
        assert!(!thresholds_match(&rule, &small, usd(5000)));
    }

    #[test]
    fn empty_specific_set_never_matches() {
        let mut new = NewDiscountRule::new(DiscountType::Percentage, 10);
        new.product_target_type = ProductTargetType::SpecificProducts;
        let (rule, targets) = rule_from(new);
        assert!(!product_matches(&rule, &targets, &line("p1", &[], None, 1, 1000)));
    }
}
