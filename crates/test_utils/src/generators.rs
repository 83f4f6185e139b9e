//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::{Money, Percentage, PlanId};
use domain_coverage::{InsurancePlan, InsuranceType};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::fixtures::PlanFixtures;

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for generating positive Money values at two decimal places
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(Money::from_minor)
}

/// Strategy for generating percentages with one decimal place
pub fn percentage_strategy() -> impl Strategy<Value = Percentage> {
    (0u32..=1000u32).prop_map(|n| Percentage::clamped(Decimal::new(n as i64, 1)))
}

/// Strategy for generating an amount together with a primary coverage
/// between zero and that amount
pub fn amount_with_primary_strategy() -> impl Strategy<Value = (Money, Money)> {
    positive_amount_minor_strategy().prop_flat_map(|amount| {
        (Just(Money::from_minor(amount)), (0..=amount).prop_map(Money::from_minor))
    })
}

/// Strategy for generating active primary plans
pub fn primary_plan_strategy() -> impl Strategy<Value = InsurancePlan> {
    (1i64..1000, percentage_strategy(), 0i64..10_000_000).prop_map(|(id, percent, deductible)| {
        PlanFixtures::plan(
            PlanId::new(id),
            InsuranceType::Primary,
            percent.value(),
            Decimal::new(deductible, 2),
        )
    })
}
