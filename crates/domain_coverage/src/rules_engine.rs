//! Business rule evaluation
//!
//! Rules of one [`RuleType`] are evaluated in priority-descending order
//! (ties go to the lower rule id). The first rule that is active, valid on
//! the calculation date, satisfies all of its conditions and produces a
//! non-empty [`RuleEffect`] wins; later rules are not consulted.
//!
//! A rule that cannot be evaluated (malformed payload, condition that needs
//! data the context does not carry) is logged, recorded in
//! [`RuleEvaluation::skipped`] and treated as non-matching. Evaluation
//! itself never fails.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = BusinessRuleEngine::new(rule_repository, UnknownConditionPolicy::Permissive);
//! let (percent, rule) = engine.effective_coverage_percent(&context).await?;
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use core_kernel::{temporal::years_between, Money, Percentage, RuleId};

use crate::config::UnknownConditionPolicy;
use crate::context::InsuranceCalculationContext;
use crate::error::CoverageError;
use crate::ports::RuleRepositoryPort;
use crate::rules::{BusinessRule, RuleAction, RuleCondition, RuleType, RulesError};

/// Outcome of a `validate_payment_limit` action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLimitCheck {
    pub limit: Money,
    pub within_limit: bool,
    pub message: Option<String>,
}

/// Overrides produced by the actions of a matching rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEffect {
    pub coverage_percent: Option<Percentage>,
    pub deductible: Option<Money>,
    pub max_payment: Option<Money>,
    pub supplementary_applicable: Option<bool>,
    pub payment_limit: Option<PaymentLimitCheck>,
}

impl RuleEffect {
    /// Returns true if no action produced a value
    pub fn is_empty(&self) -> bool {
        self.coverage_percent.is_none()
            && self.deductible.is_none()
            && self.max_payment.is_none()
            && self.supplementary_applicable.is_none()
            && self.payment_limit.is_none()
    }
}

/// A rule that was passed over because it could not be evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRule {
    pub rule_id: RuleId,
    pub reason: String,
}

/// Result of evaluating the rules of one type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_type: RuleType,
    /// The winning rule, if any
    pub matched_rule: Option<RuleId>,
    /// Empty when no rule matched
    pub effect: RuleEffect,
    pub skipped: Vec<SkippedRule>,
}

impl RuleEvaluation {
    fn no_match(rule_type: RuleType, skipped: Vec<SkippedRule>) -> Self {
        Self {
            rule_type,
            matched_rule: None,
            effect: RuleEffect::default(),
            skipped,
        }
    }

    /// Returns true if a rule matched
    pub fn is_match(&self) -> bool {
        self.matched_rule.is_some()
    }
}

/// Evaluates rules against a context
///
/// Rules of other types or outside the context's plan/category scope are
/// ignored, so callers may pass an unfiltered list.
pub fn evaluate_rules(
    rules: &[BusinessRule],
    rule_type: RuleType,
    context: &InsuranceCalculationContext,
    policy: UnknownConditionPolicy,
) -> RuleEvaluation {
    let mut ordered: Vec<&BusinessRule> = rules
        .iter()
        .filter(|rule| rule.rule_type == rule_type)
        .filter(|rule| rule.in_scope(context.plan.id, context.service_category_id))
        .collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

    let mut skipped = Vec::new();
    let winner = ordered.into_iter().find_map(|rule| {
        match apply_rule(rule, context, policy) {
            Ok(Some(effect)) => Some((rule.id, effect)),
            Ok(None) => None,
            Err(err) => {
                warn!(rule_id = %rule.id, error = %err, "Rule skipped");
                skipped.push(SkippedRule {
                    rule_id: rule.id,
                    reason: err.to_string(),
                });
                None
            }
        }
    });

    match winner {
        Some((rule_id, effect)) => {
            debug!(rule_id = %rule_id, rule_type = rule_type.as_str(), "Rule matched");
            RuleEvaluation {
                rule_type,
                matched_rule: Some(rule_id),
                effect,
                skipped,
            }
        }
        None => RuleEvaluation::no_match(rule_type, skipped),
    }
}

/// Evaluates one rule; `Ok(None)` means the rule does not apply
fn apply_rule(
    rule: &BusinessRule,
    context: &InsuranceCalculationContext,
    policy: UnknownConditionPolicy,
) -> Result<Option<RuleEffect>, RulesError> {
    if !rule.is_active || !rule.validity.contains(context.calculation_date) {
        return Ok(None);
    }

    for condition in &rule.conditions {
        let holds = condition_holds(condition, context, policy).map_err(|reason| {
            RulesError::ConditionEvaluation {
                rule_id: rule.id,
                key: condition.key().to_string(),
                reason,
            }
        })?;
        if !holds {
            return Ok(None);
        }
    }

    let mut effect = RuleEffect::default();
    for action in &rule.actions {
        apply_action(action, context, &mut effect).map_err(|reason| {
            RulesError::ActionEvaluation {
                rule_id: rule.id,
                key: action.key().to_string(),
                reason,
            }
        })?;
    }

    Ok((!effect.is_empty()).then_some(effect))
}

fn condition_holds(
    condition: &RuleCondition,
    context: &InsuranceCalculationContext,
    policy: UnknownConditionPolicy,
) -> Result<bool, String> {
    match condition {
        RuleCondition::PatientAge(range) => {
            let birth_date = context
                .patient
                .as_ref()
                .and_then(|p| p.birth_date)
                .ok_or_else(|| "patient birth date is unknown".to_string())?;
            let age = years_between(birth_date, context.reference_date);
            Ok(range.contains(Decimal::from(age)))
        }
        RuleCondition::ServiceAmount(range) => Ok(range.contains(context.service_amount.amount())),
        RuleCondition::PatientGender(gender) => {
            let actual = context
                .patient
                .as_ref()
                .and_then(|p| p.gender)
                .ok_or_else(|| "patient gender is unknown".to_string())?;
            Ok(actual == *gender)
        }
        RuleCondition::ServiceCategory(category) => {
            Ok(context.service_category_id == Some(*category))
        }
        RuleCondition::InsurancePlan(plan_id) => Ok(context.plan.id == *plan_id),
        RuleCondition::Unknown { key } => match policy {
            UnknownConditionPolicy::Permissive => {
                warn!(condition = %key, "Unknown rule condition treated as satisfied");
                Ok(true)
            }
            UnknownConditionPolicy::Reject => {
                debug!(condition = %key, "Unknown rule condition treated as unsatisfied");
                Ok(false)
            }
        },
        RuleCondition::Malformed { reason, .. } => Err(reason.clone()),
    }
}

fn apply_action(
    action: &RuleAction,
    context: &InsuranceCalculationContext,
    effect: &mut RuleEffect,
) -> Result<(), String> {
    match action {
        RuleAction::SetCoveragePercent(value) => {
            effect.coverage_percent = Some(Percentage::clamped(*value));
        }
        RuleAction::SetDeductible(value) => {
            effect.deductible = Some(Money::rounded(*value));
        }
        RuleAction::SetMaxPayment(value) => {
            effect.max_payment = Some(Money::rounded(*value));
        }
        RuleAction::ValidatePaymentLimit { limit, message } => {
            effect.payment_limit = Some(PaymentLimitCheck {
                limit: Money::new(*limit),
                within_limit: context.service_amount.amount() <= *limit,
                message: message.clone(),
            });
        }
        RuleAction::SetSupplementaryApplicable(applicable) => {
            effect.supplementary_applicable = Some(*applicable);
        }
        RuleAction::Unknown { key } => {
            warn!(action = %key, "Unknown rule action ignored");
        }
        RuleAction::Malformed { reason, .. } => return Err(reason.clone()),
    }
    Ok(())
}

/// Coverage percent when no rule overrides it
///
/// The plan-service override wins over the plan percent.
pub fn default_coverage_percent(context: &InsuranceCalculationContext) -> Percentage {
    context
        .plan_service
        .as_ref()
        .and_then(|ps| ps.coverage_override)
        .unwrap_or(context.plan.coverage_percent)
}

/// Fetches rules through the repository port and evaluates them
pub struct BusinessRuleEngine {
    repository: Arc<dyn RuleRepositoryPort>,
    policy: UnknownConditionPolicy,
}

impl BusinessRuleEngine {
    /// Creates an engine over a rule repository
    pub fn new(repository: Arc<dyn RuleRepositoryPort>, policy: UnknownConditionPolicy) -> Self {
        Self { repository, policy }
    }

    /// Returns the policy applied to unknown conditions
    pub fn unknown_condition_policy(&self) -> UnknownConditionPolicy {
        self.policy
    }

    /// Evaluates the rules of `rule_type` that apply to the context
    ///
    /// # Errors
    ///
    /// Fails only when the rule repository fails.
    pub async fn evaluate(
        &self,
        rule_type: RuleType,
        context: &InsuranceCalculationContext,
    ) -> Result<RuleEvaluation, CoverageError> {
        let rules = self
            .repository
            .find_rules(rule_type, context.plan.id, context.service_category_id)
            .await?;
        debug!(
            rule_type = rule_type.as_str(),
            candidates = rules.len(),
            plan_id = %context.plan.id,
            "Evaluating rules"
        );
        Ok(evaluate_rules(&rules, rule_type, context, self.policy))
    }

    /// Coverage percent: rule override, else plan-service override, else plan
    pub async fn effective_coverage_percent(
        &self,
        context: &InsuranceCalculationContext,
    ) -> Result<(Percentage, Option<RuleId>), CoverageError> {
        let evaluation = self.evaluate(RuleType::CoveragePercent, context).await?;
        Ok(match evaluation.effect.coverage_percent {
            Some(percent) => (percent, evaluation.matched_rule),
            None => (default_coverage_percent(context), None),
        })
    }

    /// Deductible: rule override, else plan deductible
    pub async fn effective_deductible(
        &self,
        context: &InsuranceCalculationContext,
    ) -> Result<(Money, Option<RuleId>), CoverageError> {
        let evaluation = self.evaluate(RuleType::Deductible, context).await?;
        Ok(match evaluation.effect.deductible {
            Some(deductible) => (deductible, evaluation.matched_rule),
            None => (context.plan.deductible.max_zero(), None),
        })
    }

    /// Evaluates payment-limit rules
    ///
    /// # Errors
    ///
    /// Returns `CoverageError::PaymentLimitExceeded` when the winning rule's
    /// limit is below the service amount.
    pub async fn check_payment_limit(
        &self,
        context: &InsuranceCalculationContext,
    ) -> Result<RuleEvaluation, CoverageError> {
        let evaluation = self.evaluate(RuleType::PaymentLimit, context).await?;
        if let (Some(rule_id), Some(check)) =
            (evaluation.matched_rule, evaluation.effect.payment_limit.as_ref())
        {
            if !check.within_limit {
                if let Some(message) = &check.message {
                    warn!(rule_id = %rule_id, "{}", message);
                }
                return Err(CoverageError::PaymentLimitExceeded {
                    rule_id,
                    amount: context.service_amount.amount(),
                    limit: check.limit.amount(),
                });
            }
        }
        Ok(evaluation)
    }

    /// Returns false when a supplementary-insurance rule disables it
    pub async fn supplementary_applicable(
        &self,
        context: &InsuranceCalculationContext,
    ) -> Result<bool, CoverageError> {
        let evaluation = self.evaluate(RuleType::SupplementaryInsurance, context).await?;
        Ok(evaluation.effect.supplementary_applicable.unwrap_or(true))
    }
}
