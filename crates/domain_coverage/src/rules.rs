//! Business rule definitions
//!
//! Rules are stored as JSON documents whose `conditions` and `actions` are
//! objects keyed by name:
//!
//! ```json
//! {
//!     "id": 12,
//!     "name": "Seniors get 90% on imaging",
//!     "rule_type": "coverage_percent",
//!     "priority": 100,
//!     "service_category_id": 4,
//!     "conditions": { "patient_age": { "min": 65 } },
//!     "actions": { "set_coverage_percent": 90 }
//! }
//! ```
//!
//! [`BusinessRule::compile`] resolves every key into a closed
//! [`RuleCondition`] / [`RuleAction`] variant once, at load time. Keys the
//! engine does not know become `Unknown`; known keys with unusable payloads
//! become `Malformed` and make the rule non-matching when evaluated.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

use core_kernel::{PlanId, RuleId, ServiceCategoryId, ValidityWindow};
use crate::model::Gender;

/// Errors that can occur while loading or evaluating rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    /// Failed to parse a rule document
    #[error("Failed to parse rule: {0}")]
    ParseError(String),

    /// Rule document is structurally invalid
    #[error("Invalid rule format: {0}")]
    InvalidFormat(String),

    /// A condition could not be evaluated
    #[error("Rule {rule_id}: condition '{key}' could not be evaluated: {reason}")]
    ConditionEvaluation {
        rule_id: RuleId,
        key: String,
        reason: String,
    },

    /// An action could not be applied
    #[error("Rule {rule_id}: action '{key}' could not be applied: {reason}")]
    ActionEvaluation {
        rule_id: RuleId,
        key: String,
        reason: String,
    },
}

/// What a rule overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    CoveragePercent,
    Deductible,
    PaymentLimit,
    SupplementaryInsurance,
    Validation,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::CoveragePercent => "coverage_percent",
            RuleType::Deductible => "deductible",
            RuleType::PaymentLimit => "payment_limit",
            RuleType::SupplementaryInsurance => "supplementary_insurance",
            RuleType::Validation => "validation",
        }
    }
}

/// Stored form of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: RuleId,
    #[serde(default)]
    pub name: String,
    pub rule_type: RuleType,
    /// Higher values are evaluated first
    pub priority: i32,
    /// Restricts the rule to one plan
    #[serde(default)]
    pub plan_id: Option<PlanId>,
    /// Restricts the rule to one service category
    #[serde(default)]
    pub service_category_id: Option<ServiceCategoryId>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub conditions: Map<String, Value>,
    #[serde(default)]
    pub actions: Map<String, Value>,
}

fn default_active() -> bool {
    true
}

/// Inclusive numeric bounds used by range conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub equals: Option<Decimal>,
}

impl NumericRange {
    /// Range matching exactly one value
    pub fn exactly(value: Decimal) -> Self {
        Self {
            equals: Some(value),
            ..Default::default()
        }
    }

    /// Range with optional inclusive bounds
    pub fn between(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Self {
            min,
            max,
            equals: None,
        }
    }

    /// Returns true if `value` satisfies every bound that is set
    pub fn contains(&self, value: Decimal) -> bool {
        self.equals.map_or(true, |eq| value == eq)
            && self.min.map_or(true, |min| value >= min)
            && self.max.map_or(true, |max| value <= max)
    }

    /// Parses a bare number (equality) or an object with min/max/equals
    fn from_value(value: &Value) -> Result<Self, String> {
        if let Some(obj) = value.as_object() {
            let mut range = NumericRange::default();
            for (key, bound) in obj {
                let parsed = decimal_from_value(bound)?;
                match key.as_str() {
                    "min" => range.min = Some(parsed),
                    "max" => range.max = Some(parsed),
                    "equals" => range.equals = Some(parsed),
                    other => return Err(format!("unsupported range bound '{}'", other)),
                }
            }
            if range.min.is_none() && range.max.is_none() && range.equals.is_none() {
                return Err("range needs at least one of min, max, equals".to_string());
            }
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    return Err(format!("min {} is greater than max {}", min, max));
                }
            }
            return Ok(range);
        }
        decimal_from_value(value).map(NumericRange::exactly)
    }
}

/// A resolved rule condition
#[derive(Debug, Clone, PartialEq)]
pub enum RuleCondition {
    /// Patient age in whole years
    PatientAge(NumericRange),
    /// Service amount of the invoice line
    ServiceAmount(NumericRange),
    PatientGender(Gender),
    ServiceCategory(ServiceCategoryId),
    InsurancePlan(PlanId),
    /// Key not known to this engine
    Unknown { key: String },
    /// Known key whose payload could not be understood
    Malformed { key: String, reason: String },
}

impl RuleCondition {
    /// Resolves a stored condition
    pub fn parse(key: &str, value: &Value) -> Self {
        let parsed = match key {
            "patient_age" => NumericRange::from_value(value).map(RuleCondition::PatientAge),
            "service_amount" => NumericRange::from_value(value).map(RuleCondition::ServiceAmount),
            "patient_gender" => value
                .as_str()
                .ok_or_else(|| "expected a string".to_string())
                .and_then(Gender::from_str)
                .map(RuleCondition::PatientGender),
            "service_category" => integer_from_value(value)
                .map(|id| RuleCondition::ServiceCategory(ServiceCategoryId::new(id))),
            "insurance_plan" => {
                integer_from_value(value).map(|id| RuleCondition::InsurancePlan(PlanId::new(id)))
            }
            other => Ok(RuleCondition::Unknown {
                key: other.to_string(),
            }),
        };

        parsed.unwrap_or_else(|reason| RuleCondition::Malformed {
            key: key.to_string(),
            reason,
        })
    }

    /// Storage key of this condition
    pub fn key(&self) -> &str {
        match self {
            RuleCondition::PatientAge(_) => "patient_age",
            RuleCondition::ServiceAmount(_) => "service_amount",
            RuleCondition::PatientGender(_) => "patient_gender",
            RuleCondition::ServiceCategory(_) => "service_category",
            RuleCondition::InsurancePlan(_) => "insurance_plan",
            RuleCondition::Unknown { key } | RuleCondition::Malformed { key, .. } => key,
        }
    }
}

/// A resolved rule action
#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    SetCoveragePercent(Decimal),
    SetDeductible(Decimal),
    SetMaxPayment(Decimal),
    /// Rejects service amounts above `limit`
    ValidatePaymentLimit {
        limit: Decimal,
        message: Option<String>,
    },
    SetSupplementaryApplicable(bool),
    Unknown { key: String },
    Malformed { key: String, reason: String },
}

impl RuleAction {
    /// Resolves a stored action
    pub fn parse(key: &str, value: &Value) -> Self {
        let parsed = match key {
            "set_coverage_percent" => {
                decimal_from_value(value).map(RuleAction::SetCoveragePercent)
            }
            "set_deductible" => non_negative(value).map(RuleAction::SetDeductible),
            "set_max_payment" => non_negative(value).map(RuleAction::SetMaxPayment),
            "validate_payment_limit" => parse_payment_limit(value),
            "set_supplementary_applicable" => value
                .as_bool()
                .ok_or_else(|| "expected a boolean".to_string())
                .map(RuleAction::SetSupplementaryApplicable),
            other => Ok(RuleAction::Unknown {
                key: other.to_string(),
            }),
        };

        parsed.unwrap_or_else(|reason| RuleAction::Malformed {
            key: key.to_string(),
            reason,
        })
    }

    /// Storage key of this action
    pub fn key(&self) -> &str {
        match self {
            RuleAction::SetCoveragePercent(_) => "set_coverage_percent",
            RuleAction::SetDeductible(_) => "set_deductible",
            RuleAction::SetMaxPayment(_) => "set_max_payment",
            RuleAction::ValidatePaymentLimit { .. } => "validate_payment_limit",
            RuleAction::SetSupplementaryApplicable(_) => "set_supplementary_applicable",
            RuleAction::Unknown { key } | RuleAction::Malformed { key, .. } => key,
        }
    }
}

/// A rule ready for evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRule {
    pub id: RuleId,
    pub name: String,
    pub rule_type: RuleType,
    pub priority: i32,
    pub plan_id: Option<PlanId>,
    pub service_category_id: Option<ServiceCategoryId>,
    pub validity: ValidityWindow,
    pub is_active: bool,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}

impl BusinessRule {
    /// Resolves a stored definition into a rule
    ///
    /// # Errors
    ///
    /// Returns `RulesError::InvalidFormat` when the validity window is inverted
    /// or the rule has no actions.
    pub fn compile(definition: RuleDefinition) -> Result<Self, RulesError> {
        let validity = ValidityWindow::new(definition.start_date, definition.end_date)
            .map_err(|e| RulesError::InvalidFormat(format!("rule {}: {}", definition.id, e)))?;

        if definition.actions.is_empty() {
            return Err(RulesError::InvalidFormat(format!(
                "rule {} has no actions",
                definition.id
            )));
        }

        let conditions = definition
            .conditions
            .iter()
            .map(|(key, value)| RuleCondition::parse(key, value))
            .collect();
        let actions = definition
            .actions
            .iter()
            .map(|(key, value)| RuleAction::parse(key, value))
            .collect();

        Ok(Self {
            id: definition.id,
            name: definition.name,
            rule_type: definition.rule_type,
            priority: definition.priority,
            plan_id: definition.plan_id,
            service_category_id: definition.service_category_id,
            validity,
            is_active: definition.is_active,
            conditions,
            actions,
        })
    }

    /// Parses and compiles a rule from its JSON document
    pub fn from_json(json: &str) -> Result<Self, RulesError> {
        let definition: RuleDefinition =
            serde_json::from_str(json).map_err(|e| RulesError::ParseError(e.to_string()))?;
        Self::compile(definition)
    }

    /// Returns true if the rule is scoped to the given plan and category
    ///
    /// An unset scope field matches everything.
    pub fn in_scope(&self, plan_id: PlanId, category: Option<ServiceCategoryId>) -> bool {
        self.plan_id.map_or(true, |p| p == plan_id)
            && self
                .service_category_id
                .map_or(true, |c| category == Some(c))
    }
}

fn decimal_from_value(value: &Value) -> Result<Decimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(format!("expected a number, got {}", other)),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| format!("'{}' is not a number", text))
}

fn integer_from_value(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("'{}' is not an integer", n)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not an integer", s)),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

fn non_negative(value: &Value) -> Result<Decimal, String> {
    let amount = decimal_from_value(value)?;
    if amount < Decimal::ZERO {
        return Err(format!("{} must not be negative", amount));
    }
    Ok(amount)
}

fn parse_payment_limit(value: &Value) -> Result<RuleAction, String> {
    if let Some(obj) = value.as_object() {
        let limit = obj
            .get("limit")
            .ok_or_else(|| "missing 'limit'".to_string())
            .and_then(non_negative)?;
        let message = obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string);
        return Ok(RuleAction::ValidatePaymentLimit { limit, message });
    }
    non_negative(value).map(|limit| RuleAction::ValidatePaymentLimit {
        limit,
        message: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_compile_resolves_known_keys() {
        let rule = BusinessRule::from_json(
            r#"{
                "id": 1,
                "name": "adults",
                "rule_type": "coverage_percent",
                "priority": 10,
                "conditions": {
                    "patient_age": { "min": 18, "max": 65 },
                    "patient_gender": "F",
                    "service_category": 3
                },
                "actions": { "set_coverage_percent": 85 }
            }"#,
        )
        .unwrap();

        assert_eq!(rule.conditions.len(), 3);
        assert!(rule.conditions.contains(&RuleCondition::PatientAge(NumericRange::between(
            Some(dec!(18)),
            Some(dec!(65))
        ))));
        assert!(rule.conditions.contains(&RuleCondition::PatientGender(Gender::Female)));
        assert_eq!(rule.actions, vec![RuleAction::SetCoveragePercent(dec!(85))]);
        assert!(rule.is_active);
    }

    #[test]
    fn test_unknown_and_malformed_keys() {
        assert_eq!(
            RuleCondition::parse("blood_type", &json!("A+")),
            RuleCondition::Unknown { key: "blood_type".to_string() }
        );
        assert!(matches!(
            RuleCondition::parse("patient_age", &json!("old")),
            RuleCondition::Malformed { .. }
        ));
        assert!(matches!(
            RuleCondition::parse("service_amount", &json!({ "min": 10, "max": 5 })),
            RuleCondition::Malformed { .. }
        ));
        assert!(matches!(
            RuleAction::parse("set_deductible", &json!(-5)),
            RuleAction::Malformed { .. }
        ));
    }

    #[test]
    fn test_payment_limit_forms() {
        assert_eq!(
            RuleAction::parse("validate_payment_limit", &json!(5000)),
            RuleAction::ValidatePaymentLimit { limit: dec!(5000), message: None }
        );
        assert_eq!(
            RuleAction::parse(
                "validate_payment_limit",
                &json!({ "limit": "2500.50", "message": "over ceiling" })
            ),
            RuleAction::ValidatePaymentLimit {
                limit: dec!(2500.50),
                message: Some("over ceiling".to_string())
            }
        );
    }

    #[test]
    fn test_inverted_window_rejected() {
        let result = BusinessRule::from_json(
            r#"{
                "id": 2, "rule_type": "deductible", "priority": 1,
                "start_date": "2024-12-31", "end_date": "2024-01-01",
                "actions": { "set_deductible": 10 }
            }"#,
        );
        assert!(matches!(result, Err(RulesError::InvalidFormat(_))));
    }

    #[test]
    fn test_rule_without_actions_rejected() {
        let result = BusinessRule::from_json(
            r#"{ "id": 3, "rule_type": "deductible", "priority": 1 }"#,
        );
        assert!(matches!(result, Err(RulesError::InvalidFormat(_))));
    }

    #[test]
    fn test_range_contains() {
        let range = NumericRange::between(Some(dec!(18)), Some(dec!(65)));
        assert!(range.contains(dec!(18)));
        assert!(range.contains(dec!(65)));
        assert!(!range.contains(dec!(17)));
        assert!(!range.contains(dec!(66)));
        assert!(NumericRange::exactly(dec!(3)).contains(dec!(3.0)));
    }

    #[test]
    fn test_scope() {
        let mut rule = BusinessRule::from_json(
            r#"{ "id": 4, "rule_type": "deductible", "priority": 1, "actions": { "set_deductible": 0 } }"#,
        )
        .unwrap();
        assert!(rule.in_scope(PlanId::new(1), None));

        rule.plan_id = Some(PlanId::new(2));
        rule.service_category_id = Some(ServiceCategoryId::new(7));
        assert!(!rule.in_scope(PlanId::new(1), Some(ServiceCategoryId::new(7))));
        assert!(!rule.in_scope(PlanId::new(2), None));
        assert!(rule.in_scope(PlanId::new(2), Some(ServiceCategoryId::new(7))));
    }
}
