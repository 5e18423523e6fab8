//! Declarative validation rules
//!
//! Each entity type owns an ordered list of [`ValidationRule`]s. A rule pairs
//! a set of fields with one [`Constraint`]; the [`Validator`] interprets the
//! list against a record's current in-memory values and reports violations
//! into an [`ErrorSet`]. Rule lists for every type are collected in a
//! [`Schema`] built once at construction time.

use crate::error_set::ErrorSet;
use crate::types::{is_blank, value_decimal, value_string, EntityKind, Record};
use crate::{Error, Result};
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// When a rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Every validation
    Always,
    /// Only while the record has not been persisted
    OnCreate,
}

/// Constraint kinds
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Value must be present and not blank
    Presence,
    /// Character count of the string form
    Length {
        /// Minimum character count
        min: Option<usize>,
        /// Maximum character count
        max: Option<usize>,
    },
    /// String form must match
    Format(Regex),
    /// Numeric value with optional inclusive bounds
    Numericality {
        /// Reject fractional values
        only_integer: bool,
        /// Inclusive lower bound
        min: Option<Decimal>,
        /// Inclusive upper bound
        max: Option<Decimal>,
    },
    /// String form must be one of the values
    Inclusion(Vec<String>),
    /// String form must not be one of the values
    Exclusion(Vec<String>),
}

impl Constraint {
    /// Length of at most `max` characters
    pub fn max_length(max: usize) -> Self {
        Constraint::Length {
            min: None,
            max: Some(max),
        }
    }

    /// Length between `min` and `max` characters
    pub fn length_between(min: usize, max: usize) -> Self {
        Constraint::Length {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Compile a format constraint
    pub fn format(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Constraint::Format)
            .map_err(|e| Error::Config(format!("Invalid format pattern {}: {}", pattern, e)))
    }

    /// Whole number
    pub fn integer() -> Self {
        Constraint::Numericality {
            only_integer: true,
            min: None,
            max: None,
        }
    }

    /// Integer within inclusive bounds
    pub fn integer_between(min: i64, max: i64) -> Self {
        Constraint::Numericality {
            only_integer: true,
            min: Some(Decimal::from(min)),
            max: Some(Decimal::from(max)),
        }
    }

    /// Any number at or above `min`
    pub fn number_at_least(min: Decimal) -> Self {
        Constraint::Numericality {
            only_integer: false,
            min: Some(min),
            max: None,
        }
    }

    /// Value from a fixed list
    pub fn inclusion(values: &[&str]) -> Self {
        Constraint::Inclusion(values.iter().map(|v| v.to_string()).collect())
    }

    /// Value outside a fixed list
    pub fn exclusion(values: &[&str]) -> Self {
        Constraint::Exclusion(values.iter().map(|v| v.to_string()).collect())
    }

    /// Violation message for one value, `None` when satisfied
    fn violation(&self, value: Option<&serde_json::Value>) -> Option<String> {
        if let Constraint::Presence = self {
            return is_blank(value).then(|| "can't be blank".to_string());
        }

        // Every other constraint leaves blank values to presence rules
        if is_blank(value) {
            return None;
        }
        let value = value?;

        match self {
            Constraint::Presence => None,
            Constraint::Length { min, max } => {
                let length = value_string(value)?.chars().count();
                match (min, max) {
                    (Some(min), _) if length < *min => Some(format!(
                        "is too short (minimum is {} characters)",
                        min
                    )),
                    (_, Some(max)) if length > *max => Some(format!(
                        "is too long (maximum is {} characters)",
                        max
                    )),
                    _ => None,
                }
            }
            Constraint::Format(regex) => match value_string(value) {
                Some(text) if regex.is_match(&text) => None,
                _ => Some("is invalid".to_string()),
            },
            Constraint::Numericality {
                only_integer,
                min,
                max,
            } => numericality_violation(value, *only_integer, *min, *max),
            Constraint::Inclusion(values) => match value_string(value) {
                Some(text) if values.contains(&text) => None,
                _ => Some("is not included in the list".to_string()),
            },
            Constraint::Exclusion(values) => match value_string(value) {
                Some(text) if values.contains(&text) => Some("is reserved".to_string()),
                _ => None,
            },
        }
    }
}

fn is_integer_text(text: &str) -> bool {
    let digits = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn numericality_violation(
    value: &serde_json::Value,
    only_integer: bool,
    min: Option<Decimal>,
    max: Option<Decimal>,
) -> Option<String> {
    let text = match value_string(value) {
        Some(text) => text.trim().to_string(),
        None => return Some("is not a number".to_string()),
    };

    if only_integer && !is_integer_text(&text) {
        return if value_decimal(value).is_some() {
            Some("must be an integer".to_string())
        } else {
            Some("is not a number".to_string())
        };
    }

    // Digit strings too long for a Decimal are still numbers; only bounded
    // rules need the value itself.
    if min.is_none() && max.is_none() && only_integer {
        return None;
    }

    let number = match value_decimal(value) {
        Some(number) => number,
        None => return Some("is not a number".to_string()),
    };

    if let Some(min) = min {
        if number < min {
            return Some(format!("must be greater than or equal to {}", min));
        }
    }
    if let Some(max) = max {
        if number > max {
            return Some(format!("must be less than or equal to {}", max));
        }
    }
    None
}

/// One declarative rule
#[derive(Debug, Clone)]
pub struct ValidationRule {
    /// Attributes the rule checks
    pub fields: Vec<&'static str>,
    /// Check applied to each attribute
    pub constraint: Constraint,
    /// Actions the rule runs on
    pub scope: RuleScope,
}

impl ValidationRule {
    /// Rule applied on every validation
    pub fn new(fields: &[&'static str], constraint: Constraint) -> Self {
        Self {
            fields: fields.to_vec(),
            constraint,
            scope: RuleScope::Always,
        }
    }

    /// Restrict the rule to records that are not yet persisted
    pub fn on_create(mut self) -> Self {
        self.scope = RuleScope::OnCreate;
        self
    }

    fn applies_to(&self, record: &Record) -> bool {
        match self.scope {
            RuleScope::Always => true,
            RuleScope::OnCreate => record.is_new(),
        }
    }

    /// Append violations for every field of the rule
    pub fn evaluate(&self, record: &Record, errors: &mut ErrorSet) {
        if !self.applies_to(record) {
            return;
        }
        for field in &self.fields {
            if let Some(message) = self.constraint.violation(record.get(field)) {
                errors.add(*field, message);
            }
        }
    }
}

/// Ordered rule list for one entity type
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: Vec<ValidationRule>,
}

impl Validator {
    /// Validator running `rules` in order
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    /// Add a rule
    pub fn push(&mut self, rule: ValidationRule) {
        self.rules.push(rule);
    }

    /// Rules in order
    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Run every rule against the record's current values
    pub fn check(&self, record: &Record) -> ErrorSet {
        let mut errors = ErrorSet::new();
        for rule in &self.rules {
            rule.evaluate(record, &mut errors);
        }
        errors
    }
}

/// Rule tables for every entity type
#[derive(Debug, Clone, Default)]
pub struct Schema {
    validators: HashMap<EntityKind, Validator>,
}

impl Schema {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rule list for a type, replacing any previous one
    pub fn insert(&mut self, kind: EntityKind, validator: Validator) {
        self.validators.insert(kind, validator);
    }

    /// Rules for a type, if any
    pub fn validator(&self, kind: EntityKind) -> Option<&Validator> {
        self.validators.get(&kind)
    }

    /// Check a record against its type's rules; types without rules pass
    pub fn check(&self, record: &Record) -> ErrorSet {
        self.validator(record.kind())
            .map(|validator| validator.check(record))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeRegistry;
    use crate::types::Operation;
    use serde_json::json;

    static CARD: AttributeRegistry = AttributeRegistry {
        kind: EntityKind::CreditCard,
        creatable: &["number", "cvv", "expiration_month", "cardholder_name"],
        updatable: &["cardholder_name"],
        readonly: &[],
        nested_excluded: &[],
        operations: &[Operation::Create],
    };

    fn record(attributes: serde_json::Value, persisted: bool) -> Record {
        Record::new(&CARD, attributes.as_object().cloned().unwrap(), persisted)
    }

    fn card_validator() -> Validator {
        Validator::new(vec![
            ValidationRule::new(&["number", "cvv"], Constraint::Presence).on_create(),
            ValidationRule::new(&["number"], Constraint::integer()),
            ValidationRule::new(&["number"], Constraint::length_between(12, 19)),
            ValidationRule::new(&["expiration_month"], Constraint::integer_between(1, 12)),
            ValidationRule::new(&["cardholder_name"], Constraint::max_length(255)),
        ])
    }

    #[test]
    fn test_presence_only_while_new() {
        let validator = card_validator();

        let errors = validator.check(&record(json!({}), false));
        assert_eq!(errors.on("number"), ["can't be blank"]);
        assert_eq!(errors.on("cvv"), ["can't be blank"]);

        let errors = validator.check(&record(json!({}), true));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_numeric_range_rejects_non_numeric_and_out_of_range() {
        let validator = card_validator();

        for bad in [json!(0), json!(13), json!("foo"), json!("1.5")] {
            let errors = validator.check(&record(json!({ "expiration_month": bad }), true));
            assert!(errors.contains("expiration_month"), "{:?} accepted", bad);
        }
        for good in [json!(1), json!(12), json!("12")] {
            let errors = validator.check(&record(json!({ "expiration_month": good }), true));
            assert!(!errors.contains("expiration_month"), "{:?} rejected", good);
        }
    }

    #[test]
    fn test_messages() {
        let validator = card_validator();
        let errors = validator.check(&record(json!({ "number": "foobar" }), true));
        assert_eq!(
            errors.on("number"),
            ["is not a number", "is too short (minimum is 12 characters)"]
        );

        let errors = validator.check(&record(json!({ "expiration_month": 13 }), true));
        assert_eq!(
            errors.on("expiration_month"),
            ["must be less than or equal to 12"]
        );

        let errors = validator.check(&record(json!({ "expiration_month": 2.5 }), true));
        assert_eq!(errors.on("expiration_month"), ["must be an integer"]);
    }

    #[test]
    fn test_length_operates_on_string_form() {
        let validator = card_validator();
        let name = "f".repeat(255);
        assert!(validator
            .check(&record(json!({ "cardholder_name": name }), true))
            .is_empty());

        let name = "f".repeat(256);
        let errors = validator.check(&record(json!({ "cardholder_name": name }), true));
        assert_eq!(
            errors.on("cardholder_name"),
            ["is too long (maximum is 255 characters)"]
        );
    }

    #[test]
    fn test_format_inclusion_exclusion() {
        let format = Constraint::format(r"(?i)^[-_a-z0-9]*$").unwrap();
        assert_eq!(format.violation(Some(&json!("ab-c_9"))), None);
        assert_eq!(format.violation(Some(&json!("a b"))), Some("is invalid".into()));

        let inclusion = Constraint::inclusion(&["sale", "credit"]);
        assert_eq!(inclusion.violation(Some(&json!("sale"))), None);
        assert!(inclusion.violation(Some(&json!("refund"))).is_some());

        let exclusion = Constraint::exclusion(&["all", "new"]);
        assert_eq!(exclusion.violation(Some(&json!("new"))), Some("is reserved".into()));
        assert_eq!(exclusion.violation(Some(&json!("mine"))), None);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        assert!(matches!(Constraint::format("("), Err(Error::Config(_))));
    }

    #[test]
    fn test_schema_passes_types_without_rules() {
        let mut schema = Schema::new();
        assert!(schema.check(&record(json!({}), false)).is_empty());

        schema.insert(EntityKind::CreditCard, card_validator());
        assert!(!schema.check(&record(json!({}), false)).is_empty());
    }

    #[test]
    fn test_check_is_repeatable() {
        let validator = card_validator();
        let card = record(json!({ "number": "1" }), false);
        assert_eq!(validator.check(&card), validator.check(&card));
    }
}
