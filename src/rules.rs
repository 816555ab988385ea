//! Declarative field rules and their pure evaluation.
//!
//! A [`RuleSet`] maps field names to a [`FieldRule`]: a human-readable label
//! plus a set of [`Constraint`]s. Evaluating a rule set against any
//! [`FieldValues`] source yields an [`Evaluation`] without touching a
//! document; applying the result to a page is the validator's job.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::mem::discriminant;

use crate::email::is_valid_email;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Required,
    /// Minimum number of characters after trimming. Zero never fails.
    MinLength(usize),
    /// Raw value must equal the raw value of another field in the same form.
    MatchesField(String),
    IsEmail,
}

impl Constraint {
    /// Evaluation order within a field. Only the first failing constraint
    /// is reported.
    fn precedence(&self) -> u8 {
        match self {
            Self::Required => 0,
            Self::MinLength(_) => 1,
            Self::MatchesField(_) => 2,
            Self::IsEmail => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Required,
    TooShort(usize),
    Mismatch,
    InvalidEmail,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("is required"),
            Self::TooShort(min) => write!(f, "must be at least {min} characters"),
            Self::Mismatch => f.write_str("does not match"),
            Self::InvalidEmail => f.write_str("must be a valid email address"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Passed,
    Failed(FailureReason),
    /// The form has no control with this name; the rule was skipped.
    Missing,
}

/// Source of raw (untrimmed) control values keyed by field name.
pub trait FieldValues {
    fn raw_value(&self, field: &str) -> Option<String>;
}

impl<K, V> FieldValues for HashMap<K, V>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
{
    fn raw_value(&self, field: &str) -> Option<String> {
        self.get(field).map(|value| value.as_ref().to_string())
    }
}

impl<K, V> FieldValues for [(K, V)]
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn raw_value(&self, field: &str) -> Option<String> {
        self.iter()
            .find(|(key, _)| key.as_ref() == field)
            .map(|(_, value)| value.as_ref().to_string())
    }
}

impl<K, V, const N: usize> FieldValues for [(K, V); N]
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn raw_value(&self, field: &str) -> Option<String> {
        self.as_slice().raw_value(field)
    }
}

impl<K, V> FieldValues for Vec<(K, V)>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    fn raw_value(&self, field: &str) -> Option<String> {
        self.as_slice().raw_value(field)
    }
}

/// Constraints for one field, kept sorted by evaluation precedence with at
/// most one constraint of each kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    field: String,
    label: String,
    constraints: Vec<Constraint>,
}

impl FieldRule {
    pub fn new(field: &str, label: &str) -> Self {
        Self {
            field: field.to_string(),
            label: label.to_string(),
            constraints: Vec::new(),
        }
    }

    pub fn required(self) -> Self {
        self.with(Constraint::Required)
    }

    pub fn min_length(self, min: usize) -> Self {
        self.with(Constraint::MinLength(min))
    }

    pub fn matches(self, other_field: &str) -> Self {
        self.with(Constraint::MatchesField(other_field.to_string()))
    }

    pub fn email(self) -> Self {
        self.with(Constraint::IsEmail)
    }

    /// Adds `constraint`, replacing any existing constraint of the same kind.
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints
            .retain(|existing| discriminant(existing) != discriminant(&constraint));
        let position = self
            .constraints
            .iter()
            .position(|existing| existing.precedence() > constraint.precedence())
            .unwrap_or(self.constraints.len());
        self.constraints.insert(position, constraint);
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Checks this field against `values`.
    ///
    /// Required, minimum length and email format look at the trimmed value.
    /// The match check compares the untrimmed values of both fields and is
    /// skipped when the other field is absent.
    pub fn check<V: FieldValues + ?Sized>(&self, values: &V) -> FieldOutcome {
        let Some(raw) = values.raw_value(&self.field) else {
            return FieldOutcome::Missing;
        };
        let value = raw.trim();

        for constraint in &self.constraints {
            let failed = match constraint {
                Constraint::Required => value.is_empty().then_some(FailureReason::Required),
                Constraint::MinLength(min) => (*min > 0 && value.chars().count() < *min)
                    .then_some(FailureReason::TooShort(*min)),
                Constraint::MatchesField(other) => values
                    .raw_value(other)
                    .filter(|other_raw| *other_raw != raw)
                    .map(|_| FailureReason::Mismatch),
                Constraint::IsEmail => (!is_valid_email(value)).then_some(FailureReason::InvalidEmail),
            };
            if let Some(reason) = failed {
                return FieldOutcome::Failed(reason);
            }
        }
        FieldOutcome::Passed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    pub field: String,
    pub label: String,
    pub reason: FailureReason,
}

impl FieldFailure {
    /// `"<label> <reason>"`, the text shown to the user.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.label, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResult {
    pub field: String,
    pub label: String,
    pub outcome: FieldOutcome,
}

/// Outcome of one submission attempt, in rule-set order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    results: Vec<FieldResult>,
}

impl Evaluation {
    pub fn results(&self) -> &[FieldResult] {
        &self.results
    }

    pub fn outcome(&self, field: &str) -> Option<&FieldOutcome> {
        self.results
            .iter()
            .find(|result| result.field == field)
            .map(|result| &result.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = FieldFailure> + '_ {
        self.results.iter().filter_map(|result| match result.outcome {
            FieldOutcome::Failed(reason) => Some(FieldFailure {
                field: result.field.clone(),
                label: result.label.clone(),
                reason,
            }),
            FieldOutcome::Passed | FieldOutcome::Missing => None,
        })
    }

    pub fn messages(&self) -> Vec<String> {
        self.failures().map(|failure| failure.message()).collect()
    }

    pub fn is_valid(&self) -> bool {
        !self
            .results
            .iter()
            .any(|result| matches!(result.outcome, FieldOutcome::Failed(_)))
    }
}

/// Field rules for one form, evaluated in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<FieldRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RuleSet::insert`].
    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.insert(rule);
        self
    }

    /// Adds `rule`. A rule for a field already present replaces the old one
    /// in place.
    pub fn insert(&mut self, rule: FieldRule) {
        match self
            .rules
            .iter_mut()
            .find(|existing| existing.field == rule.field)
        {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn evaluate<V: FieldValues + ?Sized>(&self, values: &V) -> Evaluation {
        Evaluation {
            results: self
                .rules
                .iter()
                .map(|rule| FieldResult {
                    field: rule.field.clone(),
                    label: rule.label.clone(),
                    outcome: rule.check(values),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn username_rules() -> RuleSet {
        RuleSet::new().rule(FieldRule::new("username", "Username").required().min_length(3))
    }

    #[test]
    fn empty_required_field_reports_required_only() {
        let evaluation = username_rules().evaluate(&[("username", "")]);
        assert!(!evaluation.is_valid());
        assert_eq!(evaluation.messages(), vec!["Username is required"]);
    }

    #[test]
    fn whitespace_only_counts_as_empty() {
        let evaluation = username_rules().evaluate(&[("username", "   ")]);
        assert_eq!(evaluation.messages(), vec!["Username is required"]);
    }

    #[test]
    fn short_value_reports_min_length() {
        let evaluation = username_rules().evaluate(&[("username", " ab ")]);
        assert_eq!(
            evaluation.messages(),
            vec!["Username must be at least 3 characters"]
        );
    }

    #[test]
    fn min_length_counts_characters_not_bytes() {
        let evaluation = username_rules().evaluate(&[("username", "żółw")]);
        assert!(evaluation.is_valid());
    }

    #[test]
    fn constraint_order_does_not_depend_on_declaration_order() {
        let rule = FieldRule::new("email", "Email").email().min_length(5).required();
        assert_eq!(
            rule.constraints(),
            &[
                Constraint::Required,
                Constraint::MinLength(5),
                Constraint::IsEmail
            ]
        );
        assert_eq!(
            rule.check(&[("email", "a@b")]),
            FieldOutcome::Failed(FailureReason::TooShort(5))
        );
    }

    #[test]
    fn same_kind_constraint_replaces_previous() {
        let rule = FieldRule::new("title", "Title").min_length(3).min_length(5);
        assert_eq!(rule.constraints(), &[Constraint::MinLength(5)]);
    }

    #[test]
    fn matching_fields_pass_and_mismatches_fail() {
        let rules = RuleSet::new().rule(
            FieldRule::new("confirm_password", "Confirm password")
                .required()
                .matches("password"),
        );

        let ok = rules.evaluate(&[("password", "abcdef"), ("confirm_password", "abcdef")]);
        assert_eq!(ok.outcome("confirm_password"), Some(&FieldOutcome::Passed));

        let bad = rules.evaluate(&[("password", "abcdef"), ("confirm_password", "xyz")]);
        assert_eq!(bad.messages(), vec!["Confirm password does not match"]);
    }

    #[test]
    fn failure_message_matches_display() {
        let evaluation = username_rules().evaluate(&[("username", "ab")]);
        let failure = evaluation.failures().next().expect("username fails");
        assert_eq!(failure.message(), "Username must be at least 3 characters");
        assert_eq!(failure.message(), failure.to_string());
    }

    #[test]
    fn match_compares_untrimmed_values() {
        let rules = RuleSet::new().rule(FieldRule::new("confirm", "Confirm").matches("password"));
        let evaluation = rules.evaluate(&[("password", "secret"), ("confirm", "secret ")]);
        assert_eq!(
            evaluation.outcome("confirm"),
            Some(&FieldOutcome::Failed(FailureReason::Mismatch))
        );
    }

    #[test]
    fn match_against_absent_field_is_skipped() {
        let rules = RuleSet::new().rule(FieldRule::new("confirm", "Confirm").matches("password"));
        let evaluation = rules.evaluate(&[("confirm", "anything")]);
        assert!(evaluation.is_valid());
    }

    #[test]
    fn absent_field_is_reported_missing_and_not_a_failure() {
        let evaluation = username_rules().evaluate(&[("email", "a@example.com")]);
        assert_eq!(evaluation.outcome("username"), Some(&FieldOutcome::Missing));
        assert!(evaluation.is_valid());
        assert!(evaluation.messages().is_empty());
    }

    #[test]
    fn optional_email_still_rejects_empty_value() {
        let rules = RuleSet::new().rule(FieldRule::new("email", "Email").email());
        let evaluation = rules.evaluate(&[("email", "")]);
        assert_eq!(evaluation.messages(), vec!["Email must be a valid email address"]);
    }

    #[test]
    fn min_length_zero_never_fails() {
        let rules = RuleSet::new().rule(FieldRule::new("bio", "Bio").min_length(0));
        assert!(rules.evaluate(&[("bio", "")]).is_valid());
    }

    #[test]
    fn failures_keep_rule_set_order() {
        let rules = RuleSet::new()
            .rule(FieldRule::new("title", "Title").required())
            .rule(FieldRule::new("content", "Content").required().min_length(10));
        let values: HashMap<&str, &str> = [("content", "short"), ("title", "")].into();
        assert_eq!(
            rules.evaluate(&values).messages(),
            vec!["Title is required", "Content must be at least 10 characters"]
        );
    }

    #[test]
    fn reinserting_a_field_keeps_its_position() {
        let mut rules = RuleSet::new()
            .rule(FieldRule::new("a", "A").required())
            .rule(FieldRule::new("b", "B").required());
        rules.insert(FieldRule::new("a", "First").email());
        let fields: Vec<_> = rules.iter().map(|rule| rule.label()).collect();
        assert_eq!(fields, vec!["First", "B"]);
        assert_eq!(rules.len(), 2);
    }
}
