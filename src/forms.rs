use crate::config::Settings;
use crate::rules::{FieldRule, RuleSet};

pub fn register_rules() -> RuleSet {
    RuleSet::new()
        .rule(FieldRule::new("username", "Username").required().min_length(3))
        .rule(FieldRule::new("email", "Email").required().email())
        .rule(FieldRule::new("password", "Password").required().min_length(6))
        .rule(
            FieldRule::new("confirm_password", "Confirm password")
                .required()
                .matches("password"),
        )
}

pub fn login_rules() -> RuleSet {
    RuleSet::new()
        .rule(FieldRule::new("email", "Email").required().email())
        .rule(FieldRule::new("password", "Password").required())
}

pub fn post_rules() -> RuleSet {
    RuleSet::new()
        .rule(FieldRule::new("title", "Title").required().min_length(5))
        .rule(FieldRule::new("content", "Content").required().min_length(10))
}

pub fn comment_rules() -> RuleSet {
    RuleSet::new().rule(FieldRule::new("content", "Comment").required().min_length(3))
}

pub(crate) fn builtin_rule_sets(settings: &Settings) -> Vec<(String, RuleSet)> {
    vec![
        (settings.register_form_id.clone(), register_rules()),
        (settings.login_form_id.clone(), login_rules()),
        (settings.post_form_id.clone(), post_rules()),
        (settings.comment_form_id.clone(), comment_rules()),
    ]
}
