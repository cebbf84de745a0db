//! Domain model for rules.
//!
//! A [`RuleDefinition`] is immutable once loaded. Function names, options
//! and selectors are checked against a registry later, when the motor
//! prepares the rule.

use crate::document::SpecType;
use crate::function::Options;
use crate::types::Severity;

/// One `then` entry: a function name and its options.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Registered function name.
    pub function: String,
    /// Key of the matched mapping to hand to the function instead of the
    /// mapping itself.
    pub field: Option<String>,
    /// Raw options.
    pub options: Options,
}

impl FunctionCall {
    /// Creates a call with no options.
    #[must_use]
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            field: None,
            options: Options::new(),
        }
    }

    /// Sets the options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Narrows each matched node to the value under `field`.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// A declarative rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    /// Unique id.
    pub id: String,
    /// What the rule checks.
    pub description: String,
    /// Selector expressions; results are concatenated in order.
    pub given: Vec<String>,
    /// Severity of produced violations.
    pub severity: Severity,
    /// Whether the rule runs.
    pub enabled: bool,
    /// Spec types the rule applies to; empty means all.
    pub formats: Vec<SpecType>,
    /// Functions to invoke on each matched node.
    pub then: Vec<FunctionCall>,
}

impl RuleDefinition {
    /// Creates an enabled warn-level rule with one selector and no functions.
    #[must_use]
    pub fn new(id: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            given: vec![given.into()],
            severity: Severity::Warn,
            enabled: true,
            formats: Vec::new(),
            then: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds another selector.
    #[must_use]
    pub fn with_given(mut self, given: impl Into<String>) -> Self {
        self.given.push(given.into());
        self
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Restricts the rule to the given spec types.
    #[must_use]
    pub fn with_formats(mut self, formats: impl IntoIterator<Item = SpecType>) -> Self {
        self.formats = formats.into_iter().collect();
        self
    }

    /// Adds a function invocation.
    #[must_use]
    pub fn then(mut self, call: FunctionCall) -> Self {
        self.then.push(call);
        self
    }

    /// Marks the rule disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns `true` if the rule should run against `spec_type`.
    #[must_use]
    pub fn applies_to(&self, spec_type: SpecType) -> bool {
        self.formats.is_empty() || self.formats.contains(&spec_type)
    }
}

/// An ordered collection of rules with unique ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<RuleDefinition>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule, replacing an existing rule with the same id in place.
    pub fn insert(&mut self, rule: RuleDefinition) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// Merges `other` into this set; rules in `other` win on id clashes.
    pub fn merge(&mut self, other: Self) {
        for rule in other.rules {
            self.insert(rule);
        }
    }

    /// Looks up a rule by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RuleDefinition> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Keeps only the rules for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&RuleDefinition) -> bool) {
        self.rules.retain(|r| keep(r));
    }

    /// Iterates over rules in order.
    pub fn iter(&self) -> std::slice::Iter<'_, RuleDefinition> {
        self.rules.iter()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Consumes the set, returning the rules.
    #[must_use]
    pub fn into_rules(self) -> Vec<RuleDefinition> {
        self.rules
    }
}

impl FromIterator<RuleDefinition> for RuleSet {
    fn from_iter<I: IntoIterator<Item = RuleDefinition>>(iter: I) -> Self {
        let mut set = Self::new();
        for rule in iter {
            set.insert(rule);
        }
        set
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a RuleDefinition;
    type IntoIter = std::slice::Iter<'a, RuleDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let rule = RuleDefinition::new("r", "$").then(FunctionCall::new("tag_defined"));
        assert!(rule.enabled);
        assert_eq!(rule.severity, Severity::Warn);
        assert!(rule.applies_to(SpecType::AsyncApi));
    }

    #[test]
    fn formats_filter() {
        let rule = RuleDefinition::new("r", "$").with_formats([SpecType::Swagger]);
        assert!(rule.applies_to(SpecType::Swagger));
        assert!(!rule.applies_to(SpecType::OpenApi));
    }

    #[test]
    fn insert_replaces_same_id_in_place() {
        let mut set: RuleSet = [RuleDefinition::new("a", "$"), RuleDefinition::new("b", "$")]
            .into_iter()
            .collect();
        set.insert(RuleDefinition::new("a", "$.paths").with_severity(Severity::Error));
        let ids: Vec<_> = set.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(set.get("a").unwrap().severity, Severity::Error);
    }

    #[test]
    fn merge_appends_new_rules() {
        let mut base: RuleSet = std::iter::once(RuleDefinition::new("a", "$")).collect();
        let extra: RuleSet = std::iter::once(RuleDefinition::new("c", "$")).collect();
        base.merge(extra);
        assert_eq!(base.len(), 2);
    }
}
