//! Rule-set deserialization types (DTO layer).
//!
//! These types exist solely for serde deserialization.
//! They are converted to domain model types via the loader.

use indexmap::IndexMap;
use serde::Deserialize;

/// Raw representation of a rule-set document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleSetDto {
    /// Rules keyed by id, in declaration order.
    #[serde(default)]
    pub rules: IndexMap<String, RuleDto>,
}

/// A value written either as a single item or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single item.
    One(T),
    /// A list of items.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flattens into a list.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

/// Raw representation of one rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDto {
    /// What the rule checks.
    #[serde(default)]
    pub description: String,
    /// Selector expression(s).
    pub given: OneOrMany<String>,
    /// Severity name (default: "warn").
    #[serde(default = "default_severity_str")]
    pub severity: String,
    /// Whether the rule runs (default: true).
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Spec formats the rule applies to (default: all).
    #[serde(default)]
    pub formats: Vec<String>,
    /// Function invocation(s).
    pub then: OneOrMany<FunctionCallDto>,
}

/// Raw representation of one `then` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallDto {
    /// Registered function name.
    pub function: String,
    /// Optional key of the matched mapping to hand to the function instead.
    #[serde(default)]
    pub field: Option<String>,
    /// Function options; must be a mapping when present.
    #[serde(default, alias = "options")]
    pub function_options: Option<serde_json::Value>,
}

fn default_severity_str() -> String {
    "warn".to_string()
}
