//! Declarative rule sets loaded from YAML or JSON.
//!
//! # Architecture
//!
//! ```text
//! YAML / JSON text
//!   ↓ serde (DTO layer)
//! dto types
//!   ↓ validate + convert (per rule; bad rules become LoadErrors)
//! RuleSet (domain model)
//!   ↓ Motor::builder().rules(..)
//! prepared rules
//! ```

pub mod dto;
pub mod loader;
pub mod model;

pub use loader::{LoadError, LoadedRules};
pub use model::{FunctionCall, RuleDefinition, RuleSet};

/// Errors that prevent a rule-set document from being read at all.
#[derive(Debug, thiserror::Error)]
pub enum RuleSetError {
    /// YAML deserialization failed.
    #[error("rule set YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON deserialization failed.
    #[error("rule set JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses a YAML rule-set document.
///
/// # Errors
///
/// Returns an error if the text is not a rule-set document. Problems with
/// individual rules are reported in [`LoadedRules::errors`].
pub fn load_rule_set_from_yaml(content: &str) -> Result<LoadedRules, RuleSetError> {
    let dto: dto::RuleSetDto = serde_yaml::from_str(content)?;
    Ok(loader::load(dto))
}

/// Parses a JSON rule-set document.
///
/// # Errors
///
/// Returns an error if the text is not a rule-set document.
pub fn load_rule_set_from_json(content: &str) -> Result<LoadedRules, RuleSetError> {
    let dto: dto::RuleSetDto = serde_json::from_str(content)?;
    Ok(loader::load(dto))
}

/// Parses a rule-set document, choosing JSON when the text looks like a
/// JSON object and YAML otherwise.
///
/// # Errors
///
/// See [`load_rule_set_from_yaml`].
pub fn load_rule_set(content: &str) -> Result<LoadedRules, RuleSetError> {
    let trimmed = content.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        load_rule_set_from_json(content)
    } else {
        load_rule_set_from_yaml(content)
    }
}
