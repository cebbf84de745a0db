//! DTO → Domain model conversion with validation.
//!
//! Conversion never fails as a whole: a rule with a bad field is dropped and
//! reported as a [`LoadError`] naming its id, and the remaining rules load.

use serde_json::Value;

use crate::document::SpecType;
use crate::function::Options;
use crate::selector::SelectorError;
use crate::types::{Diagnostic, Severity};

use super::dto::{FunctionCallDto, RuleDto, RuleSetDto};
use super::model::{FunctionCall, RuleDefinition, RuleSet};

/// Per-rule problems found while loading or preparing a rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// Unknown severity string.
    #[error("rule '{rule_id}': unknown severity `{value}`, expected: error, warn, info, hint")]
    UnknownSeverity {
        /// The rule.
        rule_id: String,
        /// The invalid value.
        value: String,
    },

    /// Unknown `formats` entry.
    #[error("rule '{rule_id}': unknown format `{value}`, expected: oas2, oas3, asyncapi")]
    UnknownFormat {
        /// The rule.
        rule_id: String,
        /// The invalid value.
        value: String,
    },

    /// A rule without any `then` entry.
    #[error("rule '{rule_id}': `then` must name at least one function")]
    NoFunctions {
        /// The rule.
        rule_id: String,
    },

    /// A `then` entry names a function that is not registered.
    #[error("rule '{rule_id}': unknown function `{function}`")]
    UnknownFunction {
        /// The rule.
        rule_id: String,
        /// The function name.
        function: String,
    },

    /// Required options are absent.
    #[error("rule '{rule_id}': function `{function}` is missing required option(s): {}", .missing.join(", "))]
    MissingOptions {
        /// The rule.
        rule_id: String,
        /// The function name.
        function: String,
        /// Missing option names.
        missing: Vec<String>,
    },

    /// Options are present but unusable.
    #[error("rule '{rule_id}': invalid options for `{function}`: {message}")]
    InvalidOptions {
        /// The rule.
        rule_id: String,
        /// The function name.
        function: String,
        /// What was wrong.
        message: String,
    },

    /// A `given` expression does not parse.
    #[error("rule '{rule_id}': invalid selector `{given}`: {source}")]
    InvalidSelector {
        /// The rule.
        rule_id: String,
        /// The expression.
        given: String,
        /// The parse error.
        source: SelectorError,
    },
}

impl LoadError {
    /// Returns the id of the rule that failed.
    #[must_use]
    pub fn rule_id(&self) -> &str {
        match self {
            Self::UnknownSeverity { rule_id, .. }
            | Self::UnknownFormat { rule_id, .. }
            | Self::NoFunctions { rule_id }
            | Self::UnknownFunction { rule_id, .. }
            | Self::MissingOptions { rule_id, .. }
            | Self::InvalidOptions { rule_id, .. }
            | Self::InvalidSelector { rule_id, .. } => rule_id,
        }
    }
}

impl From<&LoadError> for Diagnostic {
    fn from(e: &LoadError) -> Self {
        Self::rule_load(e.rule_id(), e.to_string())
    }
}

/// Rules that converted cleanly, plus one error per rejected rule.
#[derive(Debug, Clone, Default)]
pub struct LoadedRules {
    /// Valid rules in declaration order.
    pub rule_set: RuleSet,
    /// Rejected rules.
    pub errors: Vec<LoadError>,
}

/// Converts a [`RuleSetDto`] into validated rule definitions.
#[must_use]
pub fn load(dto: RuleSetDto) -> LoadedRules {
    let mut loaded = LoadedRules::default();
    for (id, rule) in dto.rules {
        match convert_rule(id, rule) {
            Ok(rule) => loaded.rule_set.insert(rule),
            Err(e) => loaded.errors.push(e),
        }
    }
    loaded
}

fn convert_rule(id: String, dto: RuleDto) -> Result<RuleDefinition, LoadError> {
    let severity = dto
        .severity
        .parse::<Severity>()
        .map_err(|_| LoadError::UnknownSeverity {
            rule_id: id.clone(),
            value: dto.severity.clone(),
        })?;

    let formats = dto
        .formats
        .iter()
        .map(|f| {
            SpecType::from_format(f).ok_or_else(|| LoadError::UnknownFormat {
                rule_id: id.clone(),
                value: f.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let then = dto
        .then
        .into_vec()
        .into_iter()
        .map(|call| convert_call(&id, call))
        .collect::<Result<Vec<_>, _>>()?;
    if then.is_empty() {
        return Err(LoadError::NoFunctions { rule_id: id });
    }

    Ok(RuleDefinition {
        id,
        description: dto.description,
        given: dto.given.into_vec(),
        severity,
        enabled: dto.enabled.unwrap_or(true),
        formats,
        then,
    })
}

fn convert_call(rule_id: &str, dto: FunctionCallDto) -> Result<FunctionCall, LoadError> {
    let options = match dto.function_options {
        None | Some(Value::Null) => Options::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(LoadError::InvalidOptions {
                rule_id: rule_id.to_string(),
                function: dto.function,
                message: format!("options must be a mapping, found `{other}`"),
            })
        }
    };
    Ok(FunctionCall {
        function: dto.function,
        field: dto.field,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_and_load(yaml: &str) -> LoadedRules {
        let dto: RuleSetDto = serde_yaml::from_str(yaml).unwrap();
        load(dto)
    }

    // -- Happy path --

    #[test]
    fn load_empty_rule_set() {
        let loaded = parse_and_load("rules: {}");
        assert!(loaded.rule_set.is_empty());
        assert!(loaded.errors.is_empty());
    }

    #[test]
    fn load_full_rule() {
        let loaded = parse_and_load(
            r"
rules:
  operation-tag-defined:
    description: Operation tags must be defined in global tags.
    given: $
    severity: error
    formats: [oas2, oas3]
    then:
      function: tag_defined
  post-success:
    given:
      - $.paths[*].post.responses
    enabled: false
    then:
      - function: post_response_success
        functionOptions:
          properties: ['200', '201']
      - function: casing
        field: operationId
        options:
          type: camel
",
        );
        assert!(loaded.errors.is_empty());
        assert_eq!(loaded.rule_set.len(), 2);

        let first = loaded.rule_set.get("operation-tag-defined").unwrap();
        assert_eq!(first.severity, Severity::Error);
        assert_eq!(first.formats, vec![SpecType::Swagger, SpecType::OpenApi]);
        assert_eq!(first.given, vec!["$".to_string()]);

        let second = loaded.rule_set.get("post-success").unwrap();
        assert!(!second.enabled);
        assert_eq!(second.severity, Severity::Warn);
        assert_eq!(second.then.len(), 2);
        assert!(second.then[0].options.contains_key("properties"));
        assert_eq!(second.then[1].field.as_deref(), Some("operationId"));
        assert_eq!(second.then[1].options["type"], "camel");
    }

    #[test]
    fn load_keeps_declaration_order() {
        let loaded = parse_and_load(
            r"
rules:
  zeta: {given: $, then: {function: a}}
  alpha: {given: $, then: {function: b}}
",
        );
        let ids: Vec<_> = loaded.rule_set.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
    }

    // -- Error cases --

    #[test]
    fn load_rejects_unknown_severity_but_keeps_others() {
        let loaded = parse_and_load(
            r"
rules:
  bad:
    given: $
    severity: critical
    then: {function: tag_defined}
  good:
    given: $
    then: {function: tag_defined}
",
        );
        assert_eq!(loaded.rule_set.len(), 1);
        assert!(matches!(
            &loaded.errors[..],
            [LoadError::UnknownSeverity { rule_id, .. }] if rule_id == "bad"
        ));
    }

    #[test]
    fn load_rejects_unknown_format() {
        let loaded = parse_and_load(
            r"
rules:
  bad:
    given: $
    formats: [raml]
    then: {function: tag_defined}
",
        );
        assert!(matches!(loaded.errors[0], LoadError::UnknownFormat { .. }));
    }

    #[test]
    fn load_rejects_scalar_options() {
        let loaded = parse_and_load(
            r"
rules:
  bad:
    given: $
    then:
      function: casing
      functionOptions: camel
",
        );
        assert!(matches!(loaded.errors[0], LoadError::InvalidOptions { .. }));
    }

    #[test]
    fn load_rejects_empty_then() {
        let loaded = parse_and_load("rules:\n  bad:\n    given: $\n    then: []\n");
        assert!(matches!(loaded.errors[0], LoadError::NoFunctions { .. }));
    }

    #[test]
    fn load_error_converts_to_diagnostic() {
        let err = LoadError::UnknownFunction {
            rule_id: "r1".to_string(),
            function: "nope".to_string(),
        };
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.rule_id.as_deref(), Some("r1"));
        assert!(diag.message.contains("unknown function `nope`"));
    }
}
