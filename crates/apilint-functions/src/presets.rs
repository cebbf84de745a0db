//! Rule presets for common configurations.

use std::fmt;
use std::str::FromStr;

use apilint_core::{FunctionCall, Options, RuleDefinition, Severity, SpecType};
use serde_json::{json, Value};

use crate::{casing, oas2_discriminator, post_response_success, tag_defined};

/// Rule id for undefined operation tags.
pub const OPERATION_TAG_DEFINED: &str = "operation-tag-defined";
/// Rule id for Swagger 2 discriminators.
pub const OAS2_DISCRIMINATOR: &str = "oas2-discriminator";
/// Rule id for POST success responses.
pub const POST_RESPONSE_SUCCESS: &str = "post-response-success";
/// Rule id for operation id casing.
pub const OPERATION_ID_CAMEL_CASE: &str = "operation-id-camel-case";
/// Rule id for parameter name casing.
pub const PARAMETER_NAME_CAMEL_CASE: &str = "parameter-name-camel-case";

const OPERATIONS: &str = "$.paths[*][*]";

/// Preset configurations for apilint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Recommended rules with sensible defaults.
    Recommended,
    /// Every built-in rule, reported as errors.
    Strict,
    /// Only structural checks, for gradual adoption.
    Minimal,
    /// No rules; everything comes from a rule-set file.
    Off,
}

impl Preset {
    /// Returns the rules for this preset.
    #[must_use]
    pub fn rules(self) -> Vec<RuleDefinition> {
        match self {
            Self::Recommended => recommended_rules(),
            Self::Strict => strict_rules(),
            Self::Minimal => minimal_rules(),
            Self::Off => Vec::new(),
        }
    }

    /// Returns the name used in configuration files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recommended => "recommended",
            Self::Strict => "strict",
            Self::Minimal => "minimal",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized preset name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown preset '{0}' (expected recommended, strict, minimal or off)")]
pub struct UnknownPreset(pub String);

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "recommended" => Ok(Self::Recommended),
            "strict" | "all" => Ok(Self::Strict),
            "minimal" => Ok(Self::Minimal),
            "off" | "none" => Ok(Self::Off),
            _ => Err(UnknownPreset(s.to_string())),
        }
    }
}

fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        _ => Options::new(),
    }
}

fn operation_tag_defined() -> RuleDefinition {
    RuleDefinition::new(OPERATION_TAG_DEFINED, "$")
        .with_description("Operation tags must be defined in the global tags list.")
        .with_formats([SpecType::Swagger, SpecType::OpenApi])
        .then(FunctionCall::new(tag_defined::NAME))
}

fn oas2_discriminator() -> RuleDefinition {
    RuleDefinition::new(OAS2_DISCRIMINATOR, "$")
        .with_description("Discriminators must name a required property.")
        .with_severity(Severity::Error)
        .with_formats([SpecType::Swagger])
        .then(FunctionCall::new(oas2_discriminator::NAME))
}

fn post_response_success() -> RuleDefinition {
    RuleDefinition::new(POST_RESPONSE_SUCCESS, "$.paths[*].post.responses")
        .with_description("POST operations must define a success response.")
        .with_formats([SpecType::Swagger, SpecType::OpenApi])
        .then(
            FunctionCall::new(post_response_success::NAME)
                .with_options(options(json!({"properties": ["200", "201", "202", "204"]}))),
        )
}

fn operation_id_camel_case() -> RuleDefinition {
    RuleDefinition::new(OPERATION_ID_CAMEL_CASE, OPERATIONS)
        .with_description("Operation ids should be camelCase.")
        .with_severity(Severity::Info)
        .with_formats([SpecType::Swagger, SpecType::OpenApi])
        .then(
            FunctionCall::new(casing::NAME)
                .with_field("operationId")
                .with_options(options(json!({"type": "camel"}))),
        )
}

fn parameter_name_camel_case() -> RuleDefinition {
    RuleDefinition::new(PARAMETER_NAME_CAMEL_CASE, "$.paths[*][*].parameters[*]")
        .with_description("Query and path parameter names should be camelCase.")
        .with_severity(Severity::Info)
        .with_formats([SpecType::Swagger, SpecType::OpenApi])
        .then(
            FunctionCall::new(casing::NAME)
                .with_field("name")
                .with_options(options(json!({"type": "camel"}))),
        )
}

/// Returns the recommended set of rules.
///
/// Includes:
/// - `operation-tag-defined` - operation tags exist in the global list
/// - `oas2-discriminator` - Swagger 2 discriminators are required properties
/// - `post-response-success` - POST operations define a 2xx response
/// - `operation-id-camel-case` - operation ids are camelCase
#[must_use]
pub fn recommended_rules() -> Vec<RuleDefinition> {
    vec![
        operation_tag_defined(),
        oas2_discriminator(),
        post_response_success(),
        operation_id_camel_case(),
    ]
}

/// Returns the strict set of rules.
///
/// Every built-in rule plus `parameter-name-camel-case`, all at error level.
#[must_use]
pub fn strict_rules() -> Vec<RuleDefinition> {
    all_rules()
        .into_iter()
        .map(|rule| rule.with_severity(Severity::Error))
        .collect()
}

/// Returns the minimal set of rules.
///
/// Only the structural checks that catch broken documents:
/// - `operation-tag-defined`
/// - `oas2-discriminator`
#[must_use]
pub fn minimal_rules() -> Vec<RuleDefinition> {
    vec![operation_tag_defined(), oas2_discriminator()]
}

/// Returns all available rules at their default severities.
#[must_use]
pub fn all_rules() -> Vec<RuleDefinition> {
    vec![
        operation_tag_defined(),
        oas2_discriminator(),
        post_response_success(),
        operation_id_camel_case(),
        parameter_name_camel_case(),
    ]
}
