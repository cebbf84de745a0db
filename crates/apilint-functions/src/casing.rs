//! Function checking that a scalar value follows a casing convention.
//!
//! # Options
//!
//! - `type` (required): `flat`, `camel`, `pascal`, `kebab`, `cobol`,
//!   `snake` or `macro`
//! - `disallowDigits`: reject digits anywhere in the value
//! - `separator.char`: characters allowed between cased words
//! - `separator.allowLeading`: allow one leading separator
//!
//! The separator options may also be written as a nested
//! `separator: {char, allowLeading}` mapping; dotted keys win when both are
//! given.
//!
//! The pattern for the chosen type is compiled once, when the rule is
//! prepared.

use std::fmt;

use apilint_core::function::decode_options;
use apilint_core::{
    FunctionContext, FunctionResult, FunctionSchema, NodeId, Options, OptionsError,
    PreparedFunction, RuleFunction,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Function name for casing.
pub const NAME: &str = "casing";

/// Supported casing conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasingType {
    /// `flatcase`
    Flat,
    /// `camelCase`
    Camel,
    /// `PascalCase`
    Pascal,
    /// `kebab-case`
    Kebab,
    /// `COBOL-CASE`
    Cobol,
    /// `snake_case`
    Snake,
    /// `MACRO_CASE`
    Macro,
}

impl CasingType {
    /// All casing types.
    pub const ALL: [Self; 7] = [
        Self::Flat,
        Self::Camel,
        Self::Pascal,
        Self::Kebab,
        Self::Cobol,
        Self::Snake,
        Self::Macro,
    ];

    /// Returns the option value naming this type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Camel => "camel",
            Self::Pascal => "pascal",
            Self::Kebab => "kebab",
            Self::Cobol => "cobol",
            Self::Snake => "snake",
            Self::Macro => "macro",
        }
    }

    /// Returns the unanchored pattern for one cased word. `digits` is the
    /// character-class fragment for digits (empty when digits are disallowed).
    #[must_use]
    pub fn pattern(self, digits: &str) -> String {
        match self {
            Self::Flat => format!("[a-z][a-z{digits}]*"),
            Self::Camel => format!("[a-z][a-z{digits}]*(?:[A-Z{digits}](?:[a-z{digits}]+|$))*"),
            Self::Pascal => format!("[A-Z][a-z{digits}]*(?:[A-Z{digits}](?:[a-z{digits}]+|$))*"),
            Self::Kebab => format!("[a-z{digits}-]+"),
            Self::Cobol => format!("[A-Z{digits}-]+"),
            Self::Snake => format!("[a-z{digits}_]+"),
            Self::Macro => format!("[A-Z{digits}_]+"),
        }
    }
}

impl fmt::Display for CasingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded options.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasingOptions {
    /// Casing convention.
    #[serde(rename = "type")]
    pub casing: CasingType,
    /// Reject digits.
    #[serde(default)]
    pub disallow_digits: bool,
    /// Word separator.
    #[serde(default)]
    pub separator: Option<SeparatorOptions>,
}

/// Separator options.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeparatorOptions {
    /// Separator characters.
    #[serde(default)]
    pub char: String,
    /// Allow one leading separator.
    #[serde(default)]
    pub allow_leading: bool,
}

/// Checks scalar values against a casing convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct Casing;

impl Casing {
    /// Creates the function.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compiles typed options into a ready-to-run check.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Invalid`] if the resulting pattern does not
    /// compile.
    pub fn compile(options: &CasingOptions) -> Result<CasingCheck, OptionsError> {
        let digits = if options.disallow_digits { "" } else { "0-9" };
        let word = options.casing.pattern(digits);

        let separator = options
            .separator
            .as_ref()
            .filter(|s| !s.char.is_empty())
            .cloned();

        let full = match &separator {
            None => format!("^{word}$"),
            Some(sep) => {
                let sep_class = format!("[{}]", regex::escape(&sep.char));
                if sep.allow_leading {
                    format!("^(?:{sep_class})?{word}(?:{sep_class}{word})*$")
                } else {
                    format!("^(?:{word})+(?:{sep_class}{word})*$")
                }
            }
        };

        let pattern = Regex::new(&full).map_err(|e| OptionsError::Invalid {
            message: format!("casing pattern for '{}' does not compile: {e}", options.casing),
        })?;
        debug!("Compiled {} casing pattern: {}", options.casing, full);

        Ok(CasingCheck {
            casing: options.casing,
            separator,
            pattern,
        })
    }
}

impl RuleFunction for Casing {
    fn name(&self) -> &'static str {
        NAME
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema::new(NAME, "Checks that a value follows a casing convention")
            .required(
                "type",
                "'casing' requires a 'type' to be supplied, which can be one of: flat, camel, pascal, kebab, cobol, snake, macro",
            )
            .optional("disallowDigits", "reject digits in the value")
            .optional("separator.char", "characters allowed between words")
            .optional("separator.allowLeading", "allow one leading separator")
            .error_message(
                "'casing' function has invalid options supplied. Example valid options are 'type' = 'camel' or 'disallowDigits' = true",
            )
    }

    fn prepare(&self, options: &Options) -> Result<Box<dyn PreparedFunction>, OptionsError> {
        let options: CasingOptions = decode_options(&fold_separator_keys(options))?;
        Ok(Box::new(Self::compile(&options)?))
    }
}

/// Moves `separator.<field>` keys into a nested `separator` object.
fn fold_separator_keys(options: &Options) -> Options {
    let mut folded = Options::new();
    let mut dotted = Map::new();
    for (key, value) in options {
        match key.strip_prefix("separator.") {
            Some(field) => {
                dotted.insert(field.to_string(), value.clone());
            }
            None => {
                folded.insert(key.clone(), value.clone());
            }
        }
    }
    if dotted.is_empty() {
        return folded;
    }

    let nested = folded
        .entry("separator")
        .or_insert_with(|| Value::Object(Map::new()));
    match nested {
        Value::Object(nested) => nested.extend(dotted),
        other => *other = Value::Object(dotted),
    }
    folded
}

/// A compiled casing check.
#[derive(Debug, Clone)]
pub struct CasingCheck {
    casing: CasingType,
    separator: Option<SeparatorOptions>,
    pattern: Regex,
}

impl CasingCheck {
    /// Returns `true` if `value` follows the convention.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        if let Some(sep) = &self.separator {
            if sep.allow_leading && value.chars().count() == 1 && value == sep.char {
                return true;
            }
        }
        self.pattern.is_match(value)
    }
}

impl PreparedFunction for CasingCheck {
    fn run(&self, nodes: &[NodeId], ctx: &FunctionContext<'_>) -> Vec<FunctionResult> {
        let [node] = nodes else {
            return Vec::new();
        };
        let Some(value) = ctx.tree().scalar_str(*node) else {
            return Vec::new();
        };

        if self.matches(value) {
            Vec::new()
        } else {
            vec![FunctionResult::new(
                format!("'{value}' is not {} case!", self.casing),
                *node,
            )]
        }
    }
}
