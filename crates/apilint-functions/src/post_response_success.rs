//! Function requiring a success status code in a response map.
//!
//! # Configuration
//!
//! ```yaml
//! then:
//!   function: post_response_success
//!   functionOptions:
//!     properties: ["200", "201", "202", "204"]
//! ```
//!
//! Codes may be written as strings or numbers. Only the direct keys of each
//! matched response map are checked.

use std::fmt;

use apilint_core::function::decode_options;
use apilint_core::{
    FunctionContext, FunctionResult, FunctionSchema, NodeId, Options, OptionsError,
    PreparedFunction, RuleFunction,
};
use serde::Deserialize;

/// Function name for success response checks.
pub const NAME: &str = "post_response_success";

/// A status code as written in options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StatusCode {
    /// A numeric code such as `201`.
    Number(u64),
    /// A textual code such as `"2XX"`.
    Text(String),
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Decoded options.
#[derive(Debug, Clone, Deserialize)]
pub struct PostResponseSuccessOptions {
    /// Accepted success codes.
    pub properties: Vec<StatusCode>,
}

/// Checks that a response map defines at least one accepted code.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostResponseSuccess;

impl PostResponseSuccess {
    /// Creates the function.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RuleFunction for PostResponseSuccess {
    fn name(&self) -> &'static str {
        NAME
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema::new(
            NAME,
            "Checks that operations define one of the accepted success responses",
        )
        .required("properties", "status codes that count as success")
        .error_message("'post_response_success' needs 'properties' to be a list of status codes")
    }

    fn prepare(&self, options: &Options) -> Result<Box<dyn PreparedFunction>, OptionsError> {
        let options: PostResponseSuccessOptions = decode_options(options)?;
        if options.properties.is_empty() {
            return Err(OptionsError::Invalid {
                message: "'properties' must list at least one status code".to_string(),
            });
        }
        let codes: Vec<String> = options.properties.iter().map(ToString::to_string).collect();
        let message = format!(
            "operations must define a success response with one of the following codes: {}",
            codes.join(", ")
        );
        Ok(Box::new(SuccessCodes { codes, message }))
    }
}

/// Prepared check with its codes and message resolved.
#[derive(Debug, Clone)]
pub struct SuccessCodes {
    codes: Vec<String>,
    message: String,
}

impl PreparedFunction for SuccessCodes {
    fn run(&self, nodes: &[NodeId], ctx: &FunctionContext<'_>) -> Vec<FunctionResult> {
        let tree = ctx.tree();
        nodes
            .iter()
            .filter(|node| {
                !tree.entries(**node).iter().any(|(key, _)| {
                    tree.scalar_str(*key)
                        .is_some_and(|k| self.codes.iter().any(|c| c == k))
                })
            })
            .map(|node| FunctionResult::new(self.message.clone(), *node))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{options, run_function};

    const DOC: &str = r#"paths:
  /pets:
    post:
      responses:
        "201":
          description: created
        default:
          description: oops
  /toys:
    post:
      responses:
        "400":
          description: bad
"#;

    #[test]
    fn accepted_code_present() {
        let results = run_function(
            &PostResponseSuccess,
            DOC,
            "$.paths['/pets'].post.responses",
            json!({"properties": ["200", "201"]}),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn missing_code_reports_once_with_codes() {
        let results = run_function(
            &PostResponseSuccess,
            DOC,
            "$.paths['/toys'].post.responses",
            json!({"properties": [200, "201", "2XX"]}),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].message,
            "operations must define a success response with one of the following codes: 200, 201, 2XX"
        );
    }

    #[test]
    fn numeric_options_match_string_keys() {
        let results = run_function(
            &PostResponseSuccess,
            DOC,
            "$.paths['/pets'].post.responses",
            json!({"properties": [201]}),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn nested_codes_do_not_count() {
        let doc = "responses:\n  default:\n    \"201\": {}\n";
        let results = run_function(
            &PostResponseSuccess,
            doc,
            "$.responses",
            json!({"properties": ["201"]}),
        );
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn zero_nodes_yield_nothing() {
        let results = run_function(
            &PostResponseSuccess,
            DOC,
            "$.paths['/nope'].post.responses",
            json!({"properties": ["201"]}),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn options_are_validated() {
        assert!(PostResponseSuccess
            .prepare(&options(json!({"properties": []})))
            .is_err());
        assert!(PostResponseSuccess
            .prepare(&options(json!({"properties": "201"})))
            .is_err());
        assert_eq!(
            PostResponseSuccess
                .schema()
                .missing_required(&options(json!({}))),
            vec!["properties"]
        );
    }
}
