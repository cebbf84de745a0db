//! Rule function abstraction and registry.
//!
//! A rule's `then` clause names a [`RuleFunction`]. At load time the motor
//! calls [`RuleFunction::prepare`] with the rule's options; the returned
//! [`PreparedFunction`] is immutable and shared by every evaluation worker.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::index::DocumentIndex;
use crate::tree::{NodeId, NodeTree};

/// Raw function options as written in a rule definition.
pub type Options = serde_json::Map<String, Value>;

/// Errors raised while preparing a function from its options.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// A required option is absent.
    #[error("missing required option '{name}'")]
    Missing {
        /// Option name.
        name: String,
    },

    /// The options do not decode into the function's typed options.
    #[error("{message}")]
    Invalid {
        /// What was wrong.
        message: String,
    },
}

/// Decodes raw options into a typed options struct.
///
/// # Errors
///
/// Returns [`OptionsError::Invalid`] with the `serde` message when decoding
/// fails.
pub fn decode_options<T: DeserializeOwned>(options: &Options) -> Result<T, OptionsError> {
    serde_json::from_value(Value::Object(options.clone())).map_err(|e| OptionsError::Invalid {
        message: e.to_string(),
    })
}

/// An option accepted by a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionProperty {
    /// Option key.
    pub name: &'static str,
    /// What the option controls.
    pub description: &'static str,
}

/// Describes a function's options and purpose.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionSchema {
    /// Function name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Options that must be present.
    pub required: Vec<FunctionProperty>,
    /// Options that may be present.
    pub optional: Vec<FunctionProperty>,
    /// Message used when the options are unusable.
    pub error_message: &'static str,
}

impl FunctionSchema {
    /// Creates a schema with no options.
    #[must_use]
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            ..Self::default()
        }
    }

    /// Adds a required option.
    #[must_use]
    pub fn required(mut self, name: &'static str, description: &'static str) -> Self {
        self.required.push(FunctionProperty { name, description });
        self
    }

    /// Adds an optional option.
    #[must_use]
    pub fn optional(mut self, name: &'static str, description: &'static str) -> Self {
        self.optional.push(FunctionProperty { name, description });
        self
    }

    /// Sets the error message.
    #[must_use]
    pub fn error_message(mut self, message: &'static str) -> Self {
        self.error_message = message;
        self
    }

    /// Returns the required option names absent from `options`.
    #[must_use]
    pub fn missing_required(&self, options: &Options) -> Vec<&'static str> {
        self.required
            .iter()
            .filter(|p| !options.contains_key(p.name))
            .map(|p| p.name)
            .collect()
    }
}

/// Read-only inputs handed to a function invocation.
#[derive(Clone, Copy)]
pub struct FunctionContext<'a> {
    /// Id of the rule being evaluated.
    pub rule_id: &'a str,
    /// The rule's raw options.
    pub options: &'a Options,
    /// The Document Index.
    pub index: &'a DocumentIndex,
}

impl<'a> FunctionContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(rule_id: &'a str, options: &'a Options, index: &'a DocumentIndex) -> Self {
        Self {
            rule_id,
            options,
            index,
        }
    }

    /// Returns the node tree.
    #[must_use]
    pub fn tree(&self) -> &'a NodeTree {
        self.index.tree()
    }

    /// Returns the document root.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.index.root()
    }
}

impl fmt::Debug for FunctionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionContext")
            .field("rule_id", &self.rule_id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A finding produced by a function, before the motor tags it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionResult {
    /// Human-readable message.
    pub message: String,
    /// The node the finding is about.
    pub node: NodeId,
}

impl FunctionResult {
    /// Creates a result.
    #[must_use]
    pub fn new(message: impl Into<String>, node: NodeId) -> Self {
        Self {
            message: message.into(),
            node,
        }
    }
}

/// A named, configurable check.
///
/// # Example
///
/// ```ignore
/// use apilint_core::function::*;
///
/// struct NoEmptyPaths;
///
/// impl RuleFunction for NoEmptyPaths {
///     fn name(&self) -> &'static str { "no_empty_paths" }
///     fn schema(&self) -> FunctionSchema {
///         FunctionSchema::new(self.name(), "paths must not be empty")
///     }
///     fn prepare(&self, _: &Options) -> Result<Box<dyn PreparedFunction>, OptionsError> {
///         Ok(Box::new(NoEmptyPathsCheck))
///     }
/// }
/// ```
pub trait RuleFunction: Send + Sync {
    /// Returns the name rules use to refer to this function.
    fn name(&self) -> &'static str;

    /// Returns the option schema.
    fn schema(&self) -> FunctionSchema;

    /// Decodes options and compiles anything expensive.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionsError`] when the options are unusable.
    fn prepare(&self, options: &Options) -> Result<Box<dyn PreparedFunction>, OptionsError>;
}

/// A function bound to its options, ready to run.
///
/// Implementations must not mutate anything reachable from the context and
/// must be safe to call from several threads at once. Zero input nodes yield
/// zero results.
pub trait PreparedFunction: Send + Sync {
    /// Checks the given nodes.
    fn run(&self, nodes: &[NodeId], ctx: &FunctionContext<'_>) -> Vec<FunctionResult>;
}

/// Type alias for boxed `RuleFunction` trait objects.
pub type FunctionBox = Box<dyn RuleFunction>;

/// Name-keyed table of available functions.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, FunctionBox>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function, replacing any previous one with the same name.
    pub fn register(&mut self, function: FunctionBox) {
        self.functions.insert(function.name(), function);
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn RuleFunction> {
        self.functions.get(name).map(AsRef::as_ref)
    }

    /// Returns `true` if a function with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Iterates over functions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn RuleFunction> {
        self.functions.values().map(AsRef::as_ref)
    }

    /// Returns the registered names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.functions.keys().copied().collect()
    }

    /// Returns the number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    struct Echo;

    struct EchoPrepared {
        message: String,
    }

    #[derive(Deserialize)]
    struct EchoOptions {
        message: String,
    }

    impl RuleFunction for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn schema(&self) -> FunctionSchema {
            FunctionSchema::new("echo", "repeats a message")
                .required("message", "text to report")
                .optional("loud", "unused")
        }

        fn prepare(&self, options: &Options) -> Result<Box<dyn PreparedFunction>, OptionsError> {
            let opts: EchoOptions = decode_options(options)?;
            Ok(Box::new(EchoPrepared {
                message: opts.message,
            }))
        }
    }

    impl PreparedFunction for EchoPrepared {
        fn run(&self, nodes: &[NodeId], _ctx: &FunctionContext<'_>) -> Vec<FunctionResult> {
            nodes
                .iter()
                .map(|n| FunctionResult::new(self.message.clone(), *n))
                .collect()
        }
    }

    fn options(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            _ => Options::new(),
        }
    }

    #[test]
    fn registry_register_and_get() {
        let mut registry = FunctionRegistry::new();
        assert!(registry.is_empty());
        registry.register(Box::new(Echo));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("echo"));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn schema_reports_missing_required() {
        let schema = Echo.schema();
        assert_eq!(schema.missing_required(&Options::new()), vec!["message"]);
        assert!(schema
            .missing_required(&options(json!({"message": "hi"})))
            .is_empty());
    }

    #[test]
    fn prepare_rejects_bad_types() {
        let err = Echo
            .prepare(&options(json!({"message": 42})))
            .err()
            .unwrap();
        assert!(matches!(err, OptionsError::Invalid { .. }));
    }

    #[test]
    fn prepare_accepts_good_options() {
        assert!(Echo.prepare(&options(json!({"message": "hi"}))).is_ok());
    }
}
