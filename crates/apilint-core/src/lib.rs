//! # apilint-core
//!
//! Core engine for linting API description documents (OpenAPI 3,
//! Swagger 2, AsyncAPI) in JSON or YAML.
//!
//! This crate provides:
//!
//! - [`DocumentIndex`] for resolved, position-aware document lookups
//! - [`Selector`] for picking the nodes a rule applies to
//! - [`RuleFunction`] and [`FunctionRegistry`] for pluggable checks
//! - [`Motor`] for evaluating a rule set and producing a [`Report`]
//!
//! ## Example
//!
//! ```ignore
//! use apilint_core::{Document, Motor};
//!
//! let document = Document::load(&std::fs::read("openapi.yaml")?)?;
//! let mut motor = Motor::builder()
//!     .registry(apilint_functions::builtin_registry())
//!     .rules(apilint_functions::presets::recommended_rules())
//!     .build();
//!
//! let report = motor.run(&document)?;
//! for violation in &report.violations {
//!     println!("{violation}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod document;
pub mod function;
pub mod index;
pub mod motor;
pub mod ruleset;
pub mod selector;
pub mod tree;
pub mod types;

pub use config::{Config, ConfigError};
pub use document::{classify, Document, DocumentError, SpecInfo, SpecType};
pub use function::{
    FunctionContext, FunctionRegistry, FunctionResult, FunctionSchema, Options, OptionsError,
    PreparedFunction, RuleFunction,
};
pub use index::{DocumentIndex, IndexDiagnostic, IndexError};
pub use motor::{Motor, MotorBuilder, MotorError, MotorState};
pub use ruleset::{load_rule_set, FunctionCall, LoadError, LoadedRules, RuleDefinition, RuleSet};
pub use selector::{select, Selector, SelectorError};
pub use tree::{NodeId, NodeTree};
pub use types::{Diagnostic, DiagnosticKind, Range, Report, Severity, Violation};
