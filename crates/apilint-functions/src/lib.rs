//! # apilint-functions
//!
//! Built-in rule functions and presets for apilint.
//!
//! ## Available Functions
//!
//! | Name | Options | Description |
//! |------|---------|-------------|
//! | `casing` | `type`, `disallowDigits`, `separator` | Value follows a casing convention |
//! | `tag_defined` | none | Operation tags appear in the global `tags` list |
//! | `oas2_discriminator` | none | Swagger 2 discriminators name a required property |
//! | `post_response_success` | `properties` | Response map defines an accepted success code |
//!
//! ## Usage
//!
//! ```ignore
//! use apilint_core::{Document, Motor};
//! use apilint_functions::{builtin_registry, Preset};
//!
//! let mut motor = Motor::builder()
//!     .registry(builtin_registry())
//!     .rules(Preset::Recommended.rules())
//!     .build();
//! let report = motor.run(&Document::load(bytes)?)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod casing;
pub mod oas2_discriminator;
pub mod post_response_success;
pub mod presets;
pub mod tag_defined;

#[cfg(test)]
mod test_support;

pub use casing::{Casing, CasingOptions, CasingType};
pub use oas2_discriminator::Oas2Discriminator;
pub use post_response_success::PostResponseSuccess;
pub use presets::{all_rules, minimal_rules, recommended_rules, strict_rules, Preset};
pub use tag_defined::TagDefined;

use apilint_core::FunctionRegistry;
use tracing::debug;

/// Re-export core types for convenience.
pub use apilint_core::{RuleDefinition, RuleFunction, Severity};

/// Adds every built-in function to `registry`.
pub fn register_builtins(registry: &mut FunctionRegistry) {
    registry.register(Box::new(Casing::new()));
    registry.register(Box::new(TagDefined::new()));
    registry.register(Box::new(Oas2Discriminator::new()));
    registry.register(Box::new(PostResponseSuccess::new()));
    debug!("Registered {} built-in functions", registry.len());
}

/// Returns a registry holding every built-in function.
#[must_use]
pub fn builtin_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    register_builtins(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_by_name() {
        let registry = builtin_registry();
        assert_eq!(
            registry.names(),
            vec![
                "casing",
                "oas2_discriminator",
                "post_response_success",
                "tag_defined"
            ]
        );
        for function in registry.iter() {
            assert_eq!(function.schema().name, function.name());
        }
    }
}
