//! Function validating Swagger 2 schema discriminators.
//!
//! # Rationale
//!
//! In Swagger 2 a discriminator is the *name* of a property, and that
//! property must be listed in the schema's `required` list. A mapping-shaped
//! discriminator is OpenAPI 3 syntax and is wrong here.
//!
//! Both problems are reported independently, so a mapping discriminator
//! yields two results for the same schema.

use apilint_core::tree::NodeTree;
use apilint_core::{
    FunctionContext, FunctionResult, FunctionSchema, NodeId, Options, OptionsError,
    PreparedFunction, RuleFunction,
};

/// Function name for discriminator validation.
pub const NAME: &str = "oas2_discriminator";

/// Checks every schema under `definitions` that carries a discriminator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Oas2Discriminator;

impl Oas2Discriminator {
    /// Creates the function.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RuleFunction for Oas2Discriminator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema::new(
            NAME,
            "Checks that discriminators name a required property",
        )
    }

    fn prepare(&self, _options: &Options) -> Result<Box<dyn PreparedFunction>, OptionsError> {
        Ok(Box::new(Self))
    }
}

impl PreparedFunction for Oas2Discriminator {
    fn run(&self, nodes: &[NodeId], ctx: &FunctionContext<'_>) -> Vec<FunctionResult> {
        if nodes.is_empty() {
            return Vec::new();
        }

        let tree = ctx.tree();
        let Some(definitions) = tree.mapping_get(ctx.root(), "definitions") else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for (name_node, schema) in tree.entries(definitions) {
            let name = tree.scalar_str(*name_node).unwrap_or_default();
            let Some(schema) = ctx.index.dereference(*schema) else {
                continue;
            };
            let Some(discriminator) = tree.mapping_get(schema, "discriminator") else {
                continue;
            };

            let is_mapping = tree.get(discriminator).is_some_and(|n| n.is_mapping());
            if is_mapping {
                results.push(FunctionResult::new(
                    format!(
                        "the discriminator for schema '{name}' must be a property name, not an object"
                    ),
                    discriminator,
                ));
            }

            let property = tree.scalar_str(discriminator);
            if !property.is_some_and(|p| is_required(tree, schema, p)) {
                let message = match property {
                    Some(p) => format!(
                        "the discriminator '{p}' for schema '{name}' is not listed in its required properties"
                    ),
                    None => format!(
                        "the discriminator for schema '{name}' does not name a required property"
                    ),
                };
                results.push(FunctionResult::new(message, discriminator));
            }
        }
        results
    }
}

fn is_required(tree: &NodeTree, schema: NodeId, property: &str) -> bool {
    tree.mapping_get(schema, "required")
        .is_some_and(|required| tree.string_items(required).contains(&property))
}
