//! Function checking that every operation tag is declared globally.
//!
//! # Rationale
//!
//! Tags used by operations but missing from the top-level `tags` list have
//! no description and are rendered inconsistently by documentation tools.
//!
//! The function looks at the whole document from the root, so the rule's
//! selector only needs to match something (usually `$`).

use std::collections::HashSet;

use apilint_core::tree::NodeTree;
use apilint_core::{
    FunctionContext, FunctionResult, FunctionSchema, NodeId, Options, OptionsError,
    PreparedFunction, RuleFunction,
};

/// Function name for tag definitions.
pub const NAME: &str = "tag_defined";

/// HTTP methods that introduce an operation under a path item.
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Checks operation tags against the global tag list.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagDefined;

impl TagDefined {
    /// Creates the function.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RuleFunction for TagDefined {
    fn name(&self) -> &'static str {
        NAME
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema::new(
            NAME,
            "Checks that operation tags are defined in the global tags list",
        )
    }

    fn prepare(&self, _options: &Options) -> Result<Box<dyn PreparedFunction>, OptionsError> {
        Ok(Box::new(Self))
    }
}

impl PreparedFunction for TagDefined {
    fn run(&self, nodes: &[NodeId], ctx: &FunctionContext<'_>) -> Vec<FunctionResult> {
        if nodes.is_empty() {
            return Vec::new();
        }

        let tree = ctx.tree();
        let root = ctx.root();
        let defined = global_tags(tree, root);

        let Some(paths) = tree.mapping_get(root, "paths") else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for (path_key, path_item) in tree.entries(paths) {
            let Some(path) = tree.scalar_str(*path_key) else {
                continue;
            };
            for (method_key, operation) in tree.entries(*path_item) {
                let Some(method) = tree.scalar_str(*method_key) else {
                    continue;
                };
                if !HTTP_METHODS.contains(&method) {
                    continue;
                }
                let Some(tags) = tree.mapping_get(*operation, "tags") else {
                    continue;
                };
                for tag_node in tree.items(tags) {
                    let Some(tag) = tree.scalar_str(*tag_node) else {
                        continue;
                    };
                    if !defined.contains(tag) {
                        results.push(FunctionResult::new(
                            format!(
                                "the '{method}' operation at path '{path}' contains a tag '{tag}', that is not defined in the global document tags"
                            ),
                            *tag_node,
                        ));
                    }
                }
            }
        }
        results
    }
}

/// Collects `tags[].name` from the document root.
fn global_tags(tree: &NodeTree, root: NodeId) -> HashSet<&str> {
    tree.mapping_get(root, "tags")
        .map(|tags| {
            tree.items(tags)
                .iter()
                .filter_map(|tag| tree.mapping_get(*tag, "name"))
                .filter_map(|name| tree.scalar_str(name))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{result_paths, run_function};

    fn document(ember_tag: &str) -> String {
        format!(
            r#"tags:
  - name: "princess"
  - name: "prince"
  - name: "hope"
  - name: "naughty_dog"
paths:
  /melody:
    post:
      tags:
        - "princess"
        - "hope"
  /maddox:
    get:
      tags:
        - "prince"
        - "hope"
  /ember:
    get:
      tags:
        - "{ember_tag}"
"#
        )
    }

    #[test]
    fn schema_name() {
        assert_eq!(TagDefined.schema().name, "tag_defined");
    }

    #[test]
    fn all_tags_defined() {
        let results = run_function(&TagDefined, &document("naughty_dog"), "$", json!({}));
        assert!(results.is_empty());
    }

    #[test]
    fn undefined_tag_reported_on_tag_node() {
        let doc = document("such_a_naughty_dog");
        let results = run_function(&TagDefined, &doc, "$", json!({}));
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].message,
            "the 'get' operation at path '/ember' contains a tag 'such_a_naughty_dog', that is not defined in the global document tags"
        );
        assert_eq!(
            result_paths(&doc, &results),
            vec!["#/paths/~1ember/get/tags/0"]
        );
    }

    #[test]
    fn zero_nodes_yield_nothing() {
        let results = run_function(
            &TagDefined,
            &document("such_a_naughty_dog"),
            "$.nothing",
            json!({}),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn missing_global_tags_flags_every_tag() {
        let doc = "paths:\n  /a:\n    get:\n      tags: [x, y]\n    parameters:\n      tags: [z]\n";
        let results = run_function(&TagDefined, doc, "$", json!({}));
        let messages: Vec<&str> = results.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("tag 'x'"));
        assert!(messages[1].contains("tag 'y'"));
    }
}
