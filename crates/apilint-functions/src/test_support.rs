//! Shared helpers for function unit tests.

use std::sync::Arc;

use apilint_core::document::parse;
use apilint_core::{
    select, DocumentIndex, FunctionContext, FunctionResult, Options, RuleFunction,
};
use serde_json::Value;

pub(crate) fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        _ => Options::new(),
    }
}

pub(crate) fn index(yaml: &str) -> DocumentIndex {
    let parsed = parse(yaml.as_bytes()).expect("test document should parse");
    DocumentIndex::build(Arc::new(parsed.tree)).expect("test document should index")
}

/// Prepares `function` with `opts`, then runs it once over the nodes
/// `given` selects.
pub(crate) fn run_function(
    function: &dyn RuleFunction,
    yaml: &str,
    given: &str,
    opts: Value,
) -> Vec<FunctionResult> {
    let index = index(yaml);
    let opts = options(opts);
    let prepared = function
        .prepare(&opts)
        .expect("test options should be valid");
    let nodes = select(given, &index);
    let ctx = FunctionContext::new("test-rule", &opts, &index);
    prepared.run(&nodes, &ctx)
}

/// Returns the path of every result, in order.
pub(crate) fn result_paths(yaml: &str, results: &[FunctionResult]) -> Vec<String> {
    let index = index(yaml);
    results
        .iter()
        .filter_map(|r| index.path_of(r.node).map(str::to_string))
        .collect()
}
