//! List functions command implementation.

use apilint_functions::{all_rules, builtin_registry, Preset};

/// Runs the list-functions command.
pub fn run() {
    let registry = builtin_registry();

    println!("Available functions:\n");
    println!("{:<24} Description", "Name");
    println!("{}", "-".repeat(80));

    for function in registry.iter() {
        let schema = function.schema();
        println!("{:<24} {}", schema.name, schema.description);
        for option in &schema.required {
            println!("{:<24}   {} (required): {}", "", option.name, option.description);
        }
        for option in &schema.optional {
            println!("{:<24}   {}: {}", "", option.name, option.description);
        }
    }

    println!("\nBuilt-in rules:\n");
    for rule in all_rules() {
        println!("  {:<28} {:<6} {}", rule.id, rule.severity, rule.description);
    }

    println!("\nPresets:");
    for preset in [Preset::Recommended, Preset::Strict, Preset::Minimal, Preset::Off] {
        let ids: Vec<String> = preset.rules().into_iter().map(|r| r.id).collect();
        let ids = if ids.is_empty() {
            "(none)".to_string()
        } else {
            ids.join(", ")
        };
        println!("  {:<12} - {}", preset.as_str(), ids);
    }

    println!("\nUse --rules to run specific rules, e.g.:");
    println!("  apilint lint openapi.yaml --rules operation-tag-defined,post-response-success");
}
