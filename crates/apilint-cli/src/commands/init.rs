//! Init command implementation.

use anyhow::{bail, Context, Result};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# apilint configuration

# Built-in rules to start from: recommended, strict, minimal or off
preset = "recommended"

# Extra rules, merged over the preset (same id replaces the preset rule)
ruleset = "apilint-rules.yaml"

# Lowest severity that makes `apilint lint` exit non-zero
fail_on = "error"

[motor]
# parallelism = 4
# deadline_ms = 5000

# Per-rule overrides
# [rules.operation-id-camel-case]
# severity = "warn"

# [rules.post-response-success]
# enabled = false
"#;

const DEFAULT_RULESET: &str = r#"# apilint rule set
rules:
  info-title-pascal-case:
    description: API titles should be PascalCase.
    given: $.info.title
    severity: hint
    formats: [oas2, oas3]
    then:
      function: casing
      functionOptions:
        type: pascal
        separator:
          char: " "
"#;

/// Runs the init command.
pub fn run(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join("apilint.toml");
    let ruleset_path = dir.join("apilint-rules.yaml");

    for path in [&config_path, &ruleset_path] {
        if path.exists() && !force {
            bail!(
                "{} already exists. Use --force to overwrite.",
                path.display()
            );
        }
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    std::fs::write(&ruleset_path, DEFAULT_RULESET)
        .with_context(|| format!("Failed to write {}", ruleset_path.display()))?;

    println!("Created apilint.toml and apilint-rules.yaml");
    println!("\nNext steps:");
    println!("  1. Edit apilint-rules.yaml to add rules");
    println!("  2. Run: apilint lint openapi.yaml");

    Ok(())
}
