//! Locating and loading `apilint.toml`.
//!
//! Lookup order, first hit wins:
//!
//! 1. `--config` / `$APILINT_CONFIG`
//! 2. `apilint.toml`, then `.apilint.toml`, in the working directory
//! 3. `config.toml` in the global directory (`$APILINT_CONFIG_DIR` or
//!    `~/.apilint/`)
//! 4. built-in defaults
//!
//! A relative `ruleset` path inside a config file is taken relative to
//! that file's directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use apilint_core::Config;

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named on the command line or in `$APILINT_CONFIG`.
    Explicit(PathBuf),
    /// Found in the working directory.
    Project(PathBuf),
    /// Found in the global config directory.
    Global(PathBuf),
    /// Nothing found.
    Default,
}

impl ConfigSource {
    /// Returns the config file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Project(p) | Self::Global(p) => Some(p),
            Self::Default => None,
        }
    }

    /// Returns `true` for a config from the global directory.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global(_))
    }

    /// Reads the config this source points to, or the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or is not valid config TOML.
    pub fn load(&self) -> Result<Config> {
        let Some(path) = self.path() else {
            tracing::debug!("No config file found, using defaults");
            return Ok(Config::default());
        };
        if self.is_global() {
            tracing::info!("Using global config: {}", path.display());
        }
        let mut config = Config::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?;
        if let (Some(ruleset), Some(dir)) = (config.ruleset.as_ref(), path.parent()) {
            if ruleset.is_relative() {
                config.ruleset = Some(dir.join(ruleset));
            }
        }
        Ok(config)
    }
}

/// Config file names looked for in the working directory.
pub const PROJECT_CONFIG_NAMES: &[&str] = &["apilint.toml", ".apilint.toml"];

const GLOBAL_CONFIG_NAME: &str = "config.toml";

/// Finds the config file for `project_dir`.
#[must_use]
pub fn resolve(project_dir: &Path, explicit: Option<&Path>) -> ConfigSource {
    resolve_inner(project_dir, explicit, global_config_dir())
}

/// [`resolve`] with the global directory passed in, so tests never touch
/// the real home directory.
fn resolve_inner(
    project_dir: &Path,
    explicit: Option<&Path>,
    global_dir: Option<PathBuf>,
) -> ConfigSource {
    if let Some(p) = explicit {
        return ConfigSource::Explicit(p.to_path_buf());
    }

    if let Some(found) = PROJECT_CONFIG_NAMES
        .iter()
        .map(|name| project_dir.join(name))
        .find(|candidate| candidate.is_file())
    {
        tracing::debug!("Found project config: {}", found.display());
        return ConfigSource::Project(found);
    }

    global_dir
        .map(|dir| dir.join(GLOBAL_CONFIG_NAME))
        .filter(|candidate| candidate.is_file())
        .map_or(ConfigSource::Default, |found| {
            tracing::debug!("Found global config: {}", found.display());
            ConfigSource::Global(found)
        })
}

/// Returns the global config directory: `$APILINT_CONFIG_DIR`, else
/// `~/.apilint/`.
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("APILINT_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    home::home_dir().map(|h| h.join(".apilint"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apilint_core::Severity;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn explicit_wins_even_over_project_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("apilint.toml"), "").unwrap();
        let explicit = tmp.path().join("ci.toml");

        let result = resolve_inner(tmp.path(), Some(&explicit), None);
        assert_eq!(result, ConfigSource::Explicit(explicit));
    }

    #[test]
    fn project_names_checked_in_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".apilint.toml"), "").unwrap();
        assert_eq!(
            resolve_inner(tmp.path(), None, None),
            ConfigSource::Project(tmp.path().join(".apilint.toml"))
        );

        fs::write(tmp.path().join("apilint.toml"), "").unwrap();
        assert_eq!(
            resolve_inner(tmp.path(), None, None),
            ConfigSource::Project(tmp.path().join("apilint.toml"))
        );
    }

    #[test]
    fn global_used_only_without_project_config() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        fs::write(global.path().join("config.toml"), "").unwrap();

        let result = resolve_inner(project.path(), None, Some(global.path().to_path_buf()));
        assert_eq!(
            result,
            ConfigSource::Global(global.path().join("config.toml"))
        );
        assert!(result.is_global());

        fs::write(project.path().join("apilint.toml"), "").unwrap();
        let result = resolve_inner(project.path(), None, Some(global.path().to_path_buf()));
        assert!(matches!(result, ConfigSource::Project(_)));
    }

    #[test]
    fn empty_global_dir_falls_back_to_default() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        let result = resolve_inner(project.path(), None, Some(global.path().to_path_buf()));
        assert_eq!(result, ConfigSource::Default);
        assert!(result.path().is_none());
    }

    #[test]
    fn default_source_loads_defaults() {
        let config = ConfigSource::Default.load().unwrap();
        assert!(config.ruleset.is_none());
        assert_eq!(config.fail_on(), Severity::Error);
    }

    #[test]
    fn relative_ruleset_is_anchored_at_config_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("apilint.toml");
        fs::write(&path, "ruleset = \"rules/api.yaml\"\nfail_on = \"warn\"\n").unwrap();

        let config = ConfigSource::Project(path).load().unwrap();
        assert_eq!(config.ruleset, Some(tmp.path().join("rules/api.yaml")));
        assert_eq!(config.fail_on(), Severity::Warn);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let source = ConfigSource::Explicit(tmp.path().join("nope.toml"));
        assert!(source.load().is_err());
    }
}
