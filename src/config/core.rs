use crate::codegen::{EmitOptions, DEFAULT_RUNTIME_PATH};
use crate::errors::{Error, Result};
use crate::runtime::DefaultPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure, read from `.mocksmith.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Policy generated mocks start with: `"strict"` or `"type-defaults"`.
    pub default_policy: DefaultPolicy,

    /// Path generated files use to reach the runtime, e.g. `mocksmith::runtime`.
    pub runtime_path: Option<String>,

    /// Header comment of every generated file.
    pub header: Option<String>,

    /// Glob patterns over full type paths (`crate::store::*`). Empty
    /// includes everything.
    pub include: Vec<String>,

    /// Glob patterns over full type paths excluded from generation.
    pub exclude: Vec<String>,

    /// Worker threads; defaults to the number of CPUs.
    pub jobs: Option<usize>,

    /// Directory module paths are derived from, relative to the config file.
    pub source_root: Option<PathBuf>,
}

impl Config {
    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == Some(0) {
            return Err(Error::invalid_option("jobs", "must be at least 1"));
        }
        if let Some(path) = &self.runtime_path {
            syn::parse_str::<syn::Path>(path).map_err(|error| {
                Error::invalid_option("runtime_path", format!("`{}` is not a path: {}", path, error))
            })?;
        }
        for pattern in self.include.iter().chain(&self.exclude) {
            glob::Pattern::new(pattern)?;
        }
        Ok(())
    }

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            default_policy: self.default_policy,
            runtime_path: self
                .runtime_path
                .clone()
                .unwrap_or_else(|| DEFAULT_RUNTIME_PATH.to_string()),
            header: self.header.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.emit_options(), EmitOptions::default());
    }

    #[test]
    fn test_validate_rejects_zero_jobs() {
        let config = Config {
            jobs: Some(0),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidOption { option, .. }) if option == "jobs"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_runtime_path() {
        let config = Config {
            runtime_path: Some("not a path!".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let config = Config {
            exclude: vec!["crate::[".to_string()],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Pattern(_))));
    }
}
