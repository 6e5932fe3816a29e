use super::core::Config;
use crate::errors::{Error, IoResultExt, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".mocksmith.toml";

const MAX_TRAVERSAL_DEPTH: usize = 10;

/// A configuration and the file it came from, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// `source_root` resolved against the config file's directory.
    pub fn source_root(&self) -> Option<PathBuf> {
        let root = self.config.source_root.as_ref()?;
        let base = self.path.as_deref().and_then(Path::parent);
        Some(match base {
            Some(base) if root.is_relative() => base.join(root),
            _ => root.clone(),
        })
    }
}

/// Parse and validate config from a TOML string
pub fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let config = toml::from_str::<Config>(contents).map_err(|error| {
        Error::config(format!("failed to parse {}: {}", CONFIG_FILE_NAME, error), path)
    })?;
    config.validate()?;
    Ok(config)
}

pub fn load_config_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path).with_path("cannot read configuration", path)?;
    let config = parse_config(&contents, path)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// `start` and its parents, nearest first, at most `max_depth` of them.
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Nearest `.mocksmith.toml` in `start` or one of its ancestors.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    directory_ancestors(start.to_path_buf(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.is_file())
}

/// Load the nearest configuration above `start`, or the defaults.
///
/// A config file that exists but does not parse is an error rather than a
/// silent fallback.
pub fn load_config(start: &Path) -> Result<LoadedConfig> {
    match find_config(start) {
        Some(path) => Ok(LoadedConfig {
            config: load_config_file(&path)?,
            path: Some(path),
        }),
        None => {
            tracing::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            Ok(LoadedConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::DefaultPolicy;
    use indoc::indoc;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            indoc! {r#"
                default_policy = "type-defaults"
                runtime_path = "::mocksmith::runtime"
                header = "Generated. Do not edit."
                include = ["crate::store::*"]
                exclude = ["crate::store::Internal*"]
                jobs = 4
                source_root = "src"
            "#},
            Path::new(".mocksmith.toml"),
        )
        .unwrap();
        assert_eq!(config.default_policy, DefaultPolicy::TypeDefaults);
        assert_eq!(config.include, vec!["crate::store::*"]);
        assert_eq!(config.jobs, Some(4));
        assert_eq!(config.source_root, Some(PathBuf::from("src")));
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let error = parse_config("colour = true", Path::new("x/.mocksmith.toml")).unwrap_err();
        assert!(matches!(error, Error::Config { .. }));
        assert!(error.to_string().contains("x/.mocksmith.toml"));
    }

    #[test]
    fn test_directory_ancestors_is_bounded() {
        let dirs: Vec<_> = directory_ancestors(PathBuf::from("/a/b/c"), 2).collect();
        assert_eq!(dirs, vec![PathBuf::from("/a/b/c"), PathBuf::from("/a/b")]);
    }

    #[test]
    fn test_load_config_walks_up_to_nearest_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("crates/store/src");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "default_policy = \"type-defaults\"\nsource_root = \"crates/store/src\"\n",
        )
        .unwrap();

        let loaded = load_config(&nested).unwrap();
        assert_eq!(loaded.path, Some(dir.path().join(CONFIG_FILE_NAME)));
        assert_eq!(loaded.config.default_policy, DefaultPolicy::TypeDefaults);
        assert_eq!(loaded.source_root(), Some(nested));
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(dir.path()).unwrap();
        // An ancestor of the temp dir could carry a config; only check shape.
        if loaded.path.is_none() {
            assert_eq!(loaded.config, Config::default());
        }
    }
}
