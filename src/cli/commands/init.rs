use crate::config::CONFIG_FILE_NAME;
use anyhow::{bail, Context, Result};
use std::path::Path;

pub const CONFIG_TEMPLATE: &str = r#"# mocksmith configuration

# "strict" fails on unstubbed calls; "type-defaults" returns Default::default()
# for non-throwing members whose return type has one.
default_policy = "strict"

# Path generated code uses to reach the runtime.
# runtime_path = "mocksmith::runtime"

# Header comment of generated files.
# header = "Generated by mocksmith. Do not edit."

# Glob patterns over full type paths.
include = []
exclude = []

# Directory module paths are derived from, relative to this file.
source_root = "src"
"#;

/// Write the starter configuration into `dir`.
pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() && !force {
        bail!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        );
    }
    std::fs::write(&path, CONFIG_TEMPLATE)
        .with_context(|| format!("cannot write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_template_is_a_valid_config() {
        let config = parse_config(CONFIG_TEMPLATE, Path::new(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.source_root, Some(std::path::PathBuf::from("src")));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();
        assert!(init_config(dir.path(), false).is_err());
        assert!(init_config(dir.path(), true).is_ok());
    }
}
