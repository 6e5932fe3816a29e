//! Runtime setup for the binary: thread pool and effective configuration.

use super::args::GenerateArgs;
use crate::config::{load_config, load_config_file, LoadedConfig};
use crate::errors::Result;
use std::path::{Path, PathBuf};

/// Rayon thread stack size (8MB for deeply nested ASTs)
const RAYON_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Configure the global rayon pool once at startup. `0` means one per CPU.
pub fn configure_thread_pool(jobs: usize) {
    let mut builder = rayon::ThreadPoolBuilder::new().stack_size(RAYON_STACK_SIZE);
    if jobs > 0 {
        builder = builder.num_threads(jobs);
    }
    if let Err(error) = builder.build_global() {
        tracing::debug!("thread pool already configured: {}", error);
    }
}

/// Config file named on the command line, or the nearest one above `cwd`.
pub fn resolve_config(args: &GenerateArgs, cwd: &Path) -> Result<LoadedConfig> {
    match &args.config {
        Some(path) => Ok(LoadedConfig {
            config: load_config_file(path)?,
            path: Some(path.clone()),
        }),
        None => load_config(cwd),
    }
}

/// Apply command-line flags on top of the file configuration.
pub fn apply_overrides(loaded: &mut LoadedConfig, args: &GenerateArgs) {
    let config = &mut loaded.config;
    if let Some(policy) = args.policy {
        config.default_policy = policy.into();
    }
    if let Some(runtime_path) = &args.runtime_path {
        config.runtime_path = Some(runtime_path.clone());
    }
    if let Some(header) = &args.header {
        config.header = Some(header.clone());
    }
    config.include.extend(args.include.iter().cloned());
    config.exclude.extend(args.exclude.iter().cloned());
    if args.jobs > 0 {
        config.jobs = Some(args.jobs);
    }
}

/// `--source-root`, then the config value, then the first input directory
/// (or the parent of the first input file).
pub fn resolve_source_root(args: &GenerateArgs, loaded: &LoadedConfig) -> PathBuf {
    if let Some(root) = &args.source_root {
        return root.clone();
    }
    if let Some(root) = loaded.source_root() {
        return root;
    }
    match args.inputs.first() {
        Some(input) if input.is_dir() => input.clone(),
        Some(input) => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
        None => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use crate::runtime::DefaultPolicy;
    use clap::Parser;

    fn generate_args(argv: &[&str]) -> GenerateArgs {
        let mut full = vec!["mocksmith", "generate"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Generate(args) => args,
            Commands::Init { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_flags_override_file_values() {
        let mut loaded = LoadedConfig::default();
        loaded.config.include = vec!["crate::a::*".to_string()];
        let args = generate_args(&[
            "src",
            "--dry-run",
            "--policy",
            "type-defaults",
            "--include",
            "crate::b::*",
            "-j",
            "3",
        ]);
        apply_overrides(&mut loaded, &args);
        assert_eq!(loaded.config.default_policy, DefaultPolicy::TypeDefaults);
        assert_eq!(loaded.config.include, vec!["crate::a::*", "crate::b::*"]);
        assert_eq!(loaded.config.jobs, Some(3));
    }

    #[test]
    fn test_source_root_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().to_string_lossy().into_owned();
        let args = generate_args(&[input.as_str(), "--dry-run"]);
        let loaded = LoadedConfig::default();
        assert_eq!(resolve_source_root(&args, &loaded), dir.path());

        let args = generate_args(&[input.as_str(), "--dry-run", "--source-root", "crate/src"]);
        assert_eq!(resolve_source_root(&args, &loaded), PathBuf::from("crate/src"));
    }
}
