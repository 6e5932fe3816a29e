use crate::runtime::DefaultPolicy;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mocksmith")]
#[command(about = "Generate mocks for Rust traits and structs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); MOCKSMITH_LOG wins
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze sources and write mocks
    Generate(GenerateArgs),

    /// Write a starter .mocksmith.toml in the current directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Source files or directories to analyze
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory generated files are written to
    #[arg(short, long, required_unless_present = "dry_run")]
    pub output: Option<PathBuf>,

    /// Render and report without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Directory module paths are derived from (defaults to the config
    /// value, then the first input directory)
    #[arg(long)]
    pub source_root: Option<PathBuf>,

    /// Configuration file (defaults to the nearest .mocksmith.toml)
    #[arg(short, long, env = "MOCKSMITH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Behavior of unstubbed members in generated mocks
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Path generated code uses to reach the runtime
    #[arg(long)]
    pub runtime_path: Option<String>,

    /// Header comment of generated files
    #[arg(long)]
    pub header: Option<String>,

    /// Only mock types whose full path matches (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Skip types whose full path matches (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Skip source files whose path matches (repeatable)
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Number of worker threads (0 = one per CPU)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    pub format: ReportFormat,

    /// Exit with an error status when warnings were reported
    #[arg(long)]
    pub deny_warnings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Unstubbed members fail the test
    Strict,
    /// Unstubbed members return `Default::default()` where possible
    TypeDefaults,
}

impl From<PolicyArg> for DefaultPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Strict => DefaultPolicy::Strict,
            PolicyArg::TypeDefaults => DefaultPolicy::TypeDefaults,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable diagnostics on stderr
    Text,
    /// JSON report on stdout
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "mocksmith",
            "-vv",
            "generate",
            "src",
            "-o",
            "tests/mocks",
            "--policy",
            "type-defaults",
            "--exclude",
            "crate::internal::*",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.inputs, vec![PathBuf::from("src")]);
        assert_eq!(args.output, Some(PathBuf::from("tests/mocks")));
        assert_eq!(args.policy, Some(PolicyArg::TypeDefaults));
        assert_eq!(args.exclude, vec!["crate::internal::*"]);
    }

    #[test]
    fn test_output_required_unless_dry_run() {
        assert!(Cli::try_parse_from(["mocksmith", "generate", "src"]).is_err());
        assert!(Cli::try_parse_from(["mocksmith", "generate", "src", "--dry-run"]).is_ok());
    }
}
