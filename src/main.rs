use anyhow::Result;
use clap::Parser;
use mocksmith::cli::{handle_generate_command, init_config, Cli, Commands};
use mocksmith::observability::{init_logging, install_panic_hook};
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    install_panic_hook();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Generate(args) => handle_generate_command(args),
        Commands::Init { force } => {
            let cwd = std::env::current_dir()?;
            init_config(&cwd, force)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
