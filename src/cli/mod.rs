//! Command-line front end of mocksmith.
//!
//! - Argument parsing (`args`)
//! - Command handlers (`commands`)
//! - Runtime setup and configuration layering (`setup`)

pub mod args;
pub mod commands;
pub mod setup;

pub use args::{Cli, Commands, GenerateArgs, PolicyArg, ReportFormat};
pub use commands::{handle_generate_command, init_config};
pub use setup::configure_thread_pool;
