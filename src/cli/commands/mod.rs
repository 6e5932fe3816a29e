//! Command handlers. They own printing and exit status; the library never
//! prints.

pub mod generate;
pub mod init;

pub use generate::handle_generate_command;
pub use init::init_config;
