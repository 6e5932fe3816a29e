//! `.mocksmith.toml` configuration.
//!
//! The file is looked up from the working directory upwards. Command-line
//! flags override whatever it sets.

mod core;
mod loader;

pub use core::Config;
pub use loader::{
    directory_ancestors, find_config, load_config, load_config_file, parse_config, LoadedConfig,
    CONFIG_FILE_NAME,
};
