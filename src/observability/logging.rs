//! `tracing` subscriber for the binary.
//!
//! The library only emits events; installing a subscriber is left to
//! `main`. `MOCKSMITH_LOG` takes `EnvFilter` directives and wins over the
//! verbosity flag.

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "MOCKSMITH_LOG";

/// Filter directive for `-v` counts: warn, info, debug, trace.
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber once; later calls are ignored.
pub fn init_logging(verbosity: u8) {
    static INITIALISED: OnceLock<()> = OnceLock::new();

    INITIALISED.get_or_init(|| {
        let use_ansi = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));
        let subscriber = fmt::fmt()
            .with_env_filter(filter)
            .with_ansi(use_ansi)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(1), "info");
        assert_eq!(level_for_verbosity(2), "debug");
        assert_eq!(level_for_verbosity(7), "trace");
    }
}
