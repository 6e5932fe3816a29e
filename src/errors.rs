//! Crate-level error type.
//!
//! Problems with individual declarations are [`Diagnostic`](crate::diagnostics::Diagnostic)s
//! and never abort a run. This type covers what does: unreadable inputs,
//! bad configuration, and an output directory that cannot be written.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// File system errors with the path involved.
    #[error("File system error at {}: {message}", path.display())]
    FileSystem {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file errors
    #[error("Configuration error in {}: {message}", path.display())]
    Config { message: String, path: PathBuf },

    /// Invalid option values, from the config file or the command line.
    #[error("Invalid option `{option}`: {message}")]
    InvalidOption { option: String, message: String },

    /// The output directory overlaps the analyzed sources in a way that
    /// would make generated files feed back into the next run.
    #[error("Output directory {} is not usable: {message}", path.display())]
    OutputDirectory { message: String, path: PathBuf },

    #[error(transparent)]
    Walk(#[from] ignore::Error),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    pub fn file_system(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            message: message.into(),
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Config {
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn invalid_option(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Attach a path to raw I/O errors.
pub trait IoResultExt<T> {
    fn with_path(self, message: &str, path: &std::path::Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, message: &str, path: &std::path::Path) -> Result<T> {
        self.map_err(|source| Error::file_system(message, path, source))
    }
}
