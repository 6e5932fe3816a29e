use crate::errors::{Error, Result};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Expands input paths into the Rust source files under them.
pub struct FileWalker {
    roots: Vec<PathBuf>,
    skip_dirs: Vec<PathBuf>,
    ignore_patterns: Vec<glob::Pattern>,
}

impl FileWalker {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            skip_dirs: Vec::new(),
            ignore_patterns: Vec::new(),
        }
    }

    /// Never descend into `dir`, typically the output directory.
    pub fn skip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skip_dirs.push(dir.into());
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: &[String]) -> Result<Self> {
        for pattern in patterns {
            self.ignore_patterns.push(glob::Pattern::new(pattern)?);
        }
        Ok(self)
    }

    /// Sorted, deduplicated `.rs` files. Honors `.gitignore`.
    pub fn walk(&self) -> Result<Vec<PathBuf>> {
        let mut files = BTreeSet::new();
        for root in &self.roots {
            if root.is_file() {
                if self.should_process(root) {
                    files.insert(root.clone());
                }
                continue;
            }
            if !root.is_dir() {
                return Err(Error::file_system(
                    "input does not exist",
                    root,
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ));
            }

            let skip_dirs = self.skip_dirs.clone();
            let walker = WalkBuilder::new(root)
                .hidden(false)
                .git_ignore(true)
                .filter_entry(move |entry| !skip_dirs.iter().any(|dir| entry.path() == dir))
                .build();
            for entry in walker {
                let entry = entry?;
                let path = entry.path();
                if path.is_file() && self.should_process(path) {
                    files.insert(path.to_path_buf());
                }
            }
        }
        tracing::debug!(files = files.len(), "discovered source files");
        Ok(files.into_iter().collect())
    }

    fn should_process(&self, path: &Path) -> bool {
        if path.extension().is_none_or(|ext| ext != "rs") {
            return false;
        }
        let path_str = path.to_string_lossy();
        !self
            .ignore_patterns
            .iter()
            .any(|pattern| pattern.matches(&path_str))
    }
}
