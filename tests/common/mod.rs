// Shared helpers for mocksmith integration tests
#![allow(dead_code)]

use mocksmith::{generate, Config, GenerateRequest, GenerationReport};
use std::fs;
use std::path::{Path, PathBuf};

/// A throwaway crate with a `src` directory.
pub struct Fixture {
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let fixture = Self { dir };
        for (path, content) in files {
            fixture.write(path, content);
        }
        fixture
    }

    pub fn src(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    pub fn out(&self) -> PathBuf {
        self.dir.path().join("mocks")
    }

    /// Write `content` at `src/<path>`.
    pub fn write(&self, path: &str, content: &str) {
        let full = self.src().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).expect("Failed to write test file");
    }

    pub fn sources(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_rs(&self.src(), &mut files);
        files.sort();
        files
    }

    pub fn request(&self, config: Config) -> GenerateRequest {
        GenerateRequest {
            sources: self.sources(),
            source_root: self.src(),
            output_dir: Some(self.out()),
            config,
        }
    }

    pub fn generate(&self) -> GenerationReport {
        generate(&self.request(Config::default())).expect("generation runs")
    }

    pub fn generated(&self, file: &str) -> String {
        fs::read_to_string(self.out().join(file)).expect("generated file exists")
    }
}

fn collect_rs(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
}

/// Generate in memory from one `lib.rs`.
pub fn generate_source(source: &str) -> GenerationReport {
    let fixture = Fixture::new(&[("lib.rs", source)]);
    let mut request = fixture.request(Config::default());
    request.output_dir = None;
    generate(&request).expect("generation runs")
}
