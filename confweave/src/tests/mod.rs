//! Import engine behaviour across several sources

pub mod merge_order;
pub mod nested_imports;
pub mod robust_loading;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory of configuration files
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, text).unwrap();
        path
    }
}
