//! Test environment utilities for integration testing

#![allow(dead_code)] // Not every test binary uses every helper

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory of configuration files
pub struct TestEnvironment {
    dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `text` to `name`, creating parent directories
    pub fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, text).expect("Failed to write config file");
        path
    }
}
