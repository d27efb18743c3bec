//! Filesystem fixtures shared by cache and store suites.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Scratch directory holding a settings cache file path.
///
/// The file itself is not created; the directory is removed on drop.
pub struct CacheFixture {
    dir: TempDir,
    path: PathBuf,
}

impl CacheFixture {
    /// Allocate a fresh directory with a `settings.json` path inside it.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("dotset-cache-")
            .tempdir()
            .context("failed to create cache fixture directory")?;
        let path = dir.path().join("settings.json");
        Ok(Self { dir, path })
    }

    /// Path of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of an arbitrary file inside the fixture directory.
    #[must_use]
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Current contents of the cache file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn contents(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Remove the cache file, ignoring a file that is already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                Err(err).with_context(|| format!("failed to remove {}", self.path.display()))
            }
            _ => Ok(()),
        }
    }

    /// Write a file inside the fixture directory and return its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_sibling(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.sibling(name);
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
