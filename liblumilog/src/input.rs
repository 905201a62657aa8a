use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::InputError;

/// The file-selection policy applied before anything is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFilter {
    /// Required extension, without the dot
    pub extension: String,
    /// Files smaller than this are rejected. Zero-byte files are always rejected.
    pub min_size_bytes: u64,
}

impl Default for InputFilter {
    fn default() -> Self {
        Self {
            extension: String::from("csv"),
            min_size_bytes: 1,
        }
    }
}

impl InputFilter {
    /// Check a single file against the policy, returning its size in bytes
    pub fn check_file(&self, path: &Path) -> Result<u64, InputError> {
        if !path.is_file() {
            return Err(InputError::Missing(path.to_path_buf()));
        }
        let has_extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false);
        if !has_extension {
            return Err(InputError::WrongExtension {
                path: path.to_path_buf(),
                expected: self.extension.clone(),
            });
        }
        let size = path.metadata()?.len();
        if size == 0 {
            return Err(InputError::Empty(path.to_path_buf()));
        }
        if size < self.min_size_bytes {
            return Err(InputError::TooSmall {
                path: path.to_path_buf(),
                size,
                min: self.min_size_bytes,
            });
        }
        Ok(size)
    }

    /// Resolve a configured input into the stack of files to read.
    ///
    /// A file path must pass the policy itself. A directory is expanded into every
    /// file inside it which passes the policy, sorted by name; files which fail are
    /// skipped.
    pub fn select(&self, path: &Path) -> Result<InputStack, InputError> {
        if !path.exists() {
            return Err(InputError::Missing(path.to_path_buf()));
        }
        if !path.is_dir() {
            let size = self.check_file(path)?;
            return Ok(InputStack {
                files: vec![path.to_path_buf()],
                total_size_bytes: size,
            });
        }

        let mut files: Vec<(PathBuf, u64)> = Vec::new();
        for item in path.read_dir()? {
            let item_path = item?.path();
            match self.check_file(&item_path) {
                Ok(size) => files.push((item_path, size)),
                Err(e) => spdlog::debug!("Skipping {}: {e}", item_path.to_string_lossy()),
            }
        }
        if files.is_empty() {
            return Err(InputError::NoMatchingFiles(path.to_path_buf()));
        }
        files.sort(); // File names carry the chunk order
        let total_size_bytes = files.iter().fold(0, |sum, (_, size)| sum + size);
        Ok(InputStack {
            files: files.into_iter().map(|(p, _)| p).collect(),
            total_size_bytes,
        })
    }
}

/// The ordered set of files that make up a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputStack {
    files: Vec<PathBuf>,
    total_size_bytes: u64,
}

impl InputStack {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }
}
