//! Embedded preview extraction.
//!
//! Raw camera files and some editing-tool documents carry full-size JPEG
//! previews that decode far better than the container itself. An extractor dumps
//! every embedded preview into a directory; [`select_largest`] then picks the
//! biggest file.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to list extracted previews: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// One entry found in the extraction directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub is_dir: bool,
    /// `.` / `..` or the extraction directory itself.
    pub is_dot: bool,
}

impl FileEntry {
    pub fn file(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            is_dir: false,
            is_dot: false,
        }
    }
}

/// Embedded-preview extractor.
pub trait PreviewExtractor: Send + Sync {
    /// Extract every embedded preview of `source` into `dest_dir`.
    fn extract(&self, source: &Path, dest_dir: &Path) -> Result<Vec<FileEntry>, ExtractError>;
}

/// Pick the largest regular file. Ties keep the first one encountered.
pub fn select_largest(entries: &[FileEntry]) -> Option<&FileEntry> {
    entries
        .iter()
        .filter(|entry| !entry.is_dir && !entry.is_dot)
        .fold(None, |best: Option<&FileEntry>, entry| match best {
            Some(current) if entry.size <= current.size => Some(current),
            _ => Some(entry),
        })
}

/// List `dir` one level deep, the directory itself flagged as a dot entry.
pub fn list_directory(dir: &Path) -> Result<Vec<FileEntry>, ExtractError> {
    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(dir).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let metadata = entry.metadata()?;
        entries.push(FileEntry {
            path: entry.path().to_path_buf(),
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            is_dot: entry.depth() == 0,
        });
    }
    Ok(entries)
}

/// Extracts previews by running `exiftool`.
#[derive(Debug, Clone)]
pub struct ExiftoolExtractor {
    binary: PathBuf,
}

impl ExiftoolExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for ExiftoolExtractor {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

impl PreviewExtractor for ExiftoolExtractor {
    fn extract(&self, source: &Path, dest_dir: &Path) -> Result<Vec<FileEntry>, ExtractError> {
        // %t = tag name, %-c = copy number on collision, %s = suggested extension
        let pattern = dest_dir.join("%t%-c.%s");
        let output = Command::new(&self.binary)
            .arg("-q")
            .arg("-a")
            .arg("-b")
            .arg("-W")
            .arg(&pattern)
            .arg("-preview:all")
            .arg(source)
            .output()?;

        if !output.status.success() {
            return Err(ExtractError::Failed {
                program: self.binary.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let entries = list_directory(dest_dir)?;
        debug!(
            source = %source.display(),
            count = entries.iter().filter(|e| !e.is_dir).count(),
            "Extracted embedded previews"
        );
        Ok(entries)
    }
}
