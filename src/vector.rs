//! Vector-to-raster conversion for illustration formats.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Vector-to-raster converter.
pub trait VectorRasterizer: Send + Sync {
    /// Render the first page of `source` into the raster file `dest`.
    fn to_image(&self, source: &Path, dest: &Path) -> Result<(), ConversionError>;
}

/// Renders through Ghostscript's `png16m` device.
#[derive(Debug, Clone)]
pub struct GhostscriptRasterizer {
    binary: PathBuf,
    resolution: u32,
}

impl GhostscriptRasterizer {
    pub fn new(binary: impl Into<PathBuf>, resolution: u32) -> Self {
        Self {
            binary: binary.into(),
            resolution,
        }
    }

    fn args(&self, source: &Path, dest: &Path) -> Vec<String> {
        vec![
            "-dSAFER".to_string(),
            "-dBATCH".to_string(),
            "-dNOPAUSE".to_string(),
            "-sDEVICE=png16m".to_string(),
            format!("-r{}", self.resolution),
            "-dFirstPage=1".to_string(),
            "-dLastPage=1".to_string(),
            format!("-sOutputFile={}", dest.display()),
            source.display().to_string(),
        ]
    }
}

impl Default for GhostscriptRasterizer {
    fn default() -> Self {
        Self::new("gs", 300)
    }
}

impl VectorRasterizer for GhostscriptRasterizer {
    fn to_image(&self, source: &Path, dest: &Path) -> Result<(), ConversionError> {
        let args = self.args(source, dest);
        debug!(program = %self.binary.display(), ?args, "Rasterizing vector source");

        let output = Command::new(&self.binary).args(&args).output()?;
        if !output.status.success() {
            return Err(ConversionError::Failed {
                program: self.binary.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
