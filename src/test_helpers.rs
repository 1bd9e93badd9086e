//! Shared mock collaborators for the transmuter test suite.
//!
//! The raster engine mock lives next to its trait in
//! [`imaging::backend::tests`](crate::imaging::backend::tests); everything else
//! the pipeline talks to is mocked here. All mocks record what they were asked
//! to do behind a `Mutex`, so they satisfy the `Send + Sync` bounds.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let identifier = MockIdentifier::new();
//! let rasterizer = MockRasterizer::writes_nothing();
//! let temp = CountingStorage::new();
//! // ... run the pipeline ...
//! assert_eq!(temp.cleans().len(), 1);
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::imaging::backend::tests::MockSource;
use crate::media::{IdentifyError, MediaIdentifier, MediaKind, SourceMedia};
use crate::preview::{ExtractError, FileEntry, PreviewExtractor, list_directory};
use crate::temp::{ScopedTempFiles, TemporaryStorage};
use crate::vector::{ConversionError, VectorRasterizer};

// =========================================================================
// Identifier
// =========================================================================

/// MIME for a file extension, the way a sniffing service would report it.
pub fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "psd" => "image/vnd.adobe.photoshop",
        "ai" => "application/illustrator",
        "eps" => "application/postscript",
        _ => return None,
    })
}

/// Identifier answering from the file extension.
#[derive(Default)]
pub struct MockIdentifier {
    fail: bool,
    /// Reported kind; [`MediaKind::Image`] when unset.
    kind: Option<MediaKind>,
    identified: Mutex<Vec<PathBuf>>,
}

impl MockIdentifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every known extension identifies as `kind`.
    pub fn with_kind(kind: MediaKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Paths identified so far, in call order.
    pub fn identified(&self) -> Vec<PathBuf> {
        self.identified.lock().unwrap().clone()
    }
}

impl MediaIdentifier for MockIdentifier {
    fn identify(&self, path: &Path) -> Result<SourceMedia, IdentifyError> {
        self.identified.lock().unwrap().push(path.to_path_buf());

        let unidentifiable = |reason: &str| IdentifyError::Unidentifiable {
            path: path.to_path_buf(),
            reason: reason.into(),
        };
        if self.fail {
            return Err(unidentifiable("mock failure"));
        }
        mime_for_extension(path)
            .map(|mime| SourceMedia::new(path, mime, self.kind.unwrap_or(MediaKind::Image)))
            .ok_or_else(|| unidentifiable("unknown extension"))
    }
}

// =========================================================================
// Vector rasterizer
// =========================================================================

enum RasterizerBehavior {
    Write,
    WriteNothing,
    Fail,
}

/// Rasterizer that writes a placeholder, writes nothing, or fails.
pub struct MockRasterizer {
    behavior: RasterizerBehavior,
    /// Output paths get registered here so a mock engine can open them.
    register: Option<(Arc<Mutex<HashMap<PathBuf, MockSource>>>, MockSource)>,
    calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl MockRasterizer {
    fn with_behavior(behavior: RasterizerBehavior) -> Self {
        Self {
            behavior,
            register: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn writes_output() -> Self {
        Self::with_behavior(RasterizerBehavior::Write)
    }

    /// Exits cleanly without creating any output.
    pub fn writes_nothing() -> Self {
        Self::with_behavior(RasterizerBehavior::WriteNothing)
    }

    pub fn fails() -> Self {
        Self::with_behavior(RasterizerBehavior::Fail)
    }

    /// Make every written output openable through the mock engine owning `sources`.
    pub fn registering(
        mut self,
        sources: &Arc<Mutex<HashMap<PathBuf, MockSource>>>,
        source: MockSource,
    ) -> Self {
        self.register = Some((Arc::clone(sources), source));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl VectorRasterizer for MockRasterizer {
    fn to_image(&self, source: &Path, dest: &Path) -> Result<(), ConversionError> {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_path_buf(), dest.to_path_buf()));

        match self.behavior {
            RasterizerBehavior::Write => {
                std::fs::write(dest, b"rasterized")?;
                if let Some((sources, source)) = &self.register {
                    sources
                        .lock()
                        .unwrap()
                        .insert(dest.to_path_buf(), source.clone());
                }
                Ok(())
            }
            RasterizerBehavior::WriteNothing => Ok(()),
            RasterizerBehavior::Fail => Err(ConversionError::Io(io::Error::other("gs crashed"))),
        }
    }
}

// =========================================================================
// Preview extractor
// =========================================================================

/// Extractor that writes files of given sizes into the destination directory.
pub struct MockExtractor {
    files: Vec<(&'static str, usize)>,
    fail: bool,
    calls: Mutex<usize>,
}

impl MockExtractor {
    pub fn with_files(files: Vec<(&'static str, usize)>) -> Self {
        Self {
            files,
            fail: false,
            calls: Mutex::new(0),
        }
    }

    pub fn fails() -> Self {
        Self {
            fail: true,
            ..Self::with_files(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl PreviewExtractor for MockExtractor {
    fn extract(&self, _source: &Path, dest_dir: &Path) -> Result<Vec<FileEntry>, ExtractError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(ExtractError::Io(io::Error::other("exiftool crashed")));
        }
        for (name, size) in &self.files {
            std::fs::write(dest_dir.join(name), vec![0u8; *size])?;
        }
        list_directory(dest_dir)
    }
}

// =========================================================================
// Temporary storage
// =========================================================================

/// Real scoped storage in a private temp root, with every call counted.
pub struct CountingStorage {
    inner: ScopedTempFiles,
    fail: bool,
    files: Mutex<Vec<(String, Option<String>)>>,
    directories: Mutex<usize>,
    cleans: Mutex<Vec<String>>,
    _root: TempDir,
}

impl CountingStorage {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        Self {
            inner: ScopedTempFiles::new(root.path()),
            fail: false,
            files: Mutex::new(Vec::new()),
            directories: Mutex::new(0),
            cleans: Mutex::new(Vec::new()),
            _root: root,
        }
    }

    /// Creation always fails; `clean` still works.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn root(&self) -> &Path {
        self.inner.root()
    }

    /// Files and directories created.
    pub fn created(&self) -> usize {
        self.files.lock().unwrap().len() + self.directories()
    }

    pub fn directories(&self) -> usize {
        *self.directories.lock().unwrap()
    }

    pub fn prefixes(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .map(|(prefix, _)| prefix.clone())
            .collect()
    }

    pub fn extensions(&self) -> Vec<Option<String>> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .map(|(_, ext)| ext.clone())
            .collect()
    }

    /// Scopes cleaned, in call order.
    pub fn cleans(&self) -> Vec<String> {
        self.cleans.lock().unwrap().clone()
    }

    /// Whether anything is left on disk under the root.
    pub fn is_empty_on_disk(&self) -> bool {
        std::fs::read_dir(self.root())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

impl TemporaryStorage for CountingStorage {
    fn create_temporary_file(
        &self,
        scope: &str,
        prefix: &str,
        extension: Option<&str>,
    ) -> io::Result<PathBuf> {
        if self.fail {
            return Err(io::Error::other("disk full"));
        }
        self.files
            .lock()
            .unwrap()
            .push((prefix.to_string(), extension.map(str::to_string)));
        self.inner.create_temporary_file(scope, prefix, extension)
    }

    fn create_temporary_directory(
        &self,
        mode: u32,
        ttl: Duration,
        scope: &str,
    ) -> io::Result<PathBuf> {
        if self.fail {
            return Err(io::Error::other("disk full"));
        }
        *self.directories.lock().unwrap() += 1;
        self.inner.create_temporary_directory(mode, ttl, scope)
    }

    fn clean(&self, scope: &str) -> io::Result<()> {
        self.cleans.lock().unwrap().push(scope.to_string());
        self.inner.clean(scope)
    }
}
