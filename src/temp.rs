//! Scoped temporary files and directories.
//!
//! Every artifact is registered under a scope name. [`TemporaryStorage::clean`]
//! deletes everything registered under one scope in a single call, whatever
//! happened to the operation that created the artifacts.
//!
//! [`CleanupGuard`] ties a scope to a Rust scope: the pipeline calls
//! [`CleanupGuard::finish`] on the way out, and the guard's `Drop` runs the clean
//! on every early return (and on unwinding) instead. Either way the scope is
//! cleaned exactly once.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Scoped temporary file manager.
pub trait TemporaryStorage: Send + Sync {
    /// Create an empty file. `extension` is appended as `.ext` when given.
    fn create_temporary_file(
        &self,
        scope: &str,
        prefix: &str,
        extension: Option<&str>,
    ) -> io::Result<PathBuf>;

    /// Create a directory with the given unix permissions and lifetime.
    fn create_temporary_directory(&self, mode: u32, ttl: Duration, scope: &str)
    -> io::Result<PathBuf>;

    /// Delete every artifact registered under `scope`. Unknown scopes are a no-op.
    fn clean(&self, scope: &str) -> io::Result<()>;
}

/// Generate a scope name that no other call will share.
pub fn unique_scope(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactKind {
    File,
    Directory,
}

#[derive(Debug)]
struct Artifact {
    path: PathBuf,
    kind: ArtifactKind,
    expires_at: Option<Instant>,
}

impl Artifact {
    fn remove(&self) -> io::Result<()> {
        let result = match self.kind {
            ArtifactKind::File => std::fs::remove_file(&self.path),
            ArtifactKind::Directory => std::fs::remove_dir_all(&self.path),
        };
        match result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Filesystem-backed [`TemporaryStorage`] rooted at one directory.
#[derive(Debug)]
pub struct ScopedTempFiles {
    root: PathBuf,
    scopes: Mutex<HashMap<String, Vec<Artifact>>>,
}

impl ScopedTempFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scopes: Mutex::new(HashMap::new()),
        }
    }

    /// Storage rooted at the OS temporary directory.
    pub fn in_system_temp() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of live artifacts registered under `scope`.
    pub fn artifact_count(&self, scope: &str) -> usize {
        self.lock().get(scope).map_or(0, Vec::len)
    }

    /// Remove directories whose lifetime has elapsed, in every scope.
    pub fn purge_expired(&self) -> io::Result<usize> {
        let now = Instant::now();
        let mut purged = 0;
        let mut first_error = None;
        let mut scopes = self.lock();

        for artifacts in scopes.values_mut() {
            artifacts.retain(|artifact| {
                let expired = artifact.expires_at.is_some_and(|at| at <= now);
                if !expired {
                    return true;
                }
                match artifact.remove() {
                    Ok(()) => {
                        purged += 1;
                        false
                    }
                    Err(e) => {
                        first_error.get_or_insert(e);
                        true
                    }
                }
            });
        }
        scopes.retain(|_, artifacts| !artifacts.is_empty());

        match first_error {
            Some(e) => Err(e),
            None => Ok(purged),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Artifact>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.scopes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, scope: &str, artifact: Artifact) {
        debug!(scope, path = %artifact.path.display(), "Registered temporary artifact");
        self.lock()
            .entry(scope.to_string())
            .or_default()
            .push(artifact);
    }
}

impl Default for ScopedTempFiles {
    fn default() -> Self {
        Self::in_system_temp()
    }
}

impl TemporaryStorage for ScopedTempFiles {
    fn create_temporary_file(
        &self,
        scope: &str,
        prefix: &str,
        extension: Option<&str>,
    ) -> io::Result<PathBuf> {
        let suffix = extension
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let path = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(&suffix)
            .tempfile_in(&self.root)?
            .into_temp_path()
            .keep()
            .map_err(|e| e.error)?;

        self.register(
            scope,
            Artifact {
                path: path.clone(),
                kind: ArtifactKind::File,
                expires_at: None,
            },
        );
        Ok(path)
    }

    fn create_temporary_directory(
        &self,
        mode: u32,
        ttl: Duration,
        scope: &str,
    ) -> io::Result<PathBuf> {
        let path = tempfile::Builder::new()
            .prefix("dir-")
            .tempdir_in(&self.root)?
            .keep();

        // Registered before anything else can fail, so `clean` always reaches it.
        self.register(
            scope,
            Artifact {
                path: path.clone(),
                kind: ArtifactKind::Directory,
                expires_at: Instant::now().checked_add(ttl),
            },
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(path)
    }

    fn clean(&self, scope: &str) -> io::Result<()> {
        let artifacts = self.lock().remove(scope).unwrap_or_default();
        let mut first_error = None;

        // Newest first, so files created inside a scoped directory go before it.
        for artifact in artifacts.iter().rev() {
            if let Err(e) = artifact.remove() {
                warn!(scope, path = %artifact.path.display(), error = %e, "Failed to remove temporary artifact");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Cleans a scope exactly once: explicitly through [`finish`](Self::finish), or on drop.
pub struct CleanupGuard<'a> {
    storage: &'a dyn TemporaryStorage,
    scope: String,
    cleaned: bool,
}

impl<'a> CleanupGuard<'a> {
    pub fn new(storage: &'a dyn TemporaryStorage, scope: impl Into<String>) -> Self {
        Self {
            storage,
            scope: scope.into(),
            cleaned: false,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Clean now and report the outcome.
    pub fn finish(mut self) -> io::Result<()> {
        self.cleaned = true;
        self.storage.clean(&self.scope)
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        if let Err(e) = self.storage.clean(&self.scope) {
            warn!(scope = %self.scope, error = %e, "Temporary scope cleanup failed");
        }
    }
}
