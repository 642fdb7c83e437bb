//! The local side of reconciliation: a directory of vault documents.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use lettavault_config::SyncConfig;
use walkdir::WalkDir;

use crate::error::SyncError;

/// A vault document as seen at the moment it was listed.  Never cached
/// across passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRecord {
    /// Vault-relative, `/`-separated.
    pub path: String,
    pub byte_size: u64,
    pub modified_at: DateTime<Utc>,
}

/// Enumerates and reads the documents that are mirrored remotely.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn list(&self) -> Result<Vec<LocalFileRecord>, SyncError>;

    /// `None` when the file no longer exists.
    async fn stat(&self, path: &str) -> Result<Option<LocalFileRecord>, SyncError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, SyncError>;

    /// Whether `path` would be included by [`LocalStore::list`].
    fn is_candidate(&self, path: &str) -> bool;
}

/// A vault rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct VaultDir {
    root: PathBuf,
    extensions: Vec<String>,
    ignore: GlobSet,
}

impl VaultDir {
    pub fn new(
        root: impl Into<PathBuf>,
        extensions: &[String],
        ignore: &[String],
    ) -> Result<Self, SyncError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in ignore {
            let glob = Glob::new(pattern).map_err(|err| SyncError::Pattern {
                pattern: pattern.clone(),
                message: err.to_string(),
            })?;
            builder.add(glob);
        }
        let ignore = builder.build().map_err(|err| SyncError::Pattern {
            pattern: ignore.join(", "),
            message: err.to_string(),
        })?;

        // Watch events carry resolved absolute paths; a missing root is kept
        // as given and fails later on first use.
        let root = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);

        Ok(Self {
            root,
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            ignore,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        Self::new(&config.vault_path, &config.extensions, &config.ignore)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Vault-relative form of an absolute path under the root.
    pub fn relative_path(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let parts = relative
            .components()
            .map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        (!parts.is_empty()).then(|| parts.join("/"))
    }

    fn absolute(&self, path: &str) -> Result<PathBuf, SyncError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if escapes || path.is_empty() {
            return Err(SyncError::NotSyncable(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn record(&self, path: String, metadata: &std::fs::Metadata) -> Result<LocalFileRecord, SyncError> {
        let modified = metadata
            .modified()
            .map_err(|err| SyncError::io(path.clone(), err))?;
        Ok(LocalFileRecord {
            byte_size: metadata.len(),
            modified_at: DateTime::<Utc>::from(modified),
            path,
        })
    }

    fn list_blocking(&self) -> Result<Vec<LocalFileRecord>, SyncError> {
        let mut records = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| self.root.display().to_string());
                SyncError::io(path, err.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(path) = self.relative_path(entry.path()) else {
                continue;
            };
            if !self.is_candidate(&path) {
                continue;
            }
            let metadata = entry
                .metadata()
                .map_err(|err| SyncError::io(path.clone(), err.into()))?;
            records.push(self.record(path, &metadata)?);
        }
        records.sort_by(|left, right| left.path.cmp(&right.path));
        Ok(records)
    }
}

#[async_trait]
impl LocalStore for VaultDir {
    async fn list(&self) -> Result<Vec<LocalFileRecord>, SyncError> {
        let vault = self.clone();
        tokio::task::spawn_blocking(move || vault.list_blocking())
            .await
            .map_err(|err| SyncError::io(self.root.display().to_string(), std::io::Error::other(err)))?
    }

    async fn stat(&self, path: &str) -> Result<Option<LocalFileRecord>, SyncError> {
        let absolute = self.absolute(path)?;
        match tokio::fs::metadata(&absolute).await {
            Ok(metadata) if metadata.is_file() => self.record(path.to_string(), &metadata).map(Some),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SyncError::io(path, err)),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, SyncError> {
        let absolute = self.absolute(path)?;
        tokio::fs::read(&absolute)
            .await
            .map_err(|err| SyncError::io(path, err))
    }

    fn is_candidate(&self, path: &str) -> bool {
        if self.ignore.is_match(path) {
            return false;
        }
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}
