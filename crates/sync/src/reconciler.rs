//! Mirrors vault documents into the remote source.
//!
//! A full pass compares every local document against the remote listing and
//! uploads only what is missing or stale.  Single-file events skip the
//! comparison: a change always replaces, a deletion always deletes.
//! Remote records without a local counterpart are left alone during a full
//! pass.

use std::collections::HashMap;
use std::sync::Arc;

use lettavault_remote::{RemoteClient, RemoteError, RemoteFileRecord};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::local::{LocalFileRecord, LocalStore};
use crate::path_codec;
use crate::rate_limit::UploadRateLimiter;

/// What a full pass does with one local document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    /// No remote record yet.
    Upload,
    /// The remote record is current.
    Skip,
    /// Delete every listed record, then upload.
    Replace { stale_ids: Vec<String> },
}

/// Decides how a full pass treats `local`, given the remote records that
/// carry its encoded name.
///
/// The remote copy is current when exactly one record exists, its size
/// matches and the local document is not newer than it.  A server that
/// reports no timestamp is judged on size alone.
pub fn plan(local: &LocalFileRecord, existing: &[&RemoteFileRecord]) -> FileAction {
    match existing {
        [] => FileAction::Upload,
        [remote] if is_current(local, remote) => FileAction::Skip,
        records => FileAction::Replace {
            stale_ids: records.iter().map(|record| record.id.clone()).collect(),
        },
    }
}

fn is_current(local: &LocalFileRecord, remote: &RemoteFileRecord) -> bool {
    if remote.byte_size != Some(local.byte_size) {
        return false;
    }
    match remote.last_modified() {
        Some(remote_modified) => local.modified_at <= remote_modified,
        None => true,
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: String,
    pub error: SyncError,
}

/// Outcome of one full pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: Vec<FileFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Reconciler {
    client: Arc<dyn RemoteClient>,
    store: Arc<dyn LocalStore>,
    limiter: Option<Arc<UploadRateLimiter>>,
}

impl Reconciler {
    pub fn new(client: Arc<dyn RemoteClient>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            client,
            store,
            limiter: None,
        }
    }

    /// Every upload this reconciler makes waits on `limiter` first.
    pub fn with_rate_limit(mut self, limiter: Arc<UploadRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// Lists the store, then reconciles everything in it.
    pub async fn full_sync(&self, source_id: &str) -> Result<ReconcileReport, SyncError> {
        let local_files = self.store.list().await?;
        self.full_reconcile(&local_files, source_id).await
    }

    /// Brings the remote source up to date with `local_files`.
    ///
    /// Fails only when the remote listing cannot be fetched.  Per-file
    /// failures are collected in the report and the pass continues.
    pub async fn full_reconcile(
        &self,
        local_files: &[LocalFileRecord],
        source_id: &str,
    ) -> Result<ReconcileReport, SyncError> {
        let remote_files = self.client.list_files(source_id).await?;
        let mut by_name: HashMap<&str, Vec<&RemoteFileRecord>> = HashMap::new();
        for record in &remote_files {
            by_name
                .entry(record.encoded_name.as_str())
                .or_default()
                .push(record);
        }

        let mut report = ReconcileReport::default();
        for file in local_files {
            let name = path_codec::encode(&file.path);
            let existing = by_name.get(name.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let action = plan(file, existing);
            debug!(path = %file.path, ?action, "planned");

            let result = match &action {
                FileAction::Skip => {
                    report.skipped += 1;
                    continue;
                }
                FileAction::Upload => self.upload(file, &name, source_id).await,
                FileAction::Replace { stale_ids } => {
                    self.replace(file, &name, stale_ids, source_id).await
                }
            };
            match result {
                Ok(()) => report.uploaded += 1,
                Err(error) => {
                    warn!(path = %file.path, error = %error, "file sync failed");
                    report.failed.push(FileFailure {
                        path: file.path.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            uploaded = report.uploaded,
            skipped = report.skipped,
            failed = report.failed.len(),
            "full reconcile finished"
        );
        Ok(report)
    }

    /// Replaces whatever the remote holds for `file` with its current
    /// content, without comparing sizes or timestamps.
    pub async fn on_file_changed(
        &self,
        file: &LocalFileRecord,
        source_id: &str,
    ) -> Result<(), SyncError> {
        let name = path_codec::encode(&file.path);
        let stale_ids = self
            .matching_records(&name, source_id)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect::<Vec<_>>();
        self.replace(file, &name, &stale_ids, source_id).await
    }

    /// Deletes every remote record for `path`.  Returns how many were
    /// removed; zero is not an error.
    pub async fn on_file_deleted(&self, path: &str, source_id: &str) -> Result<usize, SyncError> {
        let name = path_codec::encode(path);
        let records = self.matching_records(&name, source_id).await?;
        for record in &records {
            self.delete(source_id, &record.id).await?;
        }
        if !records.is_empty() {
            info!(path, removed = records.len(), "removed remote copy");
        }
        Ok(records.len())
    }

    /// Force-uploads one vault document on request.
    pub async fn sync_file(&self, path: &str, source_id: &str) -> Result<(), SyncError> {
        if !self.store.is_candidate(path) {
            return Err(SyncError::NotSyncable(path.to_string()));
        }
        let file = self
            .store
            .stat(path)
            .await?
            .ok_or_else(|| SyncError::NotSyncable(path.to_string()))?;
        self.on_file_changed(&file, source_id).await
    }

    /// The remote record currently mirroring `path`.
    pub async fn remote_file(
        &self,
        path: &str,
        source_id: &str,
    ) -> Result<RemoteFileRecord, SyncError> {
        let name = path_codec::encode(path);
        self.matching_records(&name, source_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::NotUploaded(path.to_string()))
    }

    async fn matching_records(
        &self,
        encoded_name: &str,
        source_id: &str,
    ) -> Result<Vec<RemoteFileRecord>, SyncError> {
        Ok(self
            .client
            .list_files(source_id)
            .await?
            .into_iter()
            .filter(|record| record.encoded_name == encoded_name)
            .collect())
    }

    /// Deletes first so that a failed delete never leaves two copies behind.
    async fn replace(
        &self,
        file: &LocalFileRecord,
        encoded_name: &str,
        stale_ids: &[String],
        source_id: &str,
    ) -> Result<(), SyncError> {
        for id in stale_ids {
            self.delete(source_id, id).await?;
        }
        self.upload(file, encoded_name, source_id).await
    }

    async fn delete(&self, source_id: &str, file_id: &str) -> Result<(), SyncError> {
        match self.client.delete_file(source_id, file_id).await {
            Ok(()) | Err(RemoteError::NotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn upload(
        &self,
        file: &LocalFileRecord,
        encoded_name: &str,
        source_id: &str,
    ) -> Result<(), SyncError> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        let content = self.store.read(&file.path).await?;
        self.client
            .upload_file(source_id, encoded_name, content)
            .await?;
        info!(path = %file.path, name = encoded_name, "uploaded");
        Ok(())
    }
}
