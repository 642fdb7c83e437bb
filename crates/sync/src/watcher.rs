//! Filesystem notifications for the vault, translated into queue events.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::local::{LocalStore, VaultDir};
use crate::queue::{FileEvent, FileEventKind, SyncQueue};

/// Keeps the OS watch alive; dropping it stops event delivery.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
}

/// Watches `vault` recursively and feeds candidate events into `queue`.
pub fn watch_vault(vault: VaultDir, queue: SyncQueue) -> Result<VaultWatcher, SyncError> {
    let root = vault.root().to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for file_event in file_events(&event, &vault) {
                    debug!(path = %file_event.path, kind = ?file_event.kind, "vault change");
                    if !queue.enqueue(file_event) {
                        warn!("sync worker stopped; dropping vault change");
                    }
                }
            }
            Err(err) => warn!(error = %err, "vault watcher error"),
        },
        Config::default(),
    )
    .map_err(|err| SyncError::Watch(err.to_string()))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|err| SyncError::Watch(format!("{}: {err}", root.display())))?;
    info!(root = %root.display(), "watching vault");

    Ok(VaultWatcher { _watcher: watcher })
}

/// Queue events for one notification, limited to syncable documents.
///
/// A rename is a delete of the old path and a create of the new one.
/// Metadata-only and access notifications produce nothing.
pub fn file_events(event: &Event, vault: &VaultDir) -> Vec<FileEvent> {
    let kinds: Vec<FileEventKind> = match event.kind {
        EventKind::Create(_) => vec![FileEventKind::Created],
        EventKind::Remove(_) => vec![FileEventKind::Deleted],
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![FileEventKind::Deleted],
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![FileEventKind::Created],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            vec![FileEventKind::Deleted, FileEventKind::Created]
        }
        EventKind::Modify(_) => vec![FileEventKind::Modified],
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .enumerate()
        .filter_map(|(index, path)| {
            // Single-kind events apply to every path.
            let kind = kinds.get(index).or(kinds.first()).copied()?;
            let relative = vault.relative_path(path)?;
            vault
                .is_candidate(&relative)
                .then(|| FileEvent::new(relative, kind))
        })
        .collect()
}
