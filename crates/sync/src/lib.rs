//! Keeps a vault directory mirrored into a remote knowledge source and
//! bound to an agent.
//!
//! [`Bootstrapper`] resolves the source and agent into a [`Session`],
//! [`Reconciler`] mirrors documents, the queue and watcher drive it in the
//! background, and [`BlockResolver`] edits the agent's memory blocks.

pub mod blocks;
pub mod bootstrap;
pub mod error;
pub mod local;
pub mod path_codec;
pub mod prompt;
pub mod queue;
pub mod rate_limit;
pub mod reconciler;
pub mod session;
pub mod watcher;

#[cfg(test)]
mod mock;

pub use blocks::{BlockEditor, BlockResolver, SaveOutcome};
pub use bootstrap::{
    BackoffPolicy, BootstrapState, Bootstrapper, ConsentPolicy, DEFAULT_MAX_ATTEMPTS,
};
pub use error::{BlockError, ConnectError, SyncError};
pub use local::{LocalFileRecord, LocalStore, VaultDir};
pub use prompt::{
    AcceptDefaults, AgentSetup, ConflictContext, ConflictPrompt, Resolution, create_params,
};
pub use queue::{
    FileEvent, FileEventKind, SyncJob, SyncQueue, WorkerStats, spawn_periodic_sync,
    spawn_sync_worker,
};
pub use rate_limit::UploadRateLimiter;
pub use reconciler::{FileAction, FileFailure, ReconcileReport, Reconciler};
pub use session::Session;
pub use watcher::{VaultWatcher, file_events, watch_vault};
