//! Editing of agent memory blocks with optimistic conflict detection.
//!
//! An editor remembers the value it loaded (`base`).  On save the server
//! value is fetched again; if it still matches `base` after trimming, the
//! edit is written.  Otherwise the [`ConflictPrompt`] decides.  The
//! re-check and the write are separate requests, so a writer landing
//! between them is overwritten.

use std::collections::HashMap;
use std::sync::Arc;

use lettavault_remote::{MemoryBlock, RemoteClient};
use tracing::{debug, info};

use crate::error::BlockError;
use crate::prompt::{ConflictContext, ConflictPrompt, Resolution};
use crate::session::Session;

/// Local state of one open block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEditor {
    pub label: String,
    /// Server value when the editor was loaded or last saved.
    pub base: String,
    pub pending: String,
    pub read_only: bool,
    pub character_limit: Option<usize>,
}

impl BlockEditor {
    fn from_block(block: MemoryBlock) -> Self {
        Self {
            label: block.label,
            base: block.value.clone(),
            pending: block.value,
            read_only: block.read_only,
            character_limit: block.character_limit,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.pending.trim() != self.base.trim()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to save.
    Unchanged,
    /// No conflict; the edit was written.
    Saved,
    /// Conflict resolved by adopting the server value.
    KeptServer,
    /// Conflict resolved by writing the edit over the server value.
    Overwritten,
    /// Conflict left unresolved; the editor stays dirty.
    Cancelled,
}

pub struct BlockResolver {
    client: Arc<dyn RemoteClient>,
    agent_id: String,
    editors: HashMap<String, BlockEditor>,
}

impl BlockResolver {
    pub fn new(client: Arc<dyn RemoteClient>, session: &Session) -> Self {
        Self {
            client,
            agent_id: session.agent_id().to_string(),
            editors: HashMap::new(),
        }
    }

    pub async fn list(&self) -> Result<Vec<MemoryBlock>, BlockError> {
        Ok(self.client.list_blocks(&self.agent_id).await?)
    }

    /// Loads `label` into an editor.  An editor with unsaved changes is kept
    /// as is.
    pub async fn open(&mut self, label: &str) -> Result<&BlockEditor, BlockError> {
        if self.editors.get(label).is_some_and(BlockEditor::is_dirty) {
            debug!(label, "block already open with pending edits");
        } else {
            let block = self.client.get_block(&self.agent_id, label).await?;
            self.editors
                .insert(label.to_string(), BlockEditor::from_block(block));
        }
        self.editor(label)
            .ok_or_else(|| BlockError::NotOpen(label.to_string()))
    }

    pub fn editor(&self, label: &str) -> Option<&BlockEditor> {
        self.editors.get(label)
    }

    pub fn is_dirty(&self, label: &str) -> bool {
        self.editors.get(label).is_some_and(BlockEditor::is_dirty)
    }

    /// Replaces the pending text of an open block.
    pub fn edit(&mut self, label: &str, text: impl Into<String>) -> Result<(), BlockError> {
        let editor = self
            .editors
            .get_mut(label)
            .ok_or_else(|| BlockError::NotOpen(label.to_string()))?;
        if editor.read_only {
            return Err(BlockError::ReadOnly(label.to_string()));
        }
        let text = text.into();
        if let Some(limit) = editor.character_limit {
            let len = text.chars().count();
            if len > limit {
                return Err(BlockError::TooLong {
                    label: label.to_string(),
                    limit,
                    len,
                });
            }
        }
        editor.pending = text;
        Ok(())
    }

    /// Writes the pending edit, asking `prompt` when the server value moved
    /// since the editor was loaded.  A prompt that gives no answer cancels.
    pub async fn save(
        &mut self,
        label: &str,
        prompt: &dyn ConflictPrompt,
    ) -> Result<SaveOutcome, BlockError> {
        let editor = self
            .editors
            .get_mut(label)
            .ok_or_else(|| BlockError::NotOpen(label.to_string()))?;
        if !editor.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }

        let server = self.client.get_block(&self.agent_id, label).await?.value;
        if server.trim() == editor.base.trim() {
            self.client
                .update_block(&self.agent_id, label, &editor.pending)
                .await?;
            editor.base = editor.pending.clone();
            info!(label, "block saved");
            return Ok(SaveOutcome::Saved);
        }

        let conflict = ConflictContext {
            label: label.to_string(),
            base: editor.base.clone(),
            server: server.clone(),
            pending: editor.pending.clone(),
        };
        let resolution = prompt.resolve(&conflict).await.unwrap_or(Resolution::Cancel);
        info!(label, ?resolution, "block conflict");

        match resolution {
            Resolution::KeepServer => {
                editor.base = server.clone();
                editor.pending = server;
                Ok(SaveOutcome::KeptServer)
            }
            Resolution::Overwrite => {
                self.client
                    .update_block(&self.agent_id, label, &editor.pending)
                    .await?;
                editor.base = editor.pending.clone();
                Ok(SaveOutcome::Overwritten)
            }
            Resolution::Cancel => Ok(SaveOutcome::Cancelled),
        }
    }

    /// Drops the editor, discarding unsaved edits.  Returns whether one was
    /// open.
    pub fn close(&mut self, label: &str) -> bool {
        self.editors.remove(label).is_some()
    }
}
