use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::RemoteResult;
use crate::types::{
    AgentCreateParams, AgentHandle, EmbeddingConfig, MemoryBlock, RemoteFileRecord, SourceHandle,
};

/// Request/response surface of the remote knowledge store.
///
/// Every method is a single round trip with no retry of its own; retrying is
/// the caller's decision.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    // ── Capability probe ─────────────────────────────────────────────────────

    async fn list_embedding_configs(&self) -> RemoteResult<Vec<EmbeddingConfig>>;

    // ── Sources ──────────────────────────────────────────────────────────────

    async fn list_sources(&self) -> RemoteResult<Vec<SourceHandle>>;

    async fn create_source(
        &self,
        name: &str,
        embedding: &EmbeddingConfig,
    ) -> RemoteResult<SourceHandle>;

    async fn list_files(&self, source_id: &str) -> RemoteResult<Vec<RemoteFileRecord>>;

    async fn delete_file(&self, source_id: &str, file_id: &str) -> RemoteResult<()>;

    async fn upload_file(
        &self,
        source_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> RemoteResult<()>;

    // ── Agents ───────────────────────────────────────────────────────────────

    async fn find_agents(&self, name: &str) -> RemoteResult<Vec<AgentHandle>>;

    async fn create_agent(&self, params: &AgentCreateParams) -> RemoteResult<AgentHandle>;

    /// Replaces the agent's attached source set with `source_ids`.
    async fn set_agent_sources(
        &self,
        agent_id: &str,
        source_ids: &BTreeSet<String>,
    ) -> RemoteResult<AgentHandle>;

    // ── Memory blocks ────────────────────────────────────────────────────────

    async fn list_blocks(&self, agent_id: &str) -> RemoteResult<Vec<MemoryBlock>>;

    async fn get_block(&self, agent_id: &str, label: &str) -> RemoteResult<MemoryBlock>;

    async fn update_block(
        &self,
        agent_id: &str,
        label: &str,
        value: &str,
    ) -> RemoteResult<MemoryBlock>;

    // ── Agent file views ─────────────────────────────────────────────────────

    async fn open_file(&self, agent_id: &str, file_id: &str) -> RemoteResult<()>;

    async fn close_file(&self, agent_id: &str, file_id: &str) -> RemoteResult<()>;

    async fn close_all_files(&self, agent_id: &str) -> RemoteResult<()>;
}
