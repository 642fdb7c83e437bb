//! In-memory [`RemoteClient`] that records every call, for tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettavault_remote::{
    AgentCreateParams, AgentHandle, EmbeddingConfig, MemoryBlock, ModelConfig, RemoteClient,
    RemoteError, RemoteFileRecord, RemoteResult, SourceHandle,
};
use serde_json::json;

use crate::error::SyncError;
use crate::local::{LocalFileRecord, LocalStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListEmbeddings,
    ListSources,
    CreateSource(String),
    ListFiles(String),
    DeleteFile(String),
    Upload(String),
    FindAgents(String),
    CreateAgent(String),
    SetAgentSources(Vec<String>),
    ListBlocks,
    GetBlock(String),
    UpdateBlock(String, String),
    OpenFile(String),
    CloseFile(String),
    CloseAllFiles,
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateSource(_)
                | Call::DeleteFile(_)
                | Call::Upload(_)
                | Call::CreateAgent(_)
                | Call::SetAgentSources(_)
                | Call::UpdateBlock(..)
        )
    }
}

#[derive(Default)]
struct State {
    embeddings: Vec<EmbeddingConfig>,
    sources: Vec<SourceHandle>,
    agents: Vec<AgentHandle>,
    files: Vec<RemoteFileRecord>,
    blocks: HashMap<String, MemoryBlock>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, Vec<RemoteError>>,
    next_id: usize,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

pub struct MockRemote {
    state: Mutex<State>,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    pub fn new() -> Self {
        let state = State {
            embeddings: vec![EmbeddingConfig(json!({
                "embedding_model": "letta-free",
                "handle": "letta/letta-free"
            }))],
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// The next `errors.len()` calls of `op` fail with these errors, in order.
    pub fn fail(&self, op: &'static str, errors: Vec<RemoteError>) {
        let mut state = self.state.lock().unwrap();
        let queue = state.failures.entry(op).or_default();
        queue.extend(errors);
    }

    pub fn set_embeddings(&self, embeddings: Vec<EmbeddingConfig>) {
        self.state.lock().unwrap().embeddings = embeddings;
    }

    pub fn add_source(&self, name: &str) -> SourceHandle {
        let mut state = self.state.lock().unwrap();
        let source = SourceHandle {
            id: state.id("source"),
            name: name.to_string(),
        };
        state.sources.push(source.clone());
        source
    }

    pub fn add_agent(&self, name: &str, source_ids: &[&str]) -> AgentHandle {
        let mut state = self.state.lock().unwrap();
        let agent = AgentHandle {
            id: state.id("agent"),
            name: name.to_string(),
            model_config: ModelConfig::default(),
            source_ids: source_ids.iter().map(ToString::to_string).collect(),
        };
        state.agents.push(agent.clone());
        agent
    }

    pub fn add_file(&self, encoded_name: &str, size: u64, updated_at: DateTime<Utc>) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.id("file");
        state.files.push(RemoteFileRecord {
            id: id.clone(),
            encoded_name: encoded_name.to_string(),
            byte_size: Some(size),
            updated_at: Some(updated_at),
            created_at: Some(updated_at),
        });
        id
    }

    pub fn files(&self) -> Vec<RemoteFileRecord> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn agents(&self) -> Vec<AgentHandle> {
        self.state.lock().unwrap().agents.clone()
    }

    pub fn sources(&self) -> Vec<SourceHandle> {
        self.state.lock().unwrap().sources.clone()
    }

    pub fn set_block(&self, label: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        let block = state
            .blocks
            .entry(label.to_string())
            .or_insert_with(|| MemoryBlock {
                id: None,
                label: label.to_string(),
                value: String::new(),
                character_limit: Some(5000),
                read_only: false,
                description: None,
            });
        block.value = value.to_string();
    }

    pub fn set_block_read_only(&self, label: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(block) = state.blocks.get_mut(label) {
            block.read_only = true;
        }
    }

    pub fn block_value(&self, label: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.blocks.get(label).map(|block| block.value.clone())
    }

    fn begin(&self, op: &'static str, call: Call) -> RemoteResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(queue) = state.failures.get_mut(op) {
            if !queue.is_empty() {
                return Err(queue.remove(0));
            }
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn list_embedding_configs(&self) -> RemoteResult<Vec<EmbeddingConfig>> {
        let state = self.begin("list_embedding_configs", Call::ListEmbeddings)?;
        Ok(state.embeddings.clone())
    }

    async fn list_sources(&self) -> RemoteResult<Vec<SourceHandle>> {
        let state = self.begin("list_sources", Call::ListSources)?;
        Ok(state.sources.clone())
    }

    async fn create_source(
        &self,
        name: &str,
        _embedding: &EmbeddingConfig,
    ) -> RemoteResult<SourceHandle> {
        let mut state = self.begin("create_source", Call::CreateSource(name.to_string()))?;
        let source = SourceHandle {
            id: state.id("source"),
            name: name.to_string(),
        };
        state.sources.push(source.clone());
        Ok(source)
    }

    async fn list_files(&self, source_id: &str) -> RemoteResult<Vec<RemoteFileRecord>> {
        let state = self.begin("list_files", Call::ListFiles(source_id.to_string()))?;
        Ok(state.files.clone())
    }

    async fn delete_file(&self, _source_id: &str, file_id: &str) -> RemoteResult<()> {
        let mut state = self.begin("delete_file", Call::DeleteFile(file_id.to_string()))?;
        let before = state.files.len();
        state.files.retain(|file| file.id != file_id);
        if state.files.len() == before {
            return Err(RemoteError::NotFound(file_id.to_string()));
        }
        Ok(())
    }

    async fn upload_file(
        &self,
        _source_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> RemoteResult<()> {
        let mut state = self.begin("upload_file", Call::Upload(file_name.to_string()))?;
        let id = state.id("file");
        let now = Utc::now();
        state.files.push(RemoteFileRecord {
            id,
            encoded_name: file_name.to_string(),
            byte_size: Some(content.len() as u64),
            updated_at: Some(now),
            created_at: Some(now),
        });
        Ok(())
    }

    async fn find_agents(&self, name: &str) -> RemoteResult<Vec<AgentHandle>> {
        let state = self.begin("find_agents", Call::FindAgents(name.to_string()))?;
        Ok(state
            .agents
            .iter()
            .filter(|agent| agent.name == name)
            .cloned()
            .collect())
    }

    async fn create_agent(&self, params: &AgentCreateParams) -> RemoteResult<AgentHandle> {
        let mut state = self.begin("create_agent", Call::CreateAgent(params.name.clone()))?;
        let agent = AgentHandle {
            id: state.id("agent"),
            name: params.name.clone(),
            model_config: ModelConfig {
                model: Some(params.model.clone()),
                embedding: Some(params.embedding.clone()),
            },
            source_ids: params.source_ids.iter().cloned().collect(),
        };
        state.agents.push(agent.clone());
        Ok(agent)
    }

    async fn set_agent_sources(
        &self,
        agent_id: &str,
        source_ids: &BTreeSet<String>,
    ) -> RemoteResult<AgentHandle> {
        let mut state = self.begin(
            "set_agent_sources",
            Call::SetAgentSources(source_ids.iter().cloned().collect()),
        )?;
        let agent = state
            .agents
            .iter_mut()
            .find(|agent| agent.id == agent_id)
            .ok_or_else(|| RemoteError::NotFound(agent_id.to_string()))?;
        agent.source_ids = source_ids.clone();
        Ok(agent.clone())
    }

    async fn list_blocks(&self, _agent_id: &str) -> RemoteResult<Vec<MemoryBlock>> {
        let state = self.begin("list_blocks", Call::ListBlocks)?;
        let mut blocks = state.blocks.values().cloned().collect::<Vec<_>>();
        blocks.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(blocks)
    }

    async fn get_block(&self, _agent_id: &str, label: &str) -> RemoteResult<MemoryBlock> {
        let state = self.begin("get_block", Call::GetBlock(label.to_string()))?;
        state
            .blocks
            .get(label)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(label.to_string()))
    }

    async fn update_block(
        &self,
        _agent_id: &str,
        label: &str,
        value: &str,
    ) -> RemoteResult<MemoryBlock> {
        let mut state = self.begin(
            "update_block",
            Call::UpdateBlock(label.to_string(), value.to_string()),
        )?;
        let block = state
            .blocks
            .get_mut(label)
            .ok_or_else(|| RemoteError::NotFound(label.to_string()))?;
        block.value = value.to_string();
        Ok(block.clone())
    }

    async fn open_file(&self, _agent_id: &str, file_id: &str) -> RemoteResult<()> {
        let _state = self.begin("open_file", Call::OpenFile(file_id.to_string()))?;
        Ok(())
    }

    async fn close_file(&self, _agent_id: &str, file_id: &str) -> RemoteResult<()> {
        let _state = self.begin("close_file", Call::CloseFile(file_id.to_string()))?;
        Ok(())
    }

    async fn close_all_files(&self, _agent_id: &str) -> RemoteResult<()> {
        let _state = self.begin("close_all_files", Call::CloseAllFiles)?;
        Ok(())
    }
}

// ── Local store ──────────────────────────────────────────────────────────────

/// In-memory vault keyed by relative path.
#[derive(Default)]
pub struct MemoryVault {
    files: Mutex<HashMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: &str, content: &[u8], modified_at: DateTime<Utc>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (content.to_vec(), modified_at));
    }
}

#[async_trait]
impl LocalStore for MemoryVault {
    async fn list(&self) -> Result<Vec<LocalFileRecord>, SyncError> {
        let files = self.files.lock().unwrap();
        let mut records = files
            .iter()
            .map(|(path, (content, modified_at))| LocalFileRecord {
                path: path.clone(),
                byte_size: content.len() as u64,
                modified_at: *modified_at,
            })
            .collect::<Vec<_>>();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    async fn stat(&self, path: &str) -> Result<Option<LocalFileRecord>, SyncError> {
        let files = self.files.lock().unwrap();
        Ok(files.get(path).map(|(content, modified_at)| LocalFileRecord {
            path: path.to_string(),
            byte_size: content.len() as u64,
            modified_at: *modified_at,
        }))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, SyncError> {
        let files = self.files.lock().unwrap();
        files
            .get(path)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| {
                SyncError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound))
            })
    }

    fn is_candidate(&self, path: &str) -> bool {
        path.ends_with(".md")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_visibility_calls_are_recorded_and_fail_on_demand() {
        let mock = MockRemote::new();
        mock.fail("close_file", vec![RemoteError::NotFound("file-9".into())]);

        mock.open_file("agent-1", "file-1").await.unwrap();
        assert!(matches!(
            mock.close_file("agent-1", "file-9").await,
            Err(RemoteError::NotFound(_))
        ));
        mock.close_all_files("agent-1").await.unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                Call::OpenFile("file-1".into()),
                Call::CloseFile("file-9".into()),
                Call::CloseAllFiles,
            ]
        );
        assert!(mock.mutations().is_empty());
    }
}
