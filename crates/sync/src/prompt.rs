//! Decisions delegated to whoever is driving the session (a terminal, a UI).
//!
//! A collaborator that cannot answer returns `None` / `false`, which is
//! always treated as a decline.

use async_trait::async_trait;
use lettavault_config::AgentDefaults;
use lettavault_remote::{AgentCreateParams, AgentHandle, BlockSeed, SourceHandle};

/// Questions asked while binding the source and agent.
#[async_trait]
pub trait AgentSetup: Send + Sync {
    /// Creation parameters for a missing agent.  `None` cancels the connect.
    async fn agent_parameters(
        &self,
        agent_name: &str,
        source: &SourceHandle,
    ) -> Option<AgentCreateParams>;

    async fn confirm_source_creation(&self, source_name: &str) -> bool;

    async fn confirm_source_attachment(&self, source: &SourceHandle, agent: &AgentHandle) -> bool;
}

/// Accepts every question with the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct AcceptDefaults {
    pub defaults: AgentDefaults,
}

impl AcceptDefaults {
    pub fn new(defaults: AgentDefaults) -> Self {
        Self { defaults }
    }
}

#[async_trait]
impl AgentSetup for AcceptDefaults {
    async fn agent_parameters(
        &self,
        agent_name: &str,
        source: &SourceHandle,
    ) -> Option<AgentCreateParams> {
        Some(create_params(&self.defaults, agent_name, source))
    }

    async fn confirm_source_creation(&self, _source_name: &str) -> bool {
        true
    }

    async fn confirm_source_attachment(&self, _source: &SourceHandle, _agent: &AgentHandle) -> bool {
        true
    }
}

/// Agent creation request built from configured defaults, with `source`
/// pre-attached.
pub fn create_params(
    defaults: &AgentDefaults,
    agent_name: &str,
    source: &SourceHandle,
) -> AgentCreateParams {
    let mut memory_blocks = vec![BlockSeed {
        label: "persona".to_string(),
        value: defaults.persona.clone(),
        limit: None,
    }];
    if !defaults.human.trim().is_empty() {
        memory_blocks.push(BlockSeed {
            label: "human".to_string(),
            value: defaults.human.clone(),
            limit: None,
        });
    }

    AgentCreateParams {
        name: agent_name.to_string(),
        agent_type: defaults.agent_type.clone(),
        model: defaults.model.clone(),
        embedding: defaults.embedding.clone(),
        include_base_tools: defaults.include_base_tools,
        source_ids: vec![source.id.clone()],
        memory_blocks,
    }
}

/// What the three parties of a block conflict looked like when it was
/// detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictContext {
    pub label: String,
    /// Value the editor loaded.
    pub base: String,
    /// Value currently on the server.
    pub server: String,
    /// Local edit awaiting save.
    pub pending: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepServer,
    Overwrite,
    Cancel,
}

#[async_trait]
pub trait ConflictPrompt: Send + Sync {
    async fn resolve(&self, conflict: &ConflictContext) -> Option<Resolution>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceHandle {
        SourceHandle {
            id: "source-1".into(),
            name: "vault".into(),
        }
    }

    #[test]
    fn create_params_attach_the_source() {
        let params = create_params(&AgentDefaults::default(), "Vault Bot", &source());
        assert_eq!(params.name, "Vault Bot");
        assert_eq!(params.source_ids, vec!["source-1".to_string()]);
        assert_eq!(params.model, "letta/letta-free");
        assert_eq!(params.memory_blocks.len(), 1);
        assert_eq!(params.memory_blocks[0].label, "persona");
    }

    #[test]
    fn human_block_is_seeded_when_configured() {
        let defaults = AgentDefaults {
            human: "Name: Sam".into(),
            ..Default::default()
        };
        let params = create_params(&defaults, "Vault Bot", &source());
        let labels = params
            .memory_blocks
            .iter()
            .map(|block| block.label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["persona", "human"]);
    }

    #[tokio::test]
    async fn accept_defaults_says_yes() {
        let setup = AcceptDefaults::default();
        assert!(setup.confirm_source_creation("vault").await);
        assert!(setup.agent_parameters("bot", &source()).await.is_some());
    }
}
