use lettavault_remote::{AgentHandle, SourceHandle};

/// The resources bound by a successful connect.  Lives as long as the
/// connection; re-derived by name on every connect, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub source: SourceHandle,
    pub agent: AgentHandle,
}

impl Session {
    pub fn source_id(&self) -> &str {
        &self.source.id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent.id
    }

    /// False when the user declined attaching the source to an existing agent.
    pub fn source_attached(&self) -> bool {
        self.agent.has_source(&self.source.id)
    }
}
