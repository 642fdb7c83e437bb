//! Binds the configured source and agent names to remote resources.
//!
//! Every attempt re-runs the whole find-or-create sequence, so a retry after
//! partial progress (source created, agent step failed) picks up the existing
//! source instead of creating a second one.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use lettavault_config::{RemoteConnectionConfig, SyncConfig};
use lettavault_remote::{AgentHandle, RemoteClient, SourceHandle};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ConnectError, retryable};
use crate::prompt::AgentSetup;
use crate::session::Session;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

// ── Backoff ──────────────────────────────────────────────────────────────────

/// Exponential delay between connect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl BackoffPolicy {
    /// Delay after the `attempt`-th failure (1-based):
    /// `min(initial × 2^(attempt-1), max)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

// ── State machine ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    Idle,
    Probing { attempt: u32 },
    ResolvingSource,
    ResolvingAgent,
    Retrying { attempt: u32, delay: Duration },
    Connected,
    Failed,
}

/// Which resources may be provisioned without asking first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentPolicy {
    pub ask_before_source_creation: bool,
    pub ask_before_source_attachment: bool,
}

impl Default for ConsentPolicy {
    fn default() -> Self {
        Self {
            ask_before_source_creation: true,
            ask_before_source_attachment: true,
        }
    }
}

impl From<&SyncConfig> for ConsentPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            ask_before_source_creation: config.ask_before_source_creation,
            ask_before_source_attachment: config.ask_before_source_attachment,
        }
    }
}

pub struct Bootstrapper {
    client: Arc<dyn RemoteClient>,
    config: RemoteConnectionConfig,
    consent: ConsentPolicy,
    backoff: BackoffPolicy,
    state: watch::Sender<BootstrapState>,
}

impl Bootstrapper {
    pub fn new(client: Arc<dyn RemoteClient>, config: RemoteConnectionConfig) -> Self {
        let (state, _) = watch::channel(BootstrapState::Idle);
        Self {
            client,
            config,
            consent: ConsentPolicy::default(),
            backoff: BackoffPolicy::default(),
            state,
        }
    }

    pub fn with_consent(mut self, consent: ConsentPolicy) -> Self {
        self.consent = consent;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn state(&self) -> BootstrapState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BootstrapState> {
        self.state.subscribe()
    }

    fn transition(&self, next: BootstrapState) {
        debug!(state = ?next, "bootstrap state");
        self.state.send_replace(next);
    }

    /// Runs the bind sequence up to `max_attempts` times (at least once).
    /// Transient remote failures are retried, and so is a resource that
    /// vanished mid-attempt: the next attempt finds or re-creates it.
    pub async fn connect(
        &self,
        setup: &dyn AgentSetup,
        max_attempts: u32,
    ) -> Result<Session, ConnectError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(setup, attempt).await {
                Ok(session) => {
                    self.transition(BootstrapState::Connected);
                    info!(
                        source_id = %session.source.id,
                        agent_id = %session.agent.id,
                        attempt,
                        "connected"
                    );
                    return Ok(session);
                }
                Err(ConnectError::Remote(err)) if retryable(&err) => {
                    if attempt >= max_attempts {
                        self.transition(BootstrapState::Failed);
                        warn!(attempts = attempt, error = %err, "connect attempts exhausted");
                        return Err(ConnectError::Exhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }
                    let delay = self.backoff.delay_after(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "connect failed; retrying");
                    self.transition(BootstrapState::Retrying { attempt, delay });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    self.transition(BootstrapState::Failed);
                    warn!(attempt, error = %err, "connect failed");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, setup: &dyn AgentSetup, attempt: u32) -> Result<Session, ConnectError> {
        self.config.validate()?;

        self.transition(BootstrapState::Probing { attempt });
        let embeddings = self.client.list_embedding_configs().await?;

        self.transition(BootstrapState::ResolvingSource);
        let source = self.resolve_source(setup, &embeddings).await?;

        self.transition(BootstrapState::ResolvingAgent);
        let agent = self.resolve_agent(setup, &source).await?;

        Ok(Session { source, agent })
    }

    async fn resolve_source(
        &self,
        setup: &dyn AgentSetup,
        embeddings: &[lettavault_remote::EmbeddingConfig],
    ) -> Result<SourceHandle, ConnectError> {
        let name = self.config.source_name.trim();
        let mut matches = self
            .client
            .list_sources()
            .await?
            .into_iter()
            .filter(|source| source.name == name);

        if let Some(source) = matches.next() {
            if matches.next().is_some() {
                warn!(source = name, "several sources share this name; using the first");
            }
            debug!(source_id = %source.id, "found existing source");
            return Ok(source);
        }

        if self.consent.ask_before_source_creation && !setup.confirm_source_creation(name).await {
            return Err(ConnectError::UserCancelled(format!(
                "creation of source `{name}` was declined"
            )));
        }

        let embedding = embeddings.first().ok_or_else(|| {
            ConnectError::Validation("the server offers no embedding configuration".to_string())
        })?;
        let source = self.client.create_source(name, embedding).await?;
        info!(source_id = %source.id, source = name, embedding = ?embedding.handle(), "created source");
        Ok(source)
    }

    async fn resolve_agent(
        &self,
        setup: &dyn AgentSetup,
        source: &SourceHandle,
    ) -> Result<AgentHandle, ConnectError> {
        let name = self.config.agent_name.trim();
        let mut agents = self.client.find_agents(name).await?.into_iter();

        let Some(agent) = agents.next() else {
            return self.create_agent(setup, name, source).await;
        };
        if agents.next().is_some() {
            warn!(agent = name, "several agents share this name; using the first");
        }

        if agent.has_source(&source.id) {
            debug!(agent_id = %agent.id, "source already attached");
            return Ok(agent);
        }

        if self.consent.ask_before_source_attachment
            && !setup.confirm_source_attachment(source, &agent).await
        {
            warn!(
                agent_id = %agent.id,
                source_id = %source.id,
                "source attachment declined; the agent will not see vault files"
            );
            return Ok(agent);
        }

        let mut source_ids: BTreeSet<String> = agent.source_ids.clone();
        source_ids.insert(source.id.clone());
        let agent = self.client.set_agent_sources(&agent.id, &source_ids).await?;
        info!(agent_id = %agent.id, source_id = %source.id, "attached source to agent");
        Ok(agent)
    }

    async fn create_agent(
        &self,
        setup: &dyn AgentSetup,
        name: &str,
        source: &SourceHandle,
    ) -> Result<AgentHandle, ConnectError> {
        let Some(mut params) = setup.agent_parameters(name, source).await else {
            return Err(ConnectError::UserCancelled(format!(
                "creation of agent `{name}` was declined"
            )));
        };
        params.name = name.to_string();
        if !params.source_ids.contains(&source.id) {
            params.source_ids.push(source.id.clone());
        }

        let agent = self.client.create_agent(&params).await?;
        info!(agent_id = %agent.id, agent = name, model = %params.model, "created agent");
        Ok(agent)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
