use std::io::{self, IsTerminal, Write};

use async_trait::async_trait;
use tracing::warn;

use lettavault_config::AgentDefaults;
use lettavault_remote::{AgentCreateParams, AgentHandle, SourceHandle};
use lettavault_sync::{AgentSetup, ConflictContext, ConflictPrompt, Resolution, create_params};

/// Answers setup and conflict questions on the terminal.
///
/// With `--yes` every setup question takes the default and conflicts are
/// cancelled.  Without a terminal and without `--yes`, every question is
/// declined.
pub(crate) struct TerminalPrompts {
    assume_yes: bool,
    defaults: AgentDefaults,
}

impl TerminalPrompts {
    pub(crate) fn new(assume_yes: bool, defaults: AgentDefaults) -> Self {
        Self {
            assume_yes,
            defaults,
        }
    }

    fn interactive(&self) -> bool {
        io::stdin().is_terminal()
    }

    async fn confirm(&self, question: String) -> bool {
        if self.assume_yes {
            return true;
        }
        if !self.interactive() {
            warn!(question = %question, "no terminal to ask; declining (pass --yes to accept)");
            return false;
        }
        ask(format!("{question} [Y/n] "))
            .await
            .is_some_and(|answer| is_yes(&answer))
    }
}

#[async_trait]
impl AgentSetup for TerminalPrompts {
    async fn agent_parameters(
        &self,
        agent_name: &str,
        source: &SourceHandle,
    ) -> Option<AgentCreateParams> {
        let mut params = create_params(&self.defaults, agent_name, source);
        if self.assume_yes {
            return Some(params);
        }
        if !self.confirm(format!("Agent `{agent_name}` does not exist. Create it?")).await {
            return None;
        }

        let model = ask(format!("Model [{}]: ", params.model)).await?;
        if !model.is_empty() {
            params.model = model;
        }
        let embedding = ask(format!("Embedding [{}]: ", params.embedding)).await?;
        if !embedding.is_empty() {
            params.embedding = embedding;
        }
        Some(params)
    }

    async fn confirm_source_creation(&self, source_name: &str) -> bool {
        self.confirm(format!(
            "Source `{source_name}` does not exist. Create it?"
        ))
        .await
    }

    async fn confirm_source_attachment(&self, source: &SourceHandle, agent: &AgentHandle) -> bool {
        self.confirm(format!(
            "Attach source `{}` to agent `{}`?",
            source.name, agent.name
        ))
        .await
    }
}

#[async_trait]
impl ConflictPrompt for TerminalPrompts {
    async fn resolve(&self, conflict: &ConflictContext) -> Option<Resolution> {
        if self.assume_yes {
            return Some(Resolution::Cancel);
        }
        if !self.interactive() {
            return None;
        }

        println!("── block `{}` changed on the server ──────────────────", conflict.label);
        println!("[loaded]\n{}\n", conflict.base.trim());
        println!("[server]\n{}\n", conflict.server.trim());
        println!("[yours]\n{}\n", conflict.pending.trim());
        let answer = ask("[k]eep server, [o]verwrite, [c]ancel: ".to_string()).await?;
        match answer.to_ascii_lowercase().as_str() {
            "k" | "keep" => Some(Resolution::KeepServer),
            "o" | "overwrite" => Some(Resolution::Overwrite),
            _ => Some(Resolution::Cancel),
        }
    }
}

/// Prints `question` and reads one trimmed line.  `None` on EOF or a read
/// error.
async fn ask(question: String) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        print!("{question}");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    })
    .await
    .ok()
    .flatten()
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "" | "y" | "yes")
}
