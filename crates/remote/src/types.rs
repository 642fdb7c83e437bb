//! Resources exchanged with the remote API.
//!
//! Field names follow the JSON the server speaks; the Rust-facing names are the
//! ones the rest of the workspace reasons about (`encoded_name`, `byte_size`).

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A document collection on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHandle {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelConfig {
    pub model: Option<String>,
    pub embedding: Option<String>,
}

/// The conversational agent bound to the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHandle {
    pub id: String,
    pub name: String,
    pub model_config: ModelConfig,
    pub source_ids: BTreeSet<String>,
}

impl AgentHandle {
    pub fn has_source(&self, source_id: &str) -> bool {
        self.source_ids.contains(source_id)
    }
}

#[derive(Debug, Deserialize)]
struct AgentState {
    id: String,
    name: String,
    #[serde(default)]
    llm_config: Option<Value>,
    #[serde(default)]
    embedding_config: Option<Value>,
    #[serde(default)]
    sources: Vec<SourceHandle>,
}

impl<'de> Deserialize<'de> for AgentHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let state = AgentState::deserialize(deserializer)?;
        let string_field = |config: &Option<Value>, key: &str| {
            config
                .as_ref()
                .and_then(|c| c.get(key))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };
        Ok(Self {
            model_config: ModelConfig {
                model: string_field(&state.llm_config, "model"),
                embedding: string_field(&state.embedding_config, "embedding_model"),
            },
            source_ids: state.sources.into_iter().map(|s| s.id).collect(),
            id: state.id,
            name: state.name,
        })
    }
}

/// One uploaded file inside a source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteFileRecord {
    pub id: String,
    #[serde(rename = "file_name")]
    pub encoded_name: String,
    #[serde(rename = "file_size", default)]
    pub byte_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RemoteFileRecord {
    /// Last time the server touched the record, if it reported one.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}

/// Accepts RFC 3339 as well as the zone-less ISO form some server builds emit
/// (interpreted as UTC).
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

/// A labelled text record in the agent's core memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    #[serde(default)]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "limit", default)]
    pub character_limit: Option<usize>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// An embedding configuration as listed by the server.  Kept opaque because
/// it is handed back verbatim when creating a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingConfig(pub Value);

impl EmbeddingConfig {
    pub fn handle(&self) -> Option<&str> {
        self.0
            .get("handle")
            .or_else(|| self.0.get("embedding_model"))
            .and_then(Value::as_str)
    }
}

/// Initial block contents for a freshly created agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSeed {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentCreateParams {
    pub name: String,
    pub agent_type: String,
    pub model: String,
    pub embedding: String,
    pub include_base_tools: bool,
    pub source_ids: Vec<String>,
    pub memory_blocks: Vec<BlockSeed>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn agent_state_maps_to_handle() {
        let raw = json!({
            "id": "agent-1",
            "name": "Obsidian Assistant",
            "llm_config": {"model": "gpt-4o-mini", "context_window": 8192},
            "embedding_config": {"embedding_model": "text-embedding-3-small"},
            "sources": [{"id": "source-1", "name": "vault"}, {"id": "source-2", "name": "x"}],
            "tools": []
        });
        let agent: AgentHandle = serde_json::from_value(raw).unwrap();
        assert_eq!(agent.id, "agent-1");
        assert_eq!(agent.model_config.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(
            agent.model_config.embedding.as_deref(),
            Some("text-embedding-3-small")
        );
        assert!(agent.has_source("source-1"));
        assert!(agent.has_source("source-2"));
        assert_eq!(agent.source_ids.len(), 2);
    }

    #[test]
    fn agent_without_sources_or_configs() {
        let agent: AgentHandle =
            serde_json::from_value(json!({"id": "a", "name": "n"})).unwrap();
        assert!(agent.source_ids.is_empty());
        assert_eq!(agent.model_config, ModelConfig::default());
    }

    #[test]
    fn file_record_accepts_both_timestamp_forms() {
        let zoned: RemoteFileRecord = serde_json::from_value(json!({
            "id": "file-1",
            "file_name": "notes__today.md",
            "file_size": 120,
            "updated_at": "2025-03-01T10:00:00+00:00"
        }))
        .unwrap();
        let naive: RemoteFileRecord = serde_json::from_value(json!({
            "id": "file-2",
            "file_name": "notes__today.md",
            "file_size": 120,
            "created_at": "2025-03-01T10:00:00.250"
        }))
        .unwrap();

        assert_eq!(zoned.encoded_name, "notes__today.md");
        assert_eq!(zoned.byte_size, Some(120));
        assert_eq!(zoned.last_modified(), zoned.updated_at);
        assert!(naive.updated_at.is_none());
        assert_eq!(naive.last_modified(), naive.created_at);
        assert!(naive.created_at.unwrap() > zoned.updated_at.unwrap());
    }

    #[test]
    fn file_record_with_null_timestamps() {
        let record: RemoteFileRecord = serde_json::from_value(json!({
            "id": "file-3",
            "file_name": "a.md",
            "updated_at": null
        }))
        .unwrap();
        assert!(record.last_modified().is_none());
        assert!(record.byte_size.is_none());
    }

    #[test]
    fn memory_block_wire_names() {
        let block: MemoryBlock = serde_json::from_value(json!({
            "id": "block-1",
            "label": "persona",
            "value": "I am helpful.",
            "limit": 5000,
            "read_only": false,
            "description": "Who the agent is"
        }))
        .unwrap();
        assert_eq!(block.character_limit, Some(5000));
        assert!(!block.read_only);
    }

    #[test]
    fn embedding_handle_falls_back_to_model_name() {
        let with_handle = EmbeddingConfig(json!({"handle": "openai/text-embedding-3-small"}));
        let legacy = EmbeddingConfig(json!({"embedding_model": "letta-free"}));
        let empty = EmbeddingConfig(json!({}));
        assert_eq!(with_handle.handle(), Some("openai/text-embedding-3-small"));
        assert_eq!(legacy.handle(), Some("letta-free"));
        assert_eq!(empty.handle(), None);
    }
}
