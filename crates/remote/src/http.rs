//! `reqwest`-backed [`RemoteClient`].

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::client::RemoteClient;
use crate::error::{RemoteError, RemoteResult};
use crate::multipart::{MARKDOWN_CONTENT_TYPE, MultipartBody};
use crate::types::{
    AgentCreateParams, AgentHandle, EmbeddingConfig, MemoryBlock, RemoteFileRecord, SourceHandle,
};

/// Characters left untouched when a value is placed in a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Upper bound on files fetched per listing; sources larger than this are
/// not expected for a single vault.
const FILE_PAGE_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRemoteClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> RemoteResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "remote request failed");
        Err(RemoteError::from_status(status.as_u16(), error_detail(&body)))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> RemoteResult<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> RemoteResult<()> {
        self.send(builder).await.map(|_| ())
    }
}

fn segment(raw: &str) -> String {
    utf8_percent_encode(raw, SEGMENT).to_string()
}

/// Pulls the human-readable part out of an error body, which is usually
/// `{"detail": "..."}`.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .map(|detail| match detail {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list_embedding_configs(&self) -> RemoteResult<Vec<EmbeddingConfig>> {
        self.send_json(self.request(Method::GET, "/v1/models/embedding"))
            .await
    }

    async fn list_sources(&self) -> RemoteResult<Vec<SourceHandle>> {
        self.send_json(self.request(Method::GET, "/v1/sources/")).await
    }

    async fn create_source(
        &self,
        name: &str,
        embedding: &EmbeddingConfig,
    ) -> RemoteResult<SourceHandle> {
        let payload = json!({
            "name": name,
            "embedding_config": embedding,
        });
        self.send_json(self.request(Method::POST, "/v1/sources/").json(&payload))
            .await
    }

    async fn list_files(&self, source_id: &str) -> RemoteResult<Vec<RemoteFileRecord>> {
        let path = format!("/v1/sources/{}/files", segment(source_id));
        self.send_json(
            self.request(Method::GET, &path)
                .query(&[("limit", FILE_PAGE_LIMIT)]),
        )
        .await
    }

    async fn delete_file(&self, source_id: &str, file_id: &str) -> RemoteResult<()> {
        let path = format!("/v1/sources/{}/{}", segment(source_id), segment(file_id));
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    async fn upload_file(
        &self,
        source_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> RemoteResult<()> {
        let body = MultipartBody::single_file(file_name, MARKDOWN_CONTENT_TYPE, &content);
        let path = format!("/v1/sources/{}/upload", segment(source_id));
        let builder = self
            .request(Method::POST, &path)
            .header(CONTENT_TYPE, body.content_type())
            .body(body.bytes);
        self.send_empty(builder).await
    }

    async fn find_agents(&self, name: &str) -> RemoteResult<Vec<AgentHandle>> {
        let agents: Vec<AgentHandle> = self
            .send_json(self.request(Method::GET, "/v1/agents/").query(&[("name", name)]))
            .await?;
        // Older servers ignore the filter and return every agent.
        Ok(agents.into_iter().filter(|agent| agent.name == name).collect())
    }

    async fn create_agent(&self, params: &AgentCreateParams) -> RemoteResult<AgentHandle> {
        self.send_json(self.request(Method::POST, "/v1/agents/").json(params))
            .await
    }

    async fn set_agent_sources(
        &self,
        agent_id: &str,
        source_ids: &BTreeSet<String>,
    ) -> RemoteResult<AgentHandle> {
        let path = format!("/v1/agents/{}", segment(agent_id));
        let payload = json!({ "source_ids": source_ids });
        self.send_json(self.request(Method::PATCH, &path).json(&payload))
            .await
    }

    async fn list_blocks(&self, agent_id: &str) -> RemoteResult<Vec<MemoryBlock>> {
        let path = format!("/v1/agents/{}/core-memory/blocks", segment(agent_id));
        self.send_json(self.request(Method::GET, &path)).await
    }

    async fn get_block(&self, agent_id: &str, label: &str) -> RemoteResult<MemoryBlock> {
        let path = format!(
            "/v1/agents/{}/core-memory/blocks/{}",
            segment(agent_id),
            segment(label)
        );
        self.send_json(self.request(Method::GET, &path)).await
    }

    async fn update_block(
        &self,
        agent_id: &str,
        label: &str,
        value: &str,
    ) -> RemoteResult<MemoryBlock> {
        let path = format!(
            "/v1/agents/{}/core-memory/blocks/{}",
            segment(agent_id),
            segment(label)
        );
        self.send_json(
            self.request(Method::PATCH, &path)
                .json(&json!({ "value": value })),
        )
        .await
    }

    async fn open_file(&self, agent_id: &str, file_id: &str) -> RemoteResult<()> {
        let path = format!(
            "/v1/agents/{}/files/{}/open",
            segment(agent_id),
            segment(file_id)
        );
        self.send_empty(self.request(Method::PATCH, &path)).await
    }

    async fn close_file(&self, agent_id: &str, file_id: &str) -> RemoteResult<()> {
        let path = format!(
            "/v1/agents/{}/files/{}/close",
            segment(agent_id),
            segment(file_id)
        );
        self.send_empty(self.request(Method::PATCH, &path)).await
    }

    async fn close_all_files(&self, agent_id: &str) -> RemoteResult<()> {
        let path = format!("/v1/agents/{}/files/close-all", segment(agent_id));
        self.send_empty(self.request(Method::PATCH, &path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HttpRemoteClient::new("http://localhost:8283/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8283");
    }

    #[test]
    fn blank_api_key_is_dropped() {
        let client = HttpRemoteClient::new("http://localhost:8283", Some("  ".into())).unwrap();
        assert!(client.api_key.is_none());
    }

    #[test]
    fn path_segments_are_escaped() {
        assert_eq!(segment("human"), "human");
        assert_eq!(segment("my block/x"), "my%20block%2Fx");
        assert_eq!(segment("agent-1_a.b~"), "agent-1_a.b~");
    }

    #[test]
    fn error_detail_prefers_detail_field() {
        assert_eq!(error_detail(r#"{"detail":"Agent not found"}"#), "Agent not found");
        assert_eq!(
            error_detail(r#"{"detail":[{"msg":"field required"}]}"#),
            r#"[{"msg":"field required"}]"#
        );
        assert_eq!(error_detail("  Bad Gateway \n"), "Bad Gateway");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transient_network_error() {
        // Port 9 (discard) on loopback is closed on test machines.
        let client = HttpRemoteClient::new("http://127.0.0.1:9", None).unwrap();
        let err = client.list_embedding_configs().await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }
}
