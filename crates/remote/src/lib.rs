//! Client side of the remote knowledge-store API: resource types, the
//! [`RemoteClient`] trait, its HTTP implementation and the error taxonomy.

pub mod client;
pub mod error;
pub mod http;
pub mod multipart;
pub mod types;

pub use client::RemoteClient;
pub use error::{RemoteError, RemoteResult};
pub use http::HttpRemoteClient;
pub use types::{
    AgentCreateParams, AgentHandle, BlockSeed, EmbeddingConfig, MemoryBlock, ModelConfig,
    RemoteFileRecord, SourceHandle,
};
