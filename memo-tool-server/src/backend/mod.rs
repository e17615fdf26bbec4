//! Storage behind the memo tools.

mod http;
mod memory;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewMemo {
    pub title: String,
    pub content: Option<String>,
}

/// Partial update; `None` fields are left untouched and never sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Memo with id {0} not found")]
    NotFound(i64),
    #[error("memo backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("memo backend unreachable: {0}")]
    Unreachable(String),
    #[error("memo backend sent an unexpected payload: {0}")]
    Decode(String),
}

#[async_trait]
pub trait MemoBackend: Send + Sync {
    async fn create(&self, memo: NewMemo) -> Result<Memo, BackendError>;
    async fn list(&self, skip: u64, limit: u64) -> Result<Vec<Memo>, BackendError>;
    async fn get(&self, id: i64) -> Result<Memo, BackendError>;
    async fn update(&self, id: i64, patch: MemoPatch) -> Result<Memo, BackendError>;
    async fn delete(&self, id: i64) -> Result<(), BackendError>;
}
