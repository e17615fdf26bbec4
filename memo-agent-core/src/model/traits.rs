//! Model traits

use super::types::{ModelError, ModelRequest, ModelResponse};
use async_trait::async_trait;

/// Trait for model provider implementations
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Sends the conversation and tool catalogue, returning one assistant
    /// message with zero or more tool calls.
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}
