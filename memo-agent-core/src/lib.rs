//! Agent loop and MCP tool-invocation bridge.
//!
//! A language model drives an [`agent::Agent`]; tool calls it emits are
//! validated against the session's [`tooling::ToolRegistry`] and sent over
//! a [`transport`] (spawned subprocess pipe or HTTP event stream) to a tool
//! server speaking MCP.

pub mod agent;
pub mod config;
pub mod domain;
pub mod model;
pub mod protocol;
pub mod tooling;
pub mod transport;

pub use agent::{Agent, AgentError, AgentOptions, TurnError, TurnOutcome};
pub use config::{AppConfig, ConfigError};
pub use domain::{Conversation, Message, MessageRole, ToolCallRequest, ToolCallResult};
pub use model::{ModelProvider, OpenAIClient};
pub use transport::{McpConnector, TransportError};
