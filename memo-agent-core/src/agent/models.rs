use crate::config::{AppConfig, defaults};
use crate::domain::{Conversation, Message, ToolCallResult};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub model: String,
    /// Prepended to every model request; never stored in the conversation.
    pub system_prompt: Option<String>,
    pub max_cycles: usize,
    pub tool_timeout: Duration,
    pub parallel_tool_calls: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_cycles: defaults::DEFAULT_MAX_CYCLES,
            tool_timeout: Duration::from_secs(defaults::DEFAULT_TOOL_TIMEOUT_SECS),
            parallel_tool_calls: true,
        }
    }
}

impl AgentOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_cycles: config.agent.max_cycles,
            tool_timeout: config.agent.tool_timeout,
            parallel_tool_calls: config.agent.parallel_tool_calls,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: Message,
    pub conversation: Conversation,
    /// Number of tool-dispatch cycles the turn went through.
    pub cycles: usize,
    pub steps: Vec<ToolCallResult>,
}
