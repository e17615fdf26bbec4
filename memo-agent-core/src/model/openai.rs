//! OpenAI-compatible chat-completions client with native tool calling.

use super::traits::ModelProvider;
use super::types::{ModelError, ModelRequest, ModelResponse};
use crate::config::ProviderConfig;
use crate::domain::{Message, MessageRole, ToolCallRequest, ToolDescriptor};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

const PROVIDER_ID: &str = "openai";

/// Works with OpenAI and any server exposing the same chat-completions API.
#[derive(Clone)]
pub struct OpenAIClient {
    http: Client,
    url: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAIClient {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            http: Client::new(),
            url: config.chat_url(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        }
    }

    fn require_api_key(&self) -> Result<&str, ModelError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ModelError::missing_api_key(PROVIDER_ID))
    }
}

#[async_trait]
impl ModelProvider for OpenAIClient {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let api_key = self.require_api_key()?;
        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: request.messages.iter().map(to_wire_message).collect(),
            tools: request.tools.iter().map(to_wire_tool).collect(),
            temperature: self.temperature,
        };

        info!(
            model = request.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to chat-completions provider"
        );

        let response: ChatCompletionResponse = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ModelError::network(PROVIDER_ID, e))?
            .error_for_status()
            .map_err(|e| ModelError::network(PROVIDER_ID, e))?
            .json()
            .await
            .map_err(|e| ModelError::network(PROVIDER_ID, e))?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| from_wire_message(choice.message))
            .ok_or_else(|| ModelError::invalid_response(PROVIDER_ID, "response has no choices"))?;
        debug!(
            tool_calls = message.tool_calls.len(),
            "Received response from chat-completions provider"
        );
        Ok(ModelResponse::new(message))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn to_wire_message(message: &Message) -> Value {
    let mut wire = json!({
        "role": message.role.as_str(),
        "content": message.content,
    });
    if message.role == MessageRole::Assistant && message.has_tool_calls() {
        if message.content.is_empty() {
            wire["content"] = Value::Null;
        }
        wire["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                })
            })
            .collect();
    }
    if let Some(call_id) = &message.tool_call_id {
        wire["tool_call_id"] = Value::String(call_id.clone());
    }
    wire
}

fn to_wire_tool(tool: &ToolDescriptor) -> Value {
    let parameters = if tool.input_schema.is_object() {
        tool.input_schema.clone()
    } else {
        json!({"type": "object", "properties": {}})
    };
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description.clone().unwrap_or_default(),
            "parameters": parameters,
        }
    })
}

fn from_wire_message(message: WireMessage) -> Message {
    let calls = message
        .tool_calls
        .into_iter()
        .map(|call| {
            let id = call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            ToolCallRequest::new(id, call.function.name, parse_arguments(&call.function.arguments))
        })
        .collect();
    Message::assistant_with_calls(message.content.unwrap_or_default(), calls)
}

/// Undecodable arguments are kept as a raw string so schema validation
/// rejects them with a message the model can act on.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
