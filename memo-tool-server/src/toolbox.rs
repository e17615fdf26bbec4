//! The five memo tools: descriptors, argument checks and dispatch onto a
//! [`MemoBackend`].

use crate::backend::{BackendError, MemoBackend, MemoPatch, NewMemo};
use memo_agent_core::domain::ToolDescriptor;
use memo_agent_core::protocol::CallToolResult;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 5000;
pub const MAX_LIST_LIMIT: u64 = 100;
pub const DEFAULT_LIST_LIMIT: u64 = 10;

type Arguments = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ToolFault {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Clone)]
pub struct Toolbox {
    backend: Arc<dyn MemoBackend>,
}

impl Toolbox {
    pub fn new(backend: Arc<dyn MemoBackend>) -> Self {
        Self { backend }
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        descriptors()
    }

    /// Runs one tool; faults come back as `isError` results, never as
    /// protocol errors.
    pub async fn call(&self, name: &str, arguments: &Arguments) -> CallToolResult {
        match self.dispatch(name, arguments).await {
            Ok(payload) => {
                info!(tool = name, "tool call succeeded");
                CallToolResult::success(&payload)
            }
            Err(fault) => {
                warn!(tool = name, error = %fault, "tool call failed");
                CallToolResult::failure(fault.to_string())
            }
        }
    }

    async fn dispatch(&self, name: &str, args: &Arguments) -> Result<Value, ToolFault> {
        match name {
            "create_memo" => {
                let title = title(args, true)?.unwrap_or_default();
                let content = content(args)?;
                let memo = self.backend.create(NewMemo { title, content }).await?;
                Ok(to_json(&memo))
            }
            "list_memos" => {
                let skip = unsigned(args, "skip", 0)?;
                let limit = unsigned(args, "limit", DEFAULT_LIST_LIMIT)?;
                if !(1..=MAX_LIST_LIMIT).contains(&limit) {
                    return Err(ToolFault::InvalidArgument(format!(
                        "limit must be between 1 and {MAX_LIST_LIMIT}"
                    )));
                }
                let memos = self.backend.list(skip, limit).await?;
                Ok(to_json(&memos))
            }
            "get_memo" => {
                let memo = self.backend.get(memo_id(args)?).await?;
                Ok(to_json(&memo))
            }
            "update_memo" => {
                let id = memo_id(args)?;
                let patch = MemoPatch {
                    title: title(args, false)?,
                    content: content(args)?,
                };
                let memo = self.backend.update(id, patch).await?;
                Ok(to_json(&memo))
            }
            "delete_memo" => {
                let id = memo_id(args)?;
                self.backend.delete(id).await?;
                Ok(json!({
                    "status": "success",
                    "message": format!("Memo {id} deleted."),
                }))
            }
            other => Err(ToolFault::UnknownTool(other.to_string())),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn memo_id(args: &Arguments) -> Result<i64, ToolFault> {
    match args.get("memo_id") {
        Some(value) => as_integer(value)
            .ok_or_else(|| ToolFault::InvalidArgument("memo_id must be an integer".into())),
        None => Err(ToolFault::InvalidArgument(
            "missing required argument 'memo_id'".into(),
        )),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.fract() == 0.0)
            .map(|number| number as i64)
    })
}

fn unsigned(args: &Arguments, key: &str, default: u64) -> Result<u64, ToolFault> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => match as_integer(value) {
            Some(number) if number >= 0 => Ok(number as u64),
            Some(_) => Err(ToolFault::InvalidArgument(format!(
                "{key} must not be negative"
            ))),
            None => Err(ToolFault::InvalidArgument(format!(
                "{key} must be an integer"
            ))),
        },
    }
}

fn optional_string(args: &Arguments, key: &str) -> Result<Option<String>, ToolFault> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(ToolFault::InvalidArgument(format!(
            "{key} must be a string"
        ))),
    }
}

fn title(args: &Arguments, required: bool) -> Result<Option<String>, ToolFault> {
    let Some(title) = optional_string(args, "title")? else {
        if required {
            return Err(ToolFault::InvalidArgument(
                "missing required argument 'title'".into(),
            ));
        }
        return Ok(None);
    };
    if title.trim().is_empty() {
        return Err(ToolFault::InvalidArgument("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ToolFault::InvalidArgument(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(Some(title))
}

fn content(args: &Arguments) -> Result<Option<String>, ToolFault> {
    let content = optional_string(args, "content")?;
    if content
        .as_ref()
        .is_some_and(|text| text.chars().count() > MAX_CONTENT_CHARS)
    {
        return Err(ToolFault::InvalidArgument(format!(
            "content must be at most {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(content)
}

fn nullable_string() -> Value {
    json!({"anyOf": [{"type": "string"}, {"type": "null"}], "default": null})
}

fn memo_id_schema() -> Value {
    json!({"title": "Memo Id", "type": "integer"})
}

fn descriptors() -> Vec<ToolDescriptor> {
    let describe = |name: &str, description: &str, schema: Value| ToolDescriptor {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: schema,
    };

    vec![
        describe(
            "create_memo",
            "Create a new memo. title is required (max 200 chars), content is optional (max 5000 chars). Returns the stored memo with its id.",
            json!({
                "type": "object",
                "properties": {
                    "title": {"title": "Title", "type": "string"},
                    "content": nullable_string(),
                },
                "required": ["title"],
            }),
        ),
        describe(
            "list_memos",
            "List memos. skip is the number of memos to skip, limit the page size (max 100).",
            json!({
                "type": "object",
                "properties": {
                    "skip": {"title": "Skip", "type": "integer", "default": 0},
                    "limit": {"title": "Limit", "type": "integer", "default": DEFAULT_LIST_LIMIT},
                },
            }),
        ),
        describe(
            "get_memo",
            "Fetch a single memo by id.",
            json!({
                "type": "object",
                "properties": {"memo_id": memo_id_schema()},
                "required": ["memo_id"],
            }),
        ),
        describe(
            "update_memo",
            "Update a memo. Only the provided fields change.",
            json!({
                "type": "object",
                "properties": {
                    "memo_id": memo_id_schema(),
                    "title": nullable_string(),
                    "content": nullable_string(),
                },
                "required": ["memo_id"],
            }),
        ),
        describe(
            "delete_memo",
            "Delete a memo by id.",
            json!({
                "type": "object",
                "properties": {"memo_id": memo_id_schema()},
                "required": ["memo_id"],
            }),
        ),
    ]
}
