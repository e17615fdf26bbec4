//! Conversation and tool data model shared by every layer.

mod conversation;
mod message;
mod schema;
mod tool;

pub use conversation::Conversation;
pub use message::{Message, MessageRole, ToolCallRequest};
pub use schema::{FieldSpec, FieldType, InputSchema, SchemaError};
pub use tool::{ToolCallResult, ToolDescriptor, ToolFailure, ToolFailureKind};
