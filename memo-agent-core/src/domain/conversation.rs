use super::message::{Message, MessageRole, ToolCallRequest};
use serde::{Deserialize, Serialize};

/// Append-only message log for one chat.
///
/// The agent works on its own copy during a turn and hands the extended log
/// back only when the turn completes, so a failed or cancelled turn never
/// leaves a partially applied conversation behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Tool calls of the trailing assistant message that have no tool-role
    /// answer yet.
    pub fn pending_tool_calls(&self) -> &[ToolCallRequest] {
        let Some(index) = self
            .messages
            .iter()
            .rposition(|message| message.role == MessageRole::Assistant)
        else {
            return &[];
        };
        if index + 1 == self.messages.len() {
            &self.messages[index].tool_calls
        } else {
            &[]
        }
    }

    /// Checks that every tool-role message answers a call issued by the
    /// assistant message that opened its block, and that each call is answered
    /// exactly once.
    pub fn is_well_formed(&self) -> bool {
        let mut open: Vec<&str> = Vec::new();
        for message in &self.messages {
            match message.role {
                MessageRole::Tool => {
                    let Some(id) = message.tool_call_id.as_deref() else {
                        return false;
                    };
                    match open.iter().position(|candidate| *candidate == id) {
                        Some(position) => {
                            open.remove(position);
                        }
                        None => return false,
                    }
                }
                _ => {
                    if !open.is_empty() {
                        return false;
                    }
                    if message.role == MessageRole::Assistant {
                        open = message.tool_calls.iter().map(|call| call.id.as_str()).collect();
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolCallRequest;
    use serde_json::json;

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, "list_memos", json!({}))
    }

    #[test]
    fn pending_calls_come_from_trailing_assistant_message() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("show memos"));
        conversation.push(Message::assistant_with_calls("", vec![call("a"), call("b")]));
        assert_eq!(conversation.pending_tool_calls().len(), 2);

        conversation.push(Message::tool("a", "[]"));
        assert!(conversation.pending_tool_calls().is_empty());
    }

    #[test]
    fn well_formed_requires_matching_tool_answers() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("show memos"));
        conversation.push(Message::assistant_with_calls("", vec![call("a")]));
        conversation.push(Message::tool("a", "[]"));
        conversation.push(Message::assistant("none yet"));
        assert!(conversation.is_well_formed());

        let mut broken = Conversation::new();
        broken.push(Message::assistant_with_calls("", vec![call("a")]));
        broken.push(Message::tool("zzz", "[]"));
        assert!(!broken.is_well_formed());
    }

    #[test]
    fn unanswered_call_followed_by_user_is_rejected() {
        let mut conversation = Conversation::new();
        conversation.push(Message::assistant_with_calls("", vec![call("a")]));
        conversation.push(Message::user("hello?"));
        assert!(!conversation.is_well_formed());
    }
}
