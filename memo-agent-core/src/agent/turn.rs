use super::errors::AgentError;
use super::models::{AgentOptions, TurnOutcome};
use crate::domain::{Conversation, Message, ToolCallResult};
use crate::model::{ModelProvider, ModelRequest};
use crate::tooling::ToolInvoker;
use crate::transport::TransportError;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitModel,
    HasToolCalls,
    Done,
}

/// One user turn driven through the model/tool state machine.
///
/// The conversation is only ever appended to. A turn that fails is simply
/// dropped by the caller, which still owns the pre-turn conversation.
#[derive(Debug)]
pub struct Turn<'a> {
    options: &'a AgentOptions,
    conversation: Conversation,
    state: LoopState,
    cycles: usize,
    steps: Vec<ToolCallResult>,
}

impl<'a> Turn<'a> {
    pub fn new(conversation: Conversation, options: &'a AgentOptions) -> Self {
        Self {
            options,
            conversation,
            state: LoopState::AwaitModel,
            cycles: 0,
            steps: Vec::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Advances the machine by one transition and returns the new state.
    pub async fn step<P>(&mut self, model: &P, tools: &ToolInvoker) -> Result<LoopState, AgentError>
    where
        P: ModelProvider + ?Sized,
    {
        self.state = match self.state {
            LoopState::AwaitModel => self.await_model(model, tools).await?,
            LoopState::HasToolCalls => self.dispatch_tools(tools).await?,
            LoopState::Done => LoopState::Done,
        };
        Ok(self.state)
    }

    async fn await_model<P>(&mut self, model: &P, tools: &ToolInvoker) -> Result<LoopState, AgentError>
    where
        P: ModelProvider + ?Sized,
    {
        let request = ModelRequest {
            model: self.options.model.clone(),
            messages: self.request_messages(),
            tools: tools.registry().descriptors(),
        };
        debug!(
            messages = request.messages.len(),
            cycle = self.cycles,
            "Submitting conversation to model provider"
        );
        let response = model.chat(request).await?;
        let has_calls = response.message.has_tool_calls();
        self.conversation.push(response.message);

        if has_calls {
            info!(
                calls = self.conversation.pending_tool_calls().len(),
                "Model requested tool calls"
            );
            Ok(LoopState::HasToolCalls)
        } else {
            info!("Model returned final answer");
            Ok(LoopState::Done)
        }
    }

    async fn dispatch_tools(&mut self, tools: &ToolInvoker) -> Result<LoopState, AgentError> {
        if self.cycles >= self.options.max_cycles {
            warn!(max = self.options.max_cycles, "Agent exceeded max tool cycles");
            return Err(AgentError::CycleLimit {
                max: self.options.max_cycles,
            });
        }
        self.cycles += 1;

        let calls = self.conversation.pending_tool_calls().to_vec();
        let results = tools
            .invoke_all(&calls, self.options.parallel_tool_calls)
            .await;

        let mut fatal = None;
        for result in &results {
            if fatal.is_none() && result.is_session_fatal() {
                fatal = result.error_message().map(str::to_string);
            }
            self.conversation.push(result.to_message());
        }
        self.steps.extend(results);

        if let Some(message) = fatal {
            return Err(AgentError::Transport(TransportError::Protocol(message)));
        }
        Ok(LoopState::AwaitModel)
    }

    fn request_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        if let Some(prompt) = &self.options.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(self.conversation.messages().iter().cloned());
        messages
    }

    /// Consumes a finished turn. Returns `None` unless the state is `Done`.
    pub fn finish(self) -> Option<TurnOutcome> {
        if self.state != LoopState::Done {
            return None;
        }
        let answer = self.conversation.last()?.clone();
        Some(TurnOutcome {
            answer,
            conversation: self.conversation,
            cycles: self.cycles,
            steps: self.steps,
        })
    }
}
