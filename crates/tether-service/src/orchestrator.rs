use std::time::Duration;

use tether_core::{ChatMessage, ToolCallRequest, ToolSpec};

use crate::catalog::ToolCatalog;
use crate::error::ServiceError;
use crate::llm::{ChatRequest, LlmClient};

/// Default cap on plan/dispatch rounds per request. Override via
/// `orchestrator.max_turns` in tether.toml.
pub const DEFAULT_MAX_TURNS: u32 = 5;

const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Final assistant reply when the round cap is reached.
pub const EXHAUSTED_MESSAGE: &str = "I encountered an error processing too many tool rounds.";

/// Per-request knobs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_turns: u32,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    pub max_tokens: u32,
    /// Prepended to every transcript; empty means none.
    pub system_prompt: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: String::new(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The model answered without requesting tools.
    Done { message: ChatMessage, rounds: u32 },
    /// Every round requested tools; the run was cut off.
    Exhausted { rounds: u32 },
}

impl RunOutcome {
    pub fn rounds(&self) -> u32 {
        match self {
            RunOutcome::Done { rounds, .. } | RunOutcome::Exhausted { rounds } => *rounds,
        }
    }

    /// The assistant message to return to the caller.
    pub fn into_message(self) -> ChatMessage {
        match self {
            RunOutcome::Done { message, .. } => message,
            RunOutcome::Exhausted { .. } => ChatMessage::assistant(EXHAUSTED_MESSAGE),
        }
    }
}

enum RunState {
    Planning,
    Dispatching(ChatMessage),
    Done(ChatMessage),
    Exhausted,
}

/// Drives one chat request: ask the model, run the tools it picks, feed the
/// results back, repeat until it answers or the round cap is hit.
///
/// Tool failures never abort a run; they become `tool` messages the model can
/// read. Only a model failure or model timeout is an `Err`.
pub struct Orchestrator<'a> {
    llm: &'a dyn LlmClient,
    catalog: &'a ToolCatalog,
    max_turns: u32,
    model_timeout: Duration,
    tool_timeout: Duration,
    max_tokens: u32,
}

impl<'a> Orchestrator<'a> {
    pub fn new(llm: &'a dyn LlmClient, catalog: &'a ToolCatalog) -> Self {
        Self {
            llm,
            catalog,
            max_turns: DEFAULT_MAX_TURNS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_settings(self, settings: &OrchestratorSettings) -> Self {
        self.with_max_turns(settings.max_turns)
            .with_model_timeout(settings.model_timeout)
            .with_tool_timeout(settings.tool_timeout)
            .with_max_tokens(settings.max_tokens)
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Run the conversation starting from `transcript`.
    pub async fn run(&self, mut transcript: Vec<ChatMessage>) -> Result<RunOutcome, ServiceError> {
        let tools = self.catalog.specs();
        let mut rounds = 0u32;
        let mut state = RunState::Planning;

        loop {
            state = match state {
                RunState::Planning if rounds >= self.max_turns => RunState::Exhausted,
                RunState::Planning => {
                    rounds += 1;
                    tracing::info!(round = rounds, max_turns = self.max_turns, "Planning round");
                    let reply = self.plan(&transcript, &tools).await?;
                    if reply.has_tool_calls() {
                        RunState::Dispatching(reply)
                    } else {
                        RunState::Done(reply)
                    }
                }
                RunState::Dispatching(reply) => {
                    tracing::info!(
                        round = rounds,
                        tools = ?reply.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                        "Dispatching tool calls"
                    );
                    let calls = reply.tool_calls.clone();
                    transcript.push(reply);
                    for call in &calls {
                        let output = self.dispatch(call).await;
                        transcript.push(ChatMessage::tool(call.id.clone(), output));
                    }
                    RunState::Planning
                }
                RunState::Done(message) => {
                    tracing::info!(rounds, "Conversation complete");
                    return Ok(RunOutcome::Done { message, rounds });
                }
                RunState::Exhausted => {
                    tracing::warn!(rounds, "Round limit reached without a final answer");
                    return Ok(RunOutcome::Exhausted { rounds });
                }
            };
        }
    }

    async fn plan(
        &self,
        transcript: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChatMessage, ServiceError> {
        let request = ChatRequest {
            messages: transcript.to_vec(),
            tools: tools.to_vec(),
            max_tokens: self.max_tokens,
        };
        tokio::time::timeout(self.model_timeout, self.llm.chat(&request))
            .await
            .map_err(|_| ServiceError::Timeout {
                operation: "model call".into(),
                after: self.model_timeout,
            })?
    }

    /// Execute one call and render its outcome as `tool` message content.
    async fn dispatch(&self, call: &ToolCallRequest) -> String {
        let Some(entry) = self.catalog.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Model requested an unknown tool");
            return format!("Error: Tool {} not found.", call.name);
        };

        tracing::info!(
            tool = %call.name,
            source = %entry.session.source_name(),
            "Executing tool"
        );

        let call_future = entry.session.call_tool(&call.name, &call.arguments);
        match tokio::time::timeout(self.tool_timeout, call_future).await {
            Ok(Ok(result)) => {
                tracing::debug!(tool = %call.name, is_error = result.is_error, "Tool returned");
                result.text_content()
            }
            Ok(Err(e)) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool execution failed");
                format!("Error: {e}")
            }
            Err(_) => {
                tracing::warn!(tool = %call.name, timeout = ?self.tool_timeout, "Tool call timed out");
                format!("Error: tool {} timed out after {:?}", call.name, self.tool_timeout)
            }
        }
    }
}
