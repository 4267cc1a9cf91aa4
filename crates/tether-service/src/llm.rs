use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};
use tether_core::{ChatMessage, ToolCallRequest, ToolSpec};

use crate::error::ServiceError;

/// Request to an LLM: the transcript so far plus the tools it may call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub max_tokens: u32,
}

/// Facade trait for LLM providers.
///
/// The reply is an assistant message; when it carries tool calls the
/// orchestrator dispatches them and asks again.
pub trait LlmClient: Send + Sync {
    fn chat<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatMessage, ServiceError>> + Send + 'a>>;
}

/// Any backend speaking the OpenAI `/chat/completions` dialect with tool
/// calling (Ollama, vLLM, OpenAI itself).
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: String,
        model: String,
        api_key: Option<String>,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ServiceError::Llm(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages.iter().map(wire_message).collect::<Vec<_>>(),
            "max_tokens": request.max_tokens,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(wire_tool).collect());
        }
        body
    }
}

impl LlmClient for OpenAiCompatibleClient {
    fn chat<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatMessage, ServiceError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/chat/completions", self.base_url);
            let mut req = self.http.post(&url).json(&self.request_body(request));

            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| ServiceError::Llm(format!("HTTP request failed: {e}")))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(ServiceError::Llm(format!("LLM API returned {status}: {body}")));
            }

            let json: Value = resp
                .json()
                .await
                .map_err(|e| ServiceError::Llm(format!("Failed to parse response: {e}")))?;

            let message = json
                .pointer("/choices/0/message")
                .ok_or_else(|| ServiceError::Llm(format!("No message in response: {json}")))?;

            let reply = parse_assistant(message)?;
            tracing::debug!(
                model = %self.model,
                tool_calls = reply.tool_calls.len(),
                "LLM replied"
            );
            Ok(reply)
        })
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    let mut wire = json!({
        "role": message.role,
        "content": message.content,
    });
    if message.has_tool_calls() {
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
    if let Some(id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(id);
    }
    wire
}

fn wire_tool(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.input_schema,
        }
    })
}

fn parse_assistant(message: &Value) -> Result<ChatMessage, ServiceError> {
    let content = message["content"].as_str().unwrap_or_default();
    let calls = match message["tool_calls"].as_array() {
        Some(calls) => calls
            .iter()
            .map(parse_tool_call)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(ChatMessage::assistant_with_calls(content, calls))
}

fn parse_tool_call(call: &Value) -> Result<ToolCallRequest, ServiceError> {
    let function = &call["function"];
    let name = function["name"]
        .as_str()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ServiceError::Llm(format!("tool call without a function name: {call}")))?;

    // Arguments arrive as a JSON-encoded string (OpenAI) or an object (Ollama).
    let arguments = match &function["arguments"] {
        Value::Null => json!({}),
        Value::String(raw) if raw.trim().is_empty() => json!({}),
        // Unparseable strings go to the tool as-is so its error reaches the model.
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!(tool = name, error = %e, "tool call arguments are not valid JSON");
            Value::String(raw.clone())
        }),
        other => other.clone(),
    };

    let id = call["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

    Ok(ToolCallRequest {
        id,
        name: name.to_string(),
        arguments,
    })
}

/// Stub LLM client that replays scripted replies, for tests and the `stub`
/// provider. The last reply repeats once the script runs out.
pub struct StubLlmClient {
    responses: Vec<ChatMessage>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubLlmClient {
    pub fn new(responses: Vec<ChatMessage>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a stub that always returns the given reply.
    pub fn constant(response: ChatMessage) -> Self {
        Self::new(vec![response])
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl LlmClient for StubLlmClient {
    fn chat<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatMessage, ServiceError>> + Send + 'a>> {
        Box::pin(async move {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .responses
                .get(idx)
                .or_else(|| self.responses.last())
                .cloned()
                .ok_or_else(|| ServiceError::Llm("stub has no scripted replies".into()))?;
            Ok(reply)
        })
    }
}
