//! In-process sessions and connectors for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tether_core::{ToolCallResult, ToolSource, ToolSpec};
use tether_runtime::{ModuleEngine, RuntimeError};

use crate::error::ServiceError;
use crate::session::{BoxFuture, SessionConnector, ToolSession, call_params};

pub(crate) fn spec(name: &str) -> ToolSpec {
    ToolSpec {
        name: name.into(),
        description: format!("{name} (test)"),
        input_schema: json!({"type": "object"}),
    }
}

/// Scripted session. Each tool replies with fixed text or a session error.
pub(crate) struct FakeSession {
    name: String,
    tools: Vec<ToolSpec>,
    replies: HashMap<String, Result<ToolCallResult, String>>,
    delay: Option<Duration>,
    fail_list: bool,
    calls: Mutex<Vec<(String, Value)>>,
    closes: AtomicUsize,
}

impl FakeSession {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
            replies: HashMap::new(),
            delay: None,
            fail_list: false,
            calls: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_tool(mut self, tool: &str, reply: &str) -> Self {
        self.tools.push(spec(tool));
        self.replies.insert(tool.into(), Ok(ToolCallResult::text(reply)));
        self
    }

    pub(crate) fn with_failing_tool(mut self, tool: &str, error: &str) -> Self {
        self.tools.push(spec(tool));
        self.replies.insert(tool.into(), Err(error.into()));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub(crate) fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl ToolSession for FakeSession {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolSpec>, ServiceError>> {
        Box::pin(async move {
            if self.fail_list {
                return Err(ServiceError::Session(format!("{}: tools/list refused", self.name)));
            }
            Ok(self.tools.clone())
        })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: &'a Value,
    ) -> BoxFuture<'a, Result<ToolCallResult, ServiceError>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((name.to_string(), arguments.clone()));
            }
            call_params(name, arguments)?;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.replies.get(name) {
                Some(Ok(result)) => Ok(result.clone()),
                Some(Err(e)) => Err(ServiceError::Session(e.clone())),
                None => Err(ServiceError::Session(format!("{}: no tool {name}", self.name))),
            }
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Hands out pre-built sessions by source name; unknown sources fail to connect.
#[derive(Default)]
pub(crate) struct FakeConnector {
    sessions: HashMap<String, Arc<FakeSession>>,
}

impl FakeConnector {
    pub(crate) fn with(mut self, session: Arc<FakeSession>) -> Self {
        self.sessions.insert(session.name.clone(), session);
        self
    }
}

impl SessionConnector for FakeConnector {
    fn connect<'a>(
        &'a self,
        source: &'a ToolSource,
    ) -> BoxFuture<'a, Result<Arc<dyn ToolSession>, ServiceError>> {
        Box::pin(async move {
            self.sessions
                .get(&source.name)
                .cloned()
                .map(|s| s as Arc<dyn ToolSession>)
                .ok_or_else(|| ServiceError::connect(&source.name, "host exited during startup"))
        })
    }
}

/// A session that runs tools in-process on a [`ModuleEngine`], without the
/// MCP hop.
pub(crate) struct EngineSession {
    name: String,
    engine: ModuleEngine,
}

impl EngineSession {
    pub(crate) fn new(name: &str, engine: ModuleEngine) -> Self {
        Self {
            name: name.into(),
            engine,
        }
    }
}

impl ToolSession for EngineSession {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolSpec>, ServiceError>> {
        Box::pin(async move { Ok(self.engine.list_tools().await) })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: &'a Value,
    ) -> BoxFuture<'a, Result<ToolCallResult, ServiceError>> {
        Box::pin(async move {
            self.engine
                .invoke(name, arguments)
                .await
                .map_err(|e: RuntimeError| ServiceError::Session(e.to_string()))
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async { Ok(()) })
    }
}
