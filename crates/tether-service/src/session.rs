//! Sessions to runtime hosts.
//!
//! A [`ToolSession`] is one open, initialised connection to a host that serves
//! a single [`ToolSource`]. [`SessionConnector`] opens them; the production
//! connector spawns `tether-host` as a child process and speaks MCP over its
//! stdio.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParams, CallToolResult, Tool},
    service::{Peer, RunningService},
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::{Value, json};
use tether_core::{ContentBlock, ToolCallResult, ToolSource, ToolSpec};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::error::ServiceError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An open session to a runtime host.
///
/// Requests may be issued concurrently; the transport correlates them by id.
pub trait ToolSession: Send + Sync {
    /// Name of the [`ToolSource`] this session serves.
    fn source_name(&self) -> &str;

    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolSpec>, ServiceError>>;

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: &'a Value,
    ) -> BoxFuture<'a, Result<ToolCallResult, ServiceError>>;

    /// Close the session. Closing an already closed session succeeds.
    fn close(&self) -> BoxFuture<'_, Result<(), ServiceError>>;
}

/// Opens a [`ToolSession`] for a source.
pub trait SessionConnector: Send + Sync {
    fn connect<'a>(
        &'a self,
        source: &'a ToolSource,
    ) -> BoxFuture<'a, Result<Arc<dyn ToolSession>, ServiceError>>;
}

/// How to launch a runtime host.
#[derive(Debug, Clone)]
pub struct HostCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Bound on spawn plus MCP initialisation.
    pub connect_timeout: Duration,
}

/// Session backed by a `tether-host` child process.
pub struct RuntimeSession {
    source_name: String,
    peer: Peer<RoleClient>,
    /// `None` once closed.
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl RuntimeSession {
    /// Spawn a host for `source` and complete the MCP handshake.
    ///
    /// The child inherits this process's environment, overridden by the
    /// source's `runtimeConfig`.
    pub async fn connect(source: &ToolSource, host: &HostCommand) -> Result<Self, ServiceError> {
        let transport = TokioChildProcess::new(Command::new(&host.program).configure(|cmd| {
            cmd.arg("--url")
                .arg(&source.binary_url)
                .args(&host.args)
                .envs(&source.runtime_config);
        }))
        .map_err(|e| {
            ServiceError::connect(
                &source.name,
                format!("cannot spawn {}: {e}", host.program.display()),
            )
        })?;

        let service = tokio::time::timeout(host.connect_timeout, ().serve(transport))
            .await
            .map_err(|_| {
                ServiceError::connect(
                    &source.name,
                    format!("handshake timed out after {:?}", host.connect_timeout),
                )
            })?
            .map_err(|e| ServiceError::connect(&source.name, e))?;

        if let Some(info) = service.peer_info() {
            tracing::info!(
                source = %source.name,
                server = ?info.server_info,
                "Runtime host connected"
            );
        }

        Ok(Self {
            source_name: source.name.clone(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        })
    }
}

impl ToolSession for RuntimeSession {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolSpec>, ServiceError>> {
        Box::pin(async move {
            let tools = self.peer.list_all_tools().await.map_err(|e| {
                ServiceError::Session(format!("{}: tools/list: {e}", self.source_name))
            })?;
            Ok(tools.into_iter().map(spec_from_mcp).collect())
        })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: &'a Value,
    ) -> BoxFuture<'a, Result<ToolCallResult, ServiceError>> {
        Box::pin(async move {
            let params = call_params(name, arguments)?;
            let result = self.peer.call_tool(params).await.map_err(|e| {
                ServiceError::Session(format!("{}: tools/call {name}: {e}", self.source_name))
            })?;
            Ok(result_from_mcp(result))
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            let Some(service) = self.service.lock().await.take() else {
                return Ok(());
            };
            let reason = service
                .cancel()
                .await
                .map_err(|e| ServiceError::Session(format!("{}: close: {e}", self.source_name)))?;
            tracing::info!(source = %self.source_name, reason = ?reason, "Runtime session closed");
            Ok(())
        })
    }
}

/// Production connector: one `tether-host` child per source.
pub struct ChildProcessConnector {
    host: HostCommand,
}

impl ChildProcessConnector {
    pub fn new(host: HostCommand) -> Self {
        Self { host }
    }
}

impl SessionConnector for ChildProcessConnector {
    fn connect<'a>(
        &'a self,
        source: &'a ToolSource,
    ) -> BoxFuture<'a, Result<Arc<dyn ToolSession>, ServiceError>> {
        Box::pin(async move {
            let session = RuntimeSession::connect(source, &self.host).await?;
            Ok(Arc::new(session) as Arc<dyn ToolSession>)
        })
    }
}

pub(crate) fn call_params(
    name: &str,
    arguments: &Value,
) -> Result<CallToolRequestParams, ServiceError> {
    let arguments = match arguments {
        Value::Object(map) => Value::Object(map.clone()),
        Value::Null => json!({}),
        other => {
            return Err(ServiceError::InvalidArguments(format!(
                "{name} expects a JSON object, got {other}"
            )));
        }
    };
    Ok(serde_json::from_value(json!({
        "name": name,
        "arguments": arguments,
    }))?)
}

fn spec_from_mcp(tool: Tool) -> ToolSpec {
    ToolSpec {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
        input_schema: Value::Object((*tool.input_schema).clone()),
    }
}

fn result_from_mcp(result: CallToolResult) -> ToolCallResult {
    let content = result
        .content
        .iter()
        .filter_map(|c| c.as_text())
        .map(|t| ContentBlock::text(t.text.clone()))
        .collect();
    ToolCallResult {
        content,
        is_error: result.is_error.unwrap_or(false),
    }
}
