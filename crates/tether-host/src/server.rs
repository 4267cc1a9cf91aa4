use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
};
use tether_core::{ContentBlock, ToolCallResult, ToolSpec};
use tether_runtime::{ModuleEngine, RuntimeError};

/// MCP server surface of a runtime host: `tools/list` and `tools/call`,
/// backed by one [`ModuleEngine`].
pub struct RuntimeHost {
    engine: Arc<ModuleEngine>,
}

impl RuntimeHost {
    pub fn new(engine: Arc<ModuleEngine>) -> Self {
        Self { engine }
    }
}

fn host_info() -> ServerInfo {
    ServerInfo {
        protocol_version: Default::default(),
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation::from_build_env(),
        instructions: Some("tether runtime host -- tools backed by WASM modules".into()),
    }
}

fn to_mcp_tool(spec: ToolSpec) -> Tool {
    Tool {
        name: spec.name.into(),
        title: None,
        description: Some(spec.description.into()),
        input_schema: spec
            .input_schema
            .as_object()
            .cloned()
            .unwrap_or_default()
            .into(),
        output_schema: None,
        annotations: None,
        execution: None,
        icons: None,
        meta: None,
    }
}

fn to_call_result(result: ToolCallResult) -> CallToolResult {
    let content = result
        .content
        .into_iter()
        .map(|block| match block {
            ContentBlock::Text { text } => Content::text(text),
        })
        .collect();

    CallToolResult {
        content,
        structured_content: None,
        is_error: Some(result.is_error),
        meta: None,
    }
}

impl ServerHandler for RuntimeHost {
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools: Vec<Tool> = self
            .engine
            .list_tools()
            .await
            .into_iter()
            .map(to_mcp_tool)
            .collect();

        tracing::debug!(count = tools.len(), "Listing tools");
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_name: &str = &request.name;
        let arguments = request
            .arguments
            .clone()
            .map(serde_json::Value::Object)
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

        tracing::info!(tool = %tool_name, "Tool call");

        match self.engine.invoke(tool_name, &arguments).await {
            Ok(result) => Ok(to_call_result(result)),
            Err(RuntimeError::UnknownTool(name)) => {
                tracing::warn!(tool = %name, "Call to unknown tool");
                Err(McpError::invalid_params(format!("Tool {name} not found"), None))
            }
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    fn get_info(&self) -> ServerInfo {
        host_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_spec_becomes_mcp_tool() {
        let tool = to_mcp_tool(ToolSpec {
            name: "get_weather".into(),
            description: "Get current weather for a city.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "city": { "type": "string" } },
                "required": ["city"]
            }),
        });

        assert_eq!(tool.name, "get_weather");
        assert_eq!(tool.description.as_deref(), Some("Get current weather for a city."));
        assert_eq!(tool.input_schema.get("type"), Some(&serde_json::json!("object")));
        assert!(tool.input_schema.contains_key("required"));
    }

    #[test]
    fn handler_error_result_is_flagged() {
        let result = to_call_result(ToolCallResult::error("Error: Missing required parameter: temp"));
        assert_eq!(result.is_error, Some(true));
        assert_eq!(result.content.len(), 1);
        assert_eq!(
            result.content[0].as_text().map(|t| t.text.as_str()),
            Some("Error: Missing required parameter: temp")
        );
    }

    #[test]
    fn advertises_tools_capability() {
        let info = host_info();
        assert!(info.capabilities.tools.is_some());
    }
}
