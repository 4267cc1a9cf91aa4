// Ported from microsoft/wassette (MIT License, with tether-specific modifications)
// Copyright (c) Microsoft Corporation.

use std::path::Path;
use std::time::Duration;

use tether_core::{ToolCallResult, ToolSpec};
use tokio::sync::RwLock;
use wasmtime::component::{Component, InstancePre};

use crate::error::RuntimeError;
use crate::handlers::{HandlerRegistry, WeatherEndpoints, module_capabilities};
use crate::runtime_context::{ExecutionContext, SandboxPolicy};
use crate::wasistate::WasiState;

/// How a module's tools are executed. Decided once, at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// The component instantiated against the host linker.
    Native,
    /// Instantiation failed; tools are served by host-side handlers only.
    Simulated,
}

/// A module the engine has accepted.
#[derive(Clone)]
pub struct LoadedModule {
    pub name: String,
    pub mode: ExecutionMode,
    handle: Option<InstancePre<WasiState>>,
}

impl LoadedModule {
    /// The pre-instantiated component, present only in native mode.
    pub fn handle(&self) -> Option<&InstancePre<WasiState>> {
        self.handle.as_ref()
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sandbox: SandboxPolicy,
    pub weather: WeatherEndpoints,
    /// Timeout for outbound requests made by handlers.
    pub http_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxPolicy::default(),
            weather: WeatherEndpoints::default(),
            http_timeout: Duration::from_secs(15),
        }
    }
}

/// Loads modules and serves the tools they are known to provide.
///
/// # Threading
///
/// `ModuleEngine` is `Send + Sync`. The module list sits behind an `RwLock`;
/// tool invocations only read the handler registry and may run concurrently.
pub struct ModuleEngine {
    context: ExecutionContext,
    handlers: HandlerRegistry,
    /// In load order.
    modules: RwLock<Vec<LoadedModule>>,
}

impl ModuleEngine {
    pub fn new(config: EngineConfig) -> Result<Self, RuntimeError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let handlers = HandlerRegistry::builtin(http, config.weather);
        Self::with_handlers(config.sandbox, handlers)
    }

    pub fn with_handlers(
        sandbox: SandboxPolicy,
        handlers: HandlerRegistry,
    ) -> Result<Self, RuntimeError> {
        Ok(Self {
            context: ExecutionContext::new(sandbox)?,
            handlers,
            modules: RwLock::new(Vec::new()),
        })
    }

    /// Load the module at `path`.
    ///
    /// Bytes that are not a valid component fail with [`RuntimeError::Load`].
    /// A component that cannot be instantiated (unresolved imports, ABI
    /// mismatch, trapping start) is still accepted, in simulated mode.
    /// Loading a module name that is already loaded is a no-op.
    pub async fn load(&self, path: &Path) -> Result<LoadedModule, RuntimeError> {
        let name = module_name(path)?;

        if let Some(existing) = self.find(&name).await {
            tracing::debug!(module = %name, "Module already loaded");
            return Ok(existing);
        }

        tracing::info!(module = %name, path = %path.display(), "Loading module");

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RuntimeError::Load(format!("cannot read {}: {e}", path.display())))?;

        let component = Component::new(&self.context.engine, &bytes)
            .map_err(|e| RuntimeError::Load(format!("{name}: {e}")))?;

        let (mode, handle) = match self.instantiate(&name, &component).await {
            Ok(pre) => (ExecutionMode::Native, Some(pre)),
            Err(e) => {
                tracing::info!(
                    module = %name,
                    error = %e,
                    "Native instantiation unavailable; using simulated execution"
                );
                (ExecutionMode::Simulated, None)
            }
        };

        let module = LoadedModule { name, mode, handle };

        let mut modules = self.modules.write().await;
        if let Some(existing) = modules.iter().find(|m| m.name == module.name) {
            return Ok(existing.clone());
        }
        modules.push(module.clone());

        tracing::info!(
            module = %module.name,
            mode = ?module.mode,
            tools = ?module_capabilities(&module.name),
            "Module loaded"
        );
        Ok(module)
    }

    async fn instantiate(
        &self,
        name: &str,
        component: &Component,
    ) -> Result<InstancePre<WasiState>, RuntimeError> {
        let pre = self
            .context
            .linker
            .instantiate_pre(component)
            .map_err(|e| RuntimeError::InstantiationFailed(format!("{name}: {e}")))?;

        let mut store = self.context.new_store();
        pre.instantiate_async(&mut store)
            .await
            .map_err(|e| RuntimeError::InstantiationFailed(format!("{name}: {e}")))?;

        Ok(pre)
    }

    async fn find(&self, name: &str) -> Option<LoadedModule> {
        self.modules
            .read()
            .await
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }

    pub async fn modules(&self) -> Vec<LoadedModule> {
        self.modules.read().await.clone()
    }

    pub async fn is_loaded(&self, module_name: &str) -> bool {
        self.find(module_name).await.is_some()
    }

    /// Tool specs statically associated with `module`'s name.
    pub fn list_capabilities(&self, module: &LoadedModule) -> Vec<ToolSpec> {
        module_capabilities(&module.name)
            .iter()
            .filter_map(|tool| self.handlers.get(tool))
            .map(|handler| handler.spec())
            .collect()
    }

    /// Tool specs for every loaded module, in load order.
    pub async fn list_tools(&self) -> Vec<ToolSpec> {
        let modules = self.modules.read().await;
        let mut tools: Vec<ToolSpec> = Vec::new();
        for module in modules.iter() {
            for spec in self.list_capabilities(module) {
                if !tools.iter().any(|t| t.name == spec.name) {
                    tools.push(spec);
                }
            }
        }
        tools
    }

    /// Invoke a tool by name.
    ///
    /// Only an unregistered name is an `Err`. Handler failures come back as
    /// an `Ok` result whose single text block describes the error.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ToolCallResult, RuntimeError> {
        let handler = self
            .handlers
            .get(tool_name)
            .ok_or_else(|| RuntimeError::UnknownTool(tool_name.to_string()))?;

        tracing::debug!(tool = %tool_name, "Invoking tool");

        match handler.call(arguments).await {
            Ok(content) => Ok(ToolCallResult {
                content,
                is_error: false,
            }),
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "Tool handler failed");
                Ok(ToolCallResult::error(format!("Error: {e}")))
            }
        }
    }
}

/// Module name = artifact file stem (`weather-tool.wasm` → `weather-tool`).
fn module_name(path: &Path) -> Result<String, RuntimeError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RuntimeError::Load(format!("{}: no module name", path.display())))
}
